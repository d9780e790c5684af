//! Version formset
//!
//! The formset edits all versions of one product at once. Rows carrying an
//! `id` address an existing version of that product; rows without one are
//! new. An untouched extra row (no id, no name, no number) is skipped.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use super::{check_max_len, optional_text, FormErrors};
use crate::models::{NewVersion, Version, VersionChange, VERSION_NAME_MAX_LEN};

/// Blank rows appended when the formset is shown for editing
pub const EXTRA_ROWS: usize = 1;

/// Largest version number the store accepts
const VERSION_NUMBER_MAX: i64 = i32::MAX as i64;

/// One submitted or displayed version row
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VersionRowData {
    pub id: Option<i64>,
    pub version_number: Option<i64>,
    pub name: Option<String>,
    pub current_version: Option<bool>,
    /// Remove this version when saving
    pub delete: bool,
}

impl VersionRowData {
    pub fn from_version(version: &Version) -> Self {
        Self {
            id: Some(version.id),
            version_number: Some(version.version_number),
            name: version.name.clone(),
            current_version: Some(version.current_version),
            delete: false,
        }
    }

    fn is_blank(&self) -> bool {
        self.id.is_none() && self.version_number.is_none() && optional_text(&self.name).is_none()
    }
}

/// Per-row errors (index-aligned with the submitted rows) and errors
/// concerning the formset as a whole
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FormsetErrors {
    pub rows: Vec<FormErrors>,
    pub non_form_errors: Vec<String>,
}

impl FormsetErrors {
    pub fn is_empty(&self) -> bool {
        self.non_form_errors.is_empty() && self.rows.iter().all(FormErrors::is_empty)
    }
}

/// Version rows bound to one product
#[derive(Debug, Clone, Default)]
pub struct VersionFormset {
    rows: Vec<VersionRowData>,
}

impl VersionFormset {
    /// Bind submitted rows
    pub fn bind(rows: Vec<VersionRowData>) -> Self {
        Self { rows }
    }

    pub fn into_rows(self) -> Vec<VersionRowData> {
        self.rows
    }

    /// Rows for an edit page: the existing versions plus blank extra rows
    pub fn initial(existing: &[Version]) -> Vec<VersionRowData> {
        existing
            .iter()
            .map(VersionRowData::from_version)
            .chain(std::iter::repeat_with(VersionRowData::default).take(EXTRA_ROWS))
            .collect()
    }

    /// Validate every row against the product's stored versions and turn the
    /// valid formset into the writes it implies.
    ///
    /// Rows equal to the stored version produce no write. A new row marked
    /// `delete` is dropped.
    pub fn clean(&self, existing: &[Version]) -> Result<Vec<VersionChange>, FormsetErrors> {
        let stored: HashMap<i64, &Version> = existing.iter().map(|v| (v.id, v)).collect();
        let mut errors = FormsetErrors {
            rows: vec![FormErrors::new(); self.rows.len()],
            non_form_errors: Vec::new(),
        };
        let mut seen_ids = HashSet::new();
        let mut changes = Vec::new();

        for (row, row_errors) in self.rows.iter().zip(errors.rows.iter_mut()) {
            if row.is_blank() {
                continue;
            }

            if let Some(id) = row.id {
                if !stored.contains_key(&id) {
                    row_errors.add(
                        "id",
                        "Select a valid choice. That choice is not one of the available choices.",
                    );
                    continue;
                }
                if !seen_ids.insert(id) {
                    errors
                        .non_form_errors
                        .push("Please correct the duplicate data for id.".to_string());
                    continue;
                }
            }

            if row.delete {
                if let Some(id) = row.id {
                    changes.push(VersionChange::Delete(id));
                }
                continue;
            }

            let Some(cleaned) = clean_row(row, row_errors) else {
                continue;
            };

            match row.id {
                Some(id) => {
                    let updated = Version {
                        id,
                        product_id: stored[&id].product_id,
                        version_number: cleaned.version_number,
                        name: cleaned.name,
                        current_version: cleaned.current_version,
                    };
                    if *stored[&id] != updated {
                        changes.push(VersionChange::Update(updated));
                    }
                }
                None => changes.push(VersionChange::Insert(cleaned)),
            }
        }

        errors.non_form_errors.dedup();
        if errors.is_empty() {
            Ok(changes)
        } else {
            Err(errors)
        }
    }
}

fn clean_row(row: &VersionRowData, errors: &mut FormErrors) -> Option<NewVersion> {
    let version_number = row.version_number.unwrap_or(1);
    if version_number < 1 {
        errors.add(
            "version_number",
            "Ensure this value is greater than or equal to 1.",
        );
    } else if version_number > VERSION_NUMBER_MAX {
        errors.add(
            "version_number",
            format!(
                "Ensure this value is less than or equal to {}.",
                VERSION_NUMBER_MAX
            ),
        );
    }

    let name = optional_text(&row.name);
    if let Some(name) = &name {
        check_max_len("name", name, VERSION_NAME_MAX_LEN, errors);
    }

    if !errors.is_empty() {
        return None;
    }

    Some(NewVersion {
        version_number,
        name,
        current_version: row.current_version.unwrap_or(true),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stored(id: i64, number: i64, current: bool) -> Version {
        Version {
            id,
            product_id: Some(1),
            version_number: number,
            name: Some(format!("v{}", number)),
            current_version: current,
        }
    }

    fn new_row(number: Option<i64>, name: Option<&str>) -> VersionRowData {
        VersionRowData {
            version_number: number,
            name: name.map(str::to_string),
            ..VersionRowData::default()
        }
    }

    #[test]
    fn test_initial_rows_include_extra() {
        let existing = vec![stored(1, 1, true), stored(2, 2, false)];
        let rows = VersionFormset::initial(&existing);

        assert_eq!(rows.len(), existing.len() + EXTRA_ROWS);
        assert_eq!(rows[0].id, Some(1));
        assert_eq!(rows[2], VersionRowData::default());
        assert_eq!(VersionFormset::initial(&[]).len(), EXTRA_ROWS);
    }

    #[test]
    fn test_blank_extra_rows_are_skipped() {
        let formset = VersionFormset::bind(vec![
            VersionRowData::default(),
            new_row(None, Some("   ")),
            VersionRowData {
                current_version: Some(false),
                ..VersionRowData::default()
            },
        ]);
        assert_eq!(formset.clean(&[]).unwrap(), vec![]);
    }

    #[test]
    fn test_new_row_defaults() {
        let formset = VersionFormset::bind(vec![new_row(None, Some("Beta"))]);
        let changes = formset.clean(&[]).unwrap();

        assert_eq!(
            changes,
            vec![VersionChange::Insert(NewVersion {
                version_number: 1,
                name: Some("Beta".into()),
                current_version: true,
            })]
        );
    }

    #[test]
    fn test_update_only_changed_rows() {
        let existing = vec![stored(1, 1, true), stored(2, 2, true)];
        let mut rows = VersionFormset::initial(&existing);
        rows[1].current_version = Some(false);

        let changes = VersionFormset::bind(rows).clean(&existing).unwrap();
        assert_eq!(
            changes,
            vec![VersionChange::Update(Version {
                current_version: false,
                ..existing[1].clone()
            })]
        );
    }

    #[test]
    fn test_delete_flag() {
        let existing = vec![stored(1, 1, true)];
        let mut rows = VersionFormset::initial(&existing);
        rows[0].delete = true;
        rows.push(VersionRowData {
            delete: true,
            ..new_row(Some(4), Some("never stored"))
        });

        let changes = VersionFormset::bind(rows).clean(&existing).unwrap();
        assert_eq!(changes, vec![VersionChange::Delete(1)]);
    }

    #[test]
    fn test_row_errors_are_index_aligned() {
        let formset = VersionFormset::bind(vec![
            new_row(Some(1), Some("ok")),
            new_row(Some(0), Some(&"n".repeat(VERSION_NAME_MAX_LEN + 1))),
        ]);
        let errors = formset.clean(&[]).unwrap_err();

        assert_eq!(errors.rows.len(), 2);
        assert!(errors.rows[0].is_empty());
        assert!(errors.rows[1].get("version_number").is_some());
        assert!(errors.rows[1].get("name").is_some());
        assert!(errors.non_form_errors.is_empty());
    }

    #[test]
    fn test_foreign_version_id_rejected() {
        let existing = vec![stored(1, 1, true)];
        let formset = VersionFormset::bind(vec![VersionRowData {
            id: Some(99),
            ..new_row(Some(2), None)
        }]);

        let errors = formset.clean(&existing).unwrap_err();
        assert!(errors.rows[0].get("id").is_some());
    }

    #[test]
    fn test_duplicate_ids_are_a_formset_error() {
        let existing = vec![stored(1, 1, true)];
        let row = VersionRowData::from_version(&existing[0]);
        let formset = VersionFormset::bind(vec![row.clone(), row]);

        let errors = formset.clean(&existing).unwrap_err();
        assert_eq!(
            errors.non_form_errors,
            vec!["Please correct the duplicate data for id.".to_string()]
        );
    }
}
