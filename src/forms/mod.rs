//! Form handling for the product edit flow
//!
//! A product is edited through one of two forms (`ProductForm` for owners,
//! `ProductModeratorForm` for moderators) together with a `VersionFormset`
//! holding one row per version. Forms validate submitted data into typed
//! values or into field errors; they never touch the store.

mod product;
mod version;

pub use product::{ProductForm, ProductFormClass, ProductFormData, ProductModeratorForm};
pub use version::{FormsetErrors, VersionFormset, VersionRowData, EXTRA_ROWS};

use serde::Serialize;
use std::collections::BTreeMap;

/// Error messages per field name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FormErrors(BTreeMap<String, Vec<String>>);

impl FormErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0.entry(field.to_string()).or_default().push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    /// `Ok(value)` when no error was recorded
    pub fn into_result<T>(self, value: T) -> Result<T, FormErrors> {
        if self.is_empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }
}

/// A product form as presented to the client: which form applies, the
/// fields it edits, the current or submitted values and any errors.
#[derive(Debug, Clone, Serialize)]
pub struct FormState {
    pub class: &'static str,
    pub fields: &'static [&'static str],
    pub data: ProductFormData,
    #[serde(skip_serializing_if = "FormErrors::is_empty")]
    pub errors: FormErrors,
}

impl FormState {
    pub fn unbound<F: ProductFormClass>(data: ProductFormData) -> Self {
        Self {
            class: F::CLASS,
            fields: F::FIELDS,
            data,
            errors: FormErrors::new(),
        }
    }

    pub fn bound<F: ProductFormClass>(data: ProductFormData, errors: FormErrors) -> Self {
        Self {
            errors,
            ..Self::unbound::<F>(data)
        }
    }
}

/// Version rows as presented to the client
#[derive(Debug, Clone, Serialize)]
pub struct FormsetState {
    pub rows: Vec<VersionRowData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<FormsetErrors>,
}

/// Form plus formset: the body of an edit page, or of a rejected submission
#[derive(Debug, Clone, Serialize)]
pub struct EditState {
    pub form: FormState,
    pub formset: FormsetState,
}

pub(crate) fn required(field: &str, errors: &mut FormErrors) {
    errors.add(field, "This field is required.");
}

/// Trim and drop empty strings, the way an optional text input is read
pub(crate) fn optional_text(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

pub(crate) fn check_max_len(field: &str, value: &str, max: usize, errors: &mut FormErrors) {
    let len = value.chars().count();
    if len > max {
        errors.add(
            field,
            format!(
                "Ensure this value has at most {} characters (it has {}).",
                max, len
            ),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_form_errors_collects_per_field() {
        let mut errors = FormErrors::new();
        assert!(errors.is_empty());

        errors.add("name", "first");
        errors.add("name", "second");
        errors.add("price", "bad");

        assert_eq!(errors.get("name").unwrap().len(), 2);
        assert_eq!(errors.get("price"), Some(&["bad".to_string()][..]));
        assert!(errors.get("category_id").is_none());
        assert!(errors.clone().into_result(()).is_err());

        let json = serde_json::to_value(&errors).unwrap();
        assert_eq!(json["price"][0], "bad");
    }

    #[test]
    fn test_optional_text() {
        assert_eq!(optional_text(&None), None);
        assert_eq!(optional_text(&Some("   ".into())), None);
        assert_eq!(optional_text(&Some(" x ".into())), Some("x".into()));
    }

    #[test]
    fn test_check_max_len_counts_characters() {
        let mut errors = FormErrors::new();
        check_max_len("name", &"é".repeat(5), 5, &mut errors);
        assert!(errors.is_empty());

        check_max_len("name", &"é".repeat(6), 5, &mut errors);
        assert_eq!(
            errors.get("name").unwrap()[0],
            "Ensure this value has at most 5 characters (it has 6)."
        );
    }
}
