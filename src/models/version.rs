//! Product version model
//!
//! A product may carry any number of versions. Ideally exactly one is
//! flagged current, but nothing stores that rule; `ActiveVersion::pick`
//! resolves the other cases when reading.

use serde::{Deserialize, Serialize, Serializer};

/// Shown in place of a version when a product has no current one.
pub const VERSION_NOT_SPECIFIED: &str = "Product version not specified";

/// Maximum length of a version name, in characters
pub const VERSION_NAME_MAX_LEN: usize = 100;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Version {
    pub id: i64,
    /// Nulled when the product is deleted
    pub product_id: Option<i64>,
    /// Positive, defaults to 1
    pub version_number: i64,
    pub name: Option<String>,
    pub current_version: bool,
}

/// A version that has not been stored yet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewVersion {
    pub version_number: i64,
    pub name: Option<String>,
    pub current_version: bool,
}

/// One row-level write produced by a validated version formset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionChange {
    Insert(NewVersion),
    /// Overwrite an existing version of the same product
    Update(Version),
    /// Remove the version with this id
    Delete(i64),
}

/// The version a product is presented with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActiveVersion {
    Version(Version),
    /// No version of the product is flagged current
    NotSpecified,
}

impl ActiveVersion {
    /// Choose the active version among a product's versions.
    ///
    /// One current version wins outright. Several current versions resolve to
    /// the most recently created (highest id). None yields `NotSpecified`.
    pub fn pick(versions: &[Version]) -> Self {
        versions
            .iter()
            .filter(|v| v.current_version)
            .max_by_key(|v| v.id)
            .cloned()
            .map(ActiveVersion::Version)
            .unwrap_or(ActiveVersion::NotSpecified)
    }

    pub fn version(&self) -> Option<&Version> {
        match self {
            ActiveVersion::Version(v) => Some(v),
            ActiveVersion::NotSpecified => None,
        }
    }
}

// A version serializes as the object; the absent case as the placeholder text.
impl Serialize for ActiveVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ActiveVersion::Version(v) => v.serialize(serializer),
            ActiveVersion::NotSpecified => serializer.serialize_str(VERSION_NOT_SPECIFIED),
        }
    }
}
