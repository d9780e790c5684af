//! Product model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::version::{ActiveVersion, Version};

/// A catalog product.
///
/// `price` is kept in minor currency units (cents) so that arithmetic and
/// storage stay exact.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub price: i64,
    /// Nulled when the category is deleted
    pub category_id: Option<i64>,
    /// Nulled when the owner is deleted
    pub owner_id: Option<i64>,
    pub is_published: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// An unsaved, empty product owned by `owner_id`
    pub fn draft(owner_id: i64) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            name: String::new(),
            description: None,
            price: 0,
            category_id: None,
            owner_id: Some(owner_id),
            is_published: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_saved(&self) -> bool {
        self.id != 0
    }

    pub fn is_owned_by(&self, user_id: i64) -> bool {
        self.owner_id == Some(user_id)
    }
}

/// Product as listed, with the version currently considered active
#[derive(Debug, Clone, Serialize)]
pub struct ProductListItem {
    #[serde(flatten)]
    pub product: Product,
    pub active_version: ActiveVersion,
}

/// Product detail: all attached versions plus the active one
#[derive(Debug, Clone, Serialize)]
pub struct ProductDetail {
    #[serde(flatten)]
    pub product: Product,
    pub versions: Vec<Version>,
    pub active_version: ActiveVersion,
}
