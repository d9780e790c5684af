//! Category model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Product category
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Category {
    /// Unique identifier
    pub id: i64,
    /// Category name
    pub name: String,
    /// Free-form description
    pub description: Option<String>,
    /// Whether the category currently has stock
    pub in_stock: bool,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl Category {
    /// Create a new, unsaved category. The id is assigned by the database.
    pub fn new(name: String, description: Option<String>, in_stock: bool) -> Self {
        Self {
            id: 0,
            name,
            description,
            in_stock,
            created_at: Utc::now(),
        }
    }
}

/// Input for creating a new category
#[derive(Debug, Clone, Deserialize)]
pub struct CreateCategoryInput {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub in_stock: bool,
}

/// Input for updating a category; absent fields keep their value
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateCategoryInput {
    pub name: Option<String>,
    pub description: Option<String>,
    pub in_stock: Option<bool>,
}
