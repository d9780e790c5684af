//! User model
//!
//! Users authenticate with email and password. What they may do is decided
//! by named permissions (`catalog.add_product`, ...), granted one by one, or
//! by the superuser flag which implies all of them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// A registered user together with the permissions granted to them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Unique identifier
    pub id: i64,
    /// Email address (unique, used to log in)
    pub email: String,
    /// Password hash (argon2)
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// Holds every permission implicitly
    pub is_superuser: bool,
    /// Inactive users hold no permissions and cannot log in
    pub is_active: bool,
    /// Permissions granted explicitly
    #[serde(default)]
    pub permissions: BTreeSet<Permission>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Create a new, unsaved user. The password must already be hashed.
    pub fn new(email: String, password_hash: String, is_superuser: bool) -> Self {
        Self {
            id: 0,
            email,
            password_hash,
            is_superuser,
            is_active: true,
            permissions: BTreeSet::new(),
            created_at: Utc::now(),
        }
    }

    /// Whether the user holds `perm`.
    pub fn has_perm(&self, perm: Permission) -> bool {
        if !self.is_active {
            return false;
        }
        self.is_superuser || self.permissions.contains(&perm)
    }

    /// Whether the user holds every permission in `perms`.
    pub fn has_perms(&self, perms: &[Permission]) -> bool {
        perms.iter().all(|perm| self.has_perm(*perm))
    }

    /// Every permission the user effectively holds.
    pub fn effective_permissions(&self) -> Vec<Permission> {
        Permission::ALL
            .iter()
            .copied()
            .filter(|perm| self.has_perm(*perm))
            .collect()
    }
}

/// Named catalog permission, written `app.codename` on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Permission {
    AddProduct,
    /// Grant-only: stored and reported, but editing goes through ownership
    /// or the moderator grants
    ChangeProduct,
    DeleteProduct,
    /// Grant-only: product reads are public
    ViewProduct,
    /// Moderator: may flip `is_published` on products they don't own
    CanEditIsPublished,
    /// Moderator: may edit descriptions of products they don't own
    CanEditDescription,
    /// Moderator: may recategorise products they don't own
    CanEditCategory,
    AddCategory,
    ChangeCategory,
    DeleteCategory,
}

impl Permission {
    pub const ALL: [Permission; 10] = [
        Permission::AddProduct,
        Permission::ChangeProduct,
        Permission::DeleteProduct,
        Permission::ViewProduct,
        Permission::CanEditIsPublished,
        Permission::CanEditDescription,
        Permission::CanEditCategory,
        Permission::AddCategory,
        Permission::ChangeCategory,
        Permission::DeleteCategory,
    ];

    /// The three grants that together make a product moderator.
    pub const MODERATOR: [Permission; 3] = [
        Permission::CanEditIsPublished,
        Permission::CanEditDescription,
        Permission::CanEditCategory,
    ];

    pub fn codename(&self) -> &'static str {
        match self {
            Permission::AddProduct => "catalog.add_product",
            Permission::ChangeProduct => "catalog.change_product",
            Permission::DeleteProduct => "catalog.delete_product",
            Permission::ViewProduct => "catalog.view_product",
            Permission::CanEditIsPublished => "catalog.can_edit_is_published",
            Permission::CanEditDescription => "catalog.can_edit_description",
            Permission::CanEditCategory => "catalog.can_edit_category",
            Permission::AddCategory => "catalog.add_category",
            Permission::ChangeCategory => "catalog.change_category",
            Permission::DeleteCategory => "catalog.delete_category",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.codename())
    }
}

impl FromStr for Permission {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Permission::ALL
            .iter()
            .copied()
            .find(|perm| perm.codename() == s)
            .ok_or_else(|| anyhow::anyhow!("Unknown permission: {}", s))
    }
}

impl TryFrom<String> for Permission {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Permission> for String {
    fn from(perm: Permission) -> Self {
        perm.codename().to_string()
    }
}
