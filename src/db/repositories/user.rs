//! User repository
//!
//! Users and their permission grants. Every `User` returned here carries
//! its granted permissions, loaded from `user_permissions`.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{Permission, User};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::collections::BTreeSet;
use std::sync::Arc;

/// User repository trait
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Create a new user (permissions on the input are not stored)
    async fn create(&self, user: &User) -> Result<User>;

    /// Get user by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<User>>;

    /// Get user by email
    async fn get_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Count total users
    async fn count(&self) -> Result<i64>;

    /// Grant a permission; granting twice is a no-op
    async fn grant_permission(&self, user_id: i64, perm: Permission) -> Result<()>;

    /// Revoke a permission; revoking an absent grant is a no-op
    async fn revoke_permission(&self, user_id: i64, perm: Permission) -> Result<()>;
}

/// SQLx-based user repository implementation
pub struct SqlxUserRepository {
    pool: DynDatabasePool,
}

impl SqlxUserRepository {
    /// Create a new SQLx user repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn UserRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl UserRepository for SqlxUserRepository {
    async fn create(&self, user: &User) -> Result<User> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_user_sqlite(self.pool.as_sqlite().unwrap(), user).await,
            DatabaseDriver::Mysql => create_user_mysql(self.pool.as_mysql().unwrap(), user).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<User>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                get_user_sqlite(self.pool.as_sqlite().unwrap(), "id = ?", UserKey::Id(id)).await
            }
            DatabaseDriver::Mysql => {
                get_user_mysql(self.pool.as_mysql().unwrap(), "id = ?", UserKey::Id(id)).await
            }
        }
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                get_user_sqlite(self.pool.as_sqlite().unwrap(), "email = ?", UserKey::Email(email))
                    .await
            }
            DatabaseDriver::Mysql => {
                get_user_mysql(self.pool.as_mysql().unwrap(), "email = ?", UserKey::Email(email))
                    .await
            }
        }
    }

    async fn count(&self) -> Result<i64> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query_scalar("SELECT COUNT(*) FROM users")
                    .fetch_one(self.pool.as_sqlite().unwrap())
                    .await
                    .context("Failed to count users")
            }
            DatabaseDriver::Mysql => {
                sqlx::query_scalar("SELECT COUNT(*) FROM users")
                    .fetch_one(self.pool.as_mysql().unwrap())
                    .await
                    .context("Failed to count users")
            }
        }
    }

    async fn grant_permission(&self, user_id: i64, perm: Permission) -> Result<()> {
        let sql = match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                "INSERT OR IGNORE INTO user_permissions (user_id, codename) VALUES (?, ?)"
            }
            DatabaseDriver::Mysql => {
                "INSERT IGNORE INTO user_permissions (user_id, codename) VALUES (?, ?)"
            }
        };

        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query(sql)
                    .bind(user_id)
                    .bind(perm.codename())
                    .execute(self.pool.as_sqlite().unwrap())
                    .await
                    .context("Failed to grant permission")?;
            }
            DatabaseDriver::Mysql => {
                sqlx::query(sql)
                    .bind(user_id)
                    .bind(perm.codename())
                    .execute(self.pool.as_mysql().unwrap())
                    .await
                    .context("Failed to grant permission")?;
            }
        }

        Ok(())
    }

    async fn revoke_permission(&self, user_id: i64, perm: Permission) -> Result<()> {
        let sql = "DELETE FROM user_permissions WHERE user_id = ? AND codename = ?";

        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query(sql)
                    .bind(user_id)
                    .bind(perm.codename())
                    .execute(self.pool.as_sqlite().unwrap())
                    .await
                    .context("Failed to revoke permission")?;
            }
            DatabaseDriver::Mysql => {
                sqlx::query(sql)
                    .bind(user_id)
                    .bind(perm.codename())
                    .execute(self.pool.as_mysql().unwrap())
                    .await
                    .context("Failed to revoke permission")?;
            }
        }

        Ok(())
    }
}

/// Lookup value bound into a `get_user_*` query
enum UserKey<'a> {
    Id(i64),
    Email(&'a str),
}

/// Turn stored codenames into permissions, skipping ones this build doesn't know.
fn parse_permissions(codenames: Vec<String>) -> BTreeSet<Permission> {
    codenames
        .into_iter()
        .filter_map(|codename| match codename.parse() {
            Ok(perm) => Some(perm),
            Err(_) => {
                tracing::warn!("Ignoring unknown permission in database: {}", codename);
                None
            }
        })
        .collect()
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_user_sqlite(pool: &SqlitePool, user: &User) -> Result<User> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO users (email, password_hash, is_superuser, is_active, created_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(&user.email)
    .bind(&user.password_hash)
    .bind(user.is_superuser)
    .bind(user.is_active)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create user")?;

    Ok(User {
        id: result.last_insert_rowid(),
        permissions: BTreeSet::new(),
        created_at: now,
        ..user.clone()
    })
}

async fn get_user_sqlite(
    pool: &SqlitePool,
    filter: &str,
    key: UserKey<'_>,
) -> Result<Option<User>> {
    let sql = format!(
        "SELECT id, email, password_hash, is_superuser, is_active, created_at FROM users WHERE {}",
        filter
    );
    let query = sqlx::query(&sql);
    let query = match key {
        UserKey::Id(id) => query.bind(id),
        UserKey::Email(email) => query.bind(email),
    };

    let Some(row) = query
        .fetch_optional(pool)
        .await
        .context("Failed to get user")?
    else {
        return Ok(None);
    };

    let id: i64 = row.get("id");
    let codenames: Vec<String> =
        sqlx::query_scalar("SELECT codename FROM user_permissions WHERE user_id = ?")
            .bind(id)
            .fetch_all(pool)
            .await
            .context("Failed to load user permissions")?;

    Ok(Some(User {
        id,
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        is_superuser: row.get("is_superuser"),
        is_active: row.get("is_active"),
        permissions: parse_permissions(codenames),
        created_at: row.get("created_at"),
    }))
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_user_mysql(pool: &MySqlPool, user: &User) -> Result<User> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO users (email, password_hash, is_superuser, is_active, created_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(&user.email)
    .bind(&user.password_hash)
    .bind(user.is_superuser)
    .bind(user.is_active)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create user")?;

    Ok(User {
        id: result.last_insert_id() as i64,
        permissions: BTreeSet::new(),
        created_at: now,
        ..user.clone()
    })
}

async fn get_user_mysql(pool: &MySqlPool, filter: &str, key: UserKey<'_>) -> Result<Option<User>> {
    let sql = format!(
        "SELECT id, email, password_hash, is_superuser, is_active, created_at FROM users WHERE {}",
        filter
    );
    let query = sqlx::query(&sql);
    let query = match key {
        UserKey::Id(id) => query.bind(id),
        UserKey::Email(email) => query.bind(email),
    };

    let Some(row) = query
        .fetch_optional(pool)
        .await
        .context("Failed to get user")?
    else {
        return Ok(None);
    };

    let id: i64 = row.get("id");
    let codenames: Vec<String> =
        sqlx::query_scalar("SELECT codename FROM user_permissions WHERE user_id = ?")
            .bind(id)
            .fetch_all(pool)
            .await
            .context("Failed to load user permissions")?;

    Ok(Some(User {
        id,
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        is_superuser: row.get("is_superuser"),
        is_active: row.get("is_active"),
        permissions: parse_permissions(codenames),
        created_at: row.get("created_at"),
    }))
}
