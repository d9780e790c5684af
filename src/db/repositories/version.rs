//! Version repository
//!
//! Read access to product versions. Writes go through
//! `ProductRepository::save_with_versions` so they share the product's
//! transaction.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::Version;
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

#[async_trait]
pub trait VersionRepository: Send + Sync {
    /// All versions of one product, oldest first
    async fn list_by_product(&self, product_id: i64) -> Result<Vec<Version>>;

    /// Every version flagged current that is still attached to a product
    async fn list_current(&self) -> Result<Vec<Version>>;
}

pub struct SqlxVersionRepository {
    pool: DynDatabasePool,
}

impl SqlxVersionRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn VersionRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl VersionRepository for SqlxVersionRepository {
    async fn list_by_product(&self, product_id: i64) -> Result<Vec<Version>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                list_by_product_sqlite(self.pool.as_sqlite().unwrap(), product_id).await
            }
            DatabaseDriver::Mysql => {
                list_by_product_mysql(self.pool.as_mysql().unwrap(), product_id).await
            }
        }
    }

    async fn list_current(&self) -> Result<Vec<Version>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => list_current_sqlite(self.pool.as_sqlite().unwrap()).await,
            DatabaseDriver::Mysql => list_current_mysql(self.pool.as_mysql().unwrap()).await,
        }
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn list_by_product_sqlite(pool: &SqlitePool, product_id: i64) -> Result<Vec<Version>> {
    let rows = sqlx::query(
        r#"
        SELECT id, product_id, version_number, name, current_version
        FROM versions
        WHERE product_id = ?
        ORDER BY id
        "#,
    )
    .bind(product_id)
    .fetch_all(pool)
    .await
    .context("Failed to list versions")?;

    Ok(rows.iter().map(row_to_version_sqlite).collect())
}

async fn list_current_sqlite(pool: &SqlitePool) -> Result<Vec<Version>> {
    let rows = sqlx::query(
        r#"
        SELECT id, product_id, version_number, name, current_version
        FROM versions
        WHERE current_version = 1 AND product_id IS NOT NULL
        ORDER BY id
        "#,
    )
    .fetch_all(pool)
    .await
    .context("Failed to list current versions")?;

    Ok(rows.iter().map(row_to_version_sqlite).collect())
}

fn row_to_version_sqlite(row: &sqlx::sqlite::SqliteRow) -> Version {
    Version {
        id: row.get("id"),
        product_id: row.get("product_id"),
        version_number: row.get("version_number"),
        name: row.get("name"),
        current_version: row.get("current_version"),
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn list_by_product_mysql(pool: &MySqlPool, product_id: i64) -> Result<Vec<Version>> {
    let rows = sqlx::query(
        r#"
        SELECT id, product_id, version_number, name, current_version
        FROM versions
        WHERE product_id = ?
        ORDER BY id
        "#,
    )
    .bind(product_id)
    .fetch_all(pool)
    .await
    .context("Failed to list versions")?;

    Ok(rows.iter().map(row_to_version_mysql).collect())
}

async fn list_current_mysql(pool: &MySqlPool) -> Result<Vec<Version>> {
    let rows = sqlx::query(
        r#"
        SELECT id, product_id, version_number, name, current_version
        FROM versions
        WHERE current_version = TRUE AND product_id IS NOT NULL
        ORDER BY id
        "#,
    )
    .fetch_all(pool)
    .await
    .context("Failed to list current versions")?;

    Ok(rows.iter().map(row_to_version_mysql).collect())
}

fn row_to_version_mysql(row: &sqlx::mysql::MySqlRow) -> Version {
    Version {
        id: row.get("id"),
        product_id: row.get("product_id"),
        version_number: row.get("version_number"),
        name: row.get("name"),
        current_version: row.get("current_version"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{ProductRepository, SqlxProductRepository};
    use crate::db::{create_test_pool, migrations::run_migrations};
    use crate::models::{NewVersion, Product, VersionChange};

    #[tokio::test]
    async fn test_list_current_skips_detached_and_stale() {
        let pool = create_test_pool().await.unwrap();
        run_migrations(&pool).await.unwrap();
        let products = SqlxProductRepository::new(pool.clone());
        let versions = SqlxVersionRepository::new(pool.clone());

        let insert = |number: i64, current: bool| {
            VersionChange::Insert(NewVersion {
                version_number: number,
                name: None,
                current_version: current,
            })
        };

        let draft = Product {
            name: "Kept".into(),
            owner_id: None,
            ..Product::draft(0)
        };
        let kept = products
            .save_with_versions(&draft, &[insert(1, true), insert(2, false)])
            .await
            .unwrap();
        let gone = products
            .save_with_versions(&Product { name: "Gone".into(), ..draft }, &[insert(1, true)])
            .await
            .unwrap();
        products.delete(gone.id).await.unwrap();

        let current = versions.list_current().await.unwrap();
        assert_eq!(current.len(), 1);
        assert_eq!(current[0].product_id, Some(kept.id));
        assert_eq!(current[0].version_number, 1);

        assert_eq!(versions.list_by_product(kept.id).await.unwrap().len(), 2);
        assert!(versions.list_by_product(gone.id).await.unwrap().is_empty());
    }
}
