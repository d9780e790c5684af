//! Product repository
//!
//! Products are written together with their version rows: `save_with_versions`
//! stores the product and applies every version change inside a single
//! transaction, so a failure anywhere leaves the store untouched.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{Product, VersionChange};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// Product repository trait
#[async_trait]
pub trait ProductRepository: Send + Sync {
    /// Get product by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<Product>>;

    /// List all products ordered by id
    async fn list(&self) -> Result<Vec<Product>>;

    /// Insert (id 0) or update the product, then apply `changes` to its
    /// versions, all in one transaction. Returns the stored product.
    async fn save_with_versions(
        &self,
        product: &Product,
        changes: &[VersionChange],
    ) -> Result<Product>;

    /// Delete a product; its versions stay with no product
    async fn delete(&self, id: i64) -> Result<()>;
}

/// SQLx-based product repository implementation
pub struct SqlxProductRepository {
    pool: DynDatabasePool,
}

impl SqlxProductRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn ProductRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl ProductRepository for SqlxProductRepository {
    async fn get_by_id(&self, id: i64) -> Result<Option<Product>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                get_product_by_id_sqlite(self.pool.as_sqlite().unwrap(), id).await
            }
            DatabaseDriver::Mysql => get_product_by_id_mysql(self.pool.as_mysql().unwrap(), id).await,
        }
    }

    async fn list(&self) -> Result<Vec<Product>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => list_products_sqlite(self.pool.as_sqlite().unwrap()).await,
            DatabaseDriver::Mysql => list_products_mysql(self.pool.as_mysql().unwrap()).await,
        }
    }

    async fn save_with_versions(
        &self,
        product: &Product,
        changes: &[VersionChange],
    ) -> Result<Product> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                save_with_versions_sqlite(self.pool.as_sqlite().unwrap(), product, changes).await
            }
            DatabaseDriver::Mysql => {
                save_with_versions_mysql(self.pool.as_mysql().unwrap(), product, changes).await
            }
        }
    }

    async fn delete(&self, id: i64) -> Result<()> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => delete_product_sqlite(self.pool.as_sqlite().unwrap(), id).await,
            DatabaseDriver::Mysql => delete_product_mysql(self.pool.as_mysql().unwrap(), id).await,
        }
    }
}

const PRODUCT_COLUMNS: &str = "id, name, description, price, category_id, owner_id, is_published, created_at, updated_at";

// ============================================================================
// SQLite implementations
// ============================================================================

async fn get_product_by_id_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<Product>> {
    let sql = format!("SELECT {} FROM products WHERE id = ?", PRODUCT_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get product by ID")?;

    Ok(row.as_ref().map(row_to_product_sqlite))
}

async fn list_products_sqlite(pool: &SqlitePool) -> Result<Vec<Product>> {
    let sql = format!("SELECT {} FROM products ORDER BY id", PRODUCT_COLUMNS);
    let rows = sqlx::query(&sql)
        .fetch_all(pool)
        .await
        .context("Failed to list products")?;

    Ok(rows.iter().map(row_to_product_sqlite).collect())
}

async fn save_with_versions_sqlite(
    pool: &SqlitePool,
    product: &Product,
    changes: &[VersionChange],
) -> Result<Product> {
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;
    let now = Utc::now();

    let saved = if product.is_saved() {
        let result = sqlx::query(
            r#"
            UPDATE products
            SET name = ?, description = ?, price = ?, category_id = ?, owner_id = ?,
                is_published = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price)
        .bind(product.category_id)
        .bind(product.owner_id)
        .bind(product.is_published)
        .bind(now)
        .bind(product.id)
        .execute(&mut *tx)
        .await
        .context("Failed to update product")?;

        if result.rows_affected() == 0 {
            bail!("Product {} no longer exists", product.id);
        }

        Product {
            updated_at: now,
            ..product.clone()
        }
    } else {
        let result = sqlx::query(
            r#"
            INSERT INTO products (name, description, price, category_id, owner_id, is_published, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price)
        .bind(product.category_id)
        .bind(product.owner_id)
        .bind(product.is_published)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await
        .context("Failed to create product")?;

        Product {
            id: result.last_insert_rowid(),
            created_at: now,
            updated_at: now,
            ..product.clone()
        }
    };

    for change in changes {
        match change {
            VersionChange::Insert(version) => {
                sqlx::query(
                    r#"
                    INSERT INTO versions (product_id, version_number, name, current_version)
                    VALUES (?, ?, ?, ?)
                    "#,
                )
                .bind(saved.id)
                .bind(version.version_number)
                .bind(&version.name)
                .bind(version.current_version)
                .execute(&mut *tx)
                .await
                .context("Failed to create version")?;
            }
            VersionChange::Update(version) => {
                let result = sqlx::query(
                    r#"
                    UPDATE versions
                    SET version_number = ?, name = ?, current_version = ?
                    WHERE id = ? AND product_id = ?
                    "#,
                )
                .bind(version.version_number)
                .bind(&version.name)
                .bind(version.current_version)
                .bind(version.id)
                .bind(saved.id)
                .execute(&mut *tx)
                .await
                .context("Failed to update version")?;

                if result.rows_affected() == 0 {
                    bail!("Version {} does not belong to product {}", version.id, saved.id);
                }
            }
            VersionChange::Delete(id) => {
                sqlx::query("DELETE FROM versions WHERE id = ? AND product_id = ?")
                    .bind(id)
                    .bind(saved.id)
                    .execute(&mut *tx)
                    .await
                    .context("Failed to delete version")?;
            }
        }
    }

    tx.commit().await.context("Failed to commit product")?;
    Ok(saved)
}

async fn delete_product_sqlite(pool: &SqlitePool, id: i64) -> Result<()> {
    sqlx::query("DELETE FROM products WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to delete product")?;

    Ok(())
}

fn row_to_product_sqlite(row: &sqlx::sqlite::SqliteRow) -> Product {
    Product {
        id: row.get("id"),
        name: row.get("name"),
        description: row.get("description"),
        price: row.get("price"),
        category_id: row.get("category_id"),
        owner_id: row.get("owner_id"),
        is_published: row.get("is_published"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn get_product_by_id_mysql(pool: &MySqlPool, id: i64) -> Result<Option<Product>> {
    let sql = format!("SELECT {} FROM products WHERE id = ?", PRODUCT_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get product by ID")?;

    Ok(row.as_ref().map(row_to_product_mysql))
}

async fn list_products_mysql(pool: &MySqlPool) -> Result<Vec<Product>> {
    let sql = format!("SELECT {} FROM products ORDER BY id", PRODUCT_COLUMNS);
    let rows = sqlx::query(&sql)
        .fetch_all(pool)
        .await
        .context("Failed to list products")?;

    Ok(rows.iter().map(row_to_product_mysql).collect())
}

async fn save_with_versions_mysql(
    pool: &MySqlPool,
    product: &Product,
    changes: &[VersionChange],
) -> Result<Product> {
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;
    let now = Utc::now();

    let saved = if product.is_saved() {
        let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM products WHERE id = ? FOR UPDATE")
            .bind(product.id)
            .fetch_optional(&mut *tx)
            .await
            .context("Failed to lock product")?;
        if exists.is_none() {
            bail!("Product {} no longer exists", product.id);
        }

        sqlx::query(
            r#"
            UPDATE products
            SET name = ?, description = ?, price = ?, category_id = ?, owner_id = ?,
                is_published = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price)
        .bind(product.category_id)
        .bind(product.owner_id)
        .bind(product.is_published)
        .bind(now)
        .bind(product.id)
        .execute(&mut *tx)
        .await
        .context("Failed to update product")?;

        Product {
            updated_at: now,
            ..product.clone()
        }
    } else {
        let result = sqlx::query(
            r#"
            INSERT INTO products (name, description, price, category_id, owner_id, is_published, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price)
        .bind(product.category_id)
        .bind(product.owner_id)
        .bind(product.is_published)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await
        .context("Failed to create product")?;

        Product {
            id: result.last_insert_id() as i64,
            created_at: now,
            updated_at: now,
            ..product.clone()
        }
    };

    for change in changes {
        match change {
            VersionChange::Insert(version) => {
                sqlx::query(
                    r#"
                    INSERT INTO versions (product_id, version_number, name, current_version)
                    VALUES (?, ?, ?, ?)
                    "#,
                )
                .bind(saved.id)
                .bind(version.version_number)
                .bind(&version.name)
                .bind(version.current_version)
                .execute(&mut *tx)
                .await
                .context("Failed to create version")?;
            }
            VersionChange::Update(version) => {
                // MySQL reports changed rows, not matched ones, so ownership is checked first.
                let owner: Option<Option<i64>> =
                    sqlx::query_scalar("SELECT product_id FROM versions WHERE id = ?")
                        .bind(version.id)
                        .fetch_optional(&mut *tx)
                        .await
                        .context("Failed to look up version")?;
                if owner != Some(Some(saved.id)) {
                    bail!("Version {} does not belong to product {}", version.id, saved.id);
                }

                sqlx::query(
                    r#"
                    UPDATE versions
                    SET version_number = ?, name = ?, current_version = ?
                    WHERE id = ?
                    "#,
                )
                .bind(version.version_number)
                .bind(&version.name)
                .bind(version.current_version)
                .bind(version.id)
                .execute(&mut *tx)
                .await
                .context("Failed to update version")?;
            }
            VersionChange::Delete(id) => {
                sqlx::query("DELETE FROM versions WHERE id = ? AND product_id = ?")
                    .bind(id)
                    .bind(saved.id)
                    .execute(&mut *tx)
                    .await
                    .context("Failed to delete version")?;
            }
        }
    }

    tx.commit().await.context("Failed to commit product")?;
    Ok(saved)
}

async fn delete_product_mysql(pool: &MySqlPool, id: i64) -> Result<()> {
    sqlx::query("DELETE FROM products WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to delete product")?;

    Ok(())
}

fn row_to_product_mysql(row: &sqlx::mysql::MySqlRow) -> Product {
    Product {
        id: row.get("id"),
        name: row.get("name"),
        description: row.get("description"),
        price: row.get("price"),
        category_id: row.get("category_id"),
        owner_id: row.get("owner_id"),
        is_published: row.get("is_published"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}
