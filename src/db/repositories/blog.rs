//! Blog repository
//!
//! This module provides:
//! - `BlogRepository` trait defining the interface for blog data access
//! - `SqlxBlogRepository` implementing the trait for SQLite and MySQL

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::Blog;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// Blog repository trait
#[async_trait]
pub trait BlogRepository: Send + Sync {
    /// Create a new blog post
    async fn create(&self, blog: &Blog) -> Result<Blog>;

    /// Get blog post by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<Blog>>;

    /// List posts, newest first; `published` filters on the flag when given
    async fn list(&self, published: Option<bool>) -> Result<Vec<Blog>>;

    /// Update title, content, preview image and published flag.
    /// The slug and the view counter are never touched here.
    /// Returns `None` if the post no longer exists.
    async fn update(&self, blog: &Blog) -> Result<Option<Blog>>;

    /// Delete a blog post
    async fn delete(&self, id: i64) -> Result<()>;

    /// Add one view in the store and return the new count,
    /// or `None` if the post does not exist
    async fn increment_views(&self, id: i64) -> Result<Option<i64>>;
}

/// SQLx-based blog repository implementation
pub struct SqlxBlogRepository {
    pool: DynDatabasePool,
}

impl SqlxBlogRepository {
    /// Create a new SQLx blog repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn BlogRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl BlogRepository for SqlxBlogRepository {
    async fn create(&self, blog: &Blog) -> Result<Blog> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_blog_sqlite(self.pool.as_sqlite().unwrap(), blog).await,
            DatabaseDriver::Mysql => create_blog_mysql(self.pool.as_mysql().unwrap(), blog).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Blog>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_blog_by_id_sqlite(self.pool.as_sqlite().unwrap(), id).await,
            DatabaseDriver::Mysql => get_blog_by_id_mysql(self.pool.as_mysql().unwrap(), id).await,
        }
    }

    async fn list(&self, published: Option<bool>) -> Result<Vec<Blog>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => list_blogs_sqlite(self.pool.as_sqlite().unwrap(), published).await,
            DatabaseDriver::Mysql => list_blogs_mysql(self.pool.as_mysql().unwrap(), published).await,
        }
    }

    async fn update(&self, blog: &Blog) -> Result<Option<Blog>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => update_blog_sqlite(self.pool.as_sqlite().unwrap(), blog).await,
            DatabaseDriver::Mysql => update_blog_mysql(self.pool.as_mysql().unwrap(), blog).await,
        }
    }

    async fn delete(&self, id: i64) -> Result<()> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => delete_blog_sqlite(self.pool.as_sqlite().unwrap(), id).await,
            DatabaseDriver::Mysql => delete_blog_mysql(self.pool.as_mysql().unwrap(), id).await,
        }
    }

    async fn increment_views(&self, id: i64) -> Result<Option<i64>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                increment_views_sqlite(self.pool.as_sqlite().unwrap(), id).await
            }
            DatabaseDriver::Mysql => increment_views_mysql(self.pool.as_mysql().unwrap(), id).await,
        }
    }
}

const BLOG_COLUMNS: &str =
    "id, title, slug, content, preview_image, is_published, view_counter, owner_id, created_at";

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_blog_sqlite(pool: &SqlitePool, blog: &Blog) -> Result<Blog> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO blogs (title, slug, content, preview_image, is_published, view_counter, owner_id, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&blog.title)
    .bind(&blog.slug)
    .bind(&blog.content)
    .bind(&blog.preview_image)
    .bind(blog.is_published)
    .bind(blog.view_counter)
    .bind(blog.owner_id)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create blog")?;

    Ok(Blog {
        id: result.last_insert_rowid(),
        created_at: now,
        ..blog.clone()
    })
}

async fn get_blog_by_id_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<Blog>> {
    let sql = format!("SELECT {} FROM blogs WHERE id = ?", BLOG_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get blog by ID")?;

    Ok(row.as_ref().map(row_to_blog_sqlite))
}

async fn list_blogs_sqlite(pool: &SqlitePool, published: Option<bool>) -> Result<Vec<Blog>> {
    let rows = match published {
        Some(flag) => {
            let sql = format!(
                "SELECT {} FROM blogs WHERE is_published = ? ORDER BY created_at DESC, id DESC",
                BLOG_COLUMNS
            );
            sqlx::query(&sql).bind(flag).fetch_all(pool).await
        }
        None => {
            let sql = format!(
                "SELECT {} FROM blogs ORDER BY created_at DESC, id DESC",
                BLOG_COLUMNS
            );
            sqlx::query(&sql).fetch_all(pool).await
        }
    }
    .context("Failed to list blogs")?;

    Ok(rows.iter().map(row_to_blog_sqlite).collect())
}

async fn update_blog_sqlite(pool: &SqlitePool, blog: &Blog) -> Result<Option<Blog>> {
    let result = sqlx::query(
        r#"
        UPDATE blogs
        SET title = ?, content = ?, preview_image = ?, is_published = ?
        WHERE id = ?
        "#,
    )
    .bind(&blog.title)
    .bind(&blog.content)
    .bind(&blog.preview_image)
    .bind(blog.is_published)
    .bind(blog.id)
    .execute(pool)
    .await
    .context("Failed to update blog")?;

    if result.rows_affected() == 0 {
        return Ok(None);
    }
    Ok(Some(blog.clone()))
}

async fn delete_blog_sqlite(pool: &SqlitePool, id: i64) -> Result<()> {
    sqlx::query("DELETE FROM blogs WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to delete blog")?;

    Ok(())
}

async fn increment_views_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<i64>> {
    let count: Option<i64> = sqlx::query_scalar(
        "UPDATE blogs SET view_counter = view_counter + 1 WHERE id = ? RETURNING view_counter",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("Failed to increment blog views")?;

    Ok(count)
}

fn row_to_blog_sqlite(row: &sqlx::sqlite::SqliteRow) -> Blog {
    Blog {
        id: row.get("id"),
        title: row.get("title"),
        slug: row.get("slug"),
        content: row.get("content"),
        preview_image: row.get("preview_image"),
        is_published: row.get("is_published"),
        view_counter: row.get("view_counter"),
        owner_id: row.get("owner_id"),
        created_at: row.get("created_at"),
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_blog_mysql(pool: &MySqlPool, blog: &Blog) -> Result<Blog> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO blogs (title, slug, content, preview_image, is_published, view_counter, owner_id, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&blog.title)
    .bind(&blog.slug)
    .bind(&blog.content)
    .bind(&blog.preview_image)
    .bind(blog.is_published)
    .bind(blog.view_counter)
    .bind(blog.owner_id)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create blog")?;

    Ok(Blog {
        id: result.last_insert_id() as i64,
        created_at: now,
        ..blog.clone()
    })
}

async fn get_blog_by_id_mysql(pool: &MySqlPool, id: i64) -> Result<Option<Blog>> {
    let sql = format!("SELECT {} FROM blogs WHERE id = ?", BLOG_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get blog by ID")?;

    Ok(row.as_ref().map(row_to_blog_mysql))
}

async fn list_blogs_mysql(pool: &MySqlPool, published: Option<bool>) -> Result<Vec<Blog>> {
    let rows = match published {
        Some(flag) => {
            let sql = format!(
                "SELECT {} FROM blogs WHERE is_published = ? ORDER BY created_at DESC, id DESC",
                BLOG_COLUMNS
            );
            sqlx::query(&sql).bind(flag).fetch_all(pool).await
        }
        None => {
            let sql = format!(
                "SELECT {} FROM blogs ORDER BY created_at DESC, id DESC",
                BLOG_COLUMNS
            );
            sqlx::query(&sql).fetch_all(pool).await
        }
    }
    .context("Failed to list blogs")?;

    Ok(rows.iter().map(row_to_blog_mysql).collect())
}

async fn update_blog_mysql(pool: &MySqlPool, blog: &Blog) -> Result<Option<Blog>> {
    let result = sqlx::query(
        r#"
        UPDATE blogs
        SET title = ?, content = ?, preview_image = ?, is_published = ?
        WHERE id = ?
        "#,
    )
    .bind(&blog.title)
    .bind(&blog.content)
    .bind(&blog.preview_image)
    .bind(blog.is_published)
    .bind(blog.id)
    .execute(pool)
    .await
    .context("Failed to update blog")?;

    // MySQL counts changed rows, so an identical write also reports zero
    if result.rows_affected() == 0 && get_blog_by_id_mysql(pool, blog.id).await?.is_none() {
        return Ok(None);
    }
    Ok(Some(blog.clone()))
}

async fn delete_blog_mysql(pool: &MySqlPool, id: i64) -> Result<()> {
    sqlx::query("DELETE FROM blogs WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to delete blog")?;

    Ok(())
}

// No RETURNING on MySQL: increment and read back inside one transaction.
async fn increment_views_mysql(pool: &MySqlPool, id: i64) -> Result<Option<i64>> {
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    sqlx::query("UPDATE blogs SET view_counter = view_counter + 1 WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await
        .context("Failed to increment blog views")?;

    let count: Option<i64> = sqlx::query_scalar("SELECT view_counter FROM blogs WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .context("Failed to read blog views")?;

    tx.commit().await.context("Failed to commit view count")?;
    Ok(count)
}

fn row_to_blog_mysql(row: &sqlx::mysql::MySqlRow) -> Blog {
    Blog {
        id: row.get("id"),
        title: row.get("title"),
        slug: row.get("slug"),
        content: row.get("content"),
        preview_image: row.get("preview_image"),
        is_published: row.get("is_published"),
        view_counter: row.get("view_counter"),
        owner_id: row.get("owner_id"),
        created_at: row.get("created_at"),
    }
}
