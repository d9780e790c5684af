//! Cached catalog lists
//!
//! The full category list and the full product list are read through the
//! cache under fixed keys. Writes do not invalidate these keys; a list
//! stays as cached until `clear` is called or the optional TTL runs out.

use crate::cache::{Cache, CacheLayer};
use crate::config::CacheConfig;
use crate::db::repositories::{CategoryRepository, ProductRepository};
use crate::models::{Category, Product};
use anyhow::{Context, Result};
use serde::{de::DeserializeOwned, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Cache key of the category list
pub const CATEGORY_LIST_KEY: &str = "category_list";
/// Cache key of the product list
pub const PRODUCT_LIST_KEY: &str = "product_list";

/// Whether lists are cached, and for how long
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheSettings {
    pub enabled: bool,
    /// `None` keeps entries until cleared
    pub ttl: Option<Duration>,
}

impl CacheSettings {
    pub fn from_config(config: &CacheConfig) -> Self {
        Self {
            enabled: config.enabled,
            ttl: config.ttl_seconds.map(Duration::from_secs),
        }
    }
}

/// Reads category and product lists, from the cache when enabled
pub struct CatalogReader {
    category_repo: Arc<dyn CategoryRepository>,
    product_repo: Arc<dyn ProductRepository>,
    cache: Arc<Cache>,
    settings: CacheSettings,
}

impl CatalogReader {
    pub fn new(
        category_repo: Arc<dyn CategoryRepository>,
        product_repo: Arc<dyn ProductRepository>,
        cache: Arc<Cache>,
        settings: CacheSettings,
    ) -> Self {
        Self {
            category_repo,
            product_repo,
            cache,
            settings,
        }
    }

    /// All categories ordered by id
    pub async fn get_category_list_cache(&self) -> Result<Vec<Category>> {
        self.cached(CATEGORY_LIST_KEY, || self.category_repo.list())
            .await
            .context("Failed to list categories")
    }

    /// All products ordered by id
    pub async fn get_products_from_cache(&self) -> Result<Vec<Product>> {
        self.cached(PRODUCT_LIST_KEY, || self.product_repo.list())
            .await
            .context("Failed to list products")
    }

    /// Drop both cached lists
    pub async fn clear(&self) -> Result<()> {
        for key in [CATEGORY_LIST_KEY, PRODUCT_LIST_KEY] {
            self.cache
                .delete(key)
                .await
                .with_context(|| format!("Failed to clear cache key {}", key))?;
        }
        tracing::info!("Catalog cache cleared");
        Ok(())
    }

    async fn cached<T, F, Fut>(&self, key: &str, load: F) -> Result<Vec<T>>
    where
        T: Serialize + DeserializeOwned + Send + Sync,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<T>>>,
    {
        if !self.settings.enabled {
            return load().await;
        }

        match self.cache.get::<Vec<T>>(key).await {
            Ok(Some(hit)) => {
                tracing::debug!("Cache hit: {}", key);
                return Ok(hit);
            }
            Ok(None) => tracing::debug!("Cache miss: {}", key),
            Err(e) => tracing::warn!("Cache read failed for {}, loading from store: {:#}", key, e),
        }

        let items = load().await?;
        if let Err(e) = self.cache.set(key, &items, self.settings.ttl).await {
            tracing::warn!("Cache write failed for {}: {:#}", key, e);
        }
        Ok(items)
    }
}
