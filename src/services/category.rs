//! Category service
//!
//! Category writes go straight to the store. The public list is read
//! through `CatalogReader` and is not refreshed by these writes.

use crate::db::repositories::CategoryRepository;
use crate::models::{Category, CreateCategoryInput, UpdateCategoryInput};
use crate::services::catalog::CatalogReader;
use anyhow::Context;
use std::sync::Arc;

/// Maximum length of a category name, in characters
pub const CATEGORY_NAME_MAX_LEN: usize = 150;

/// Error types for category service operations
#[derive(Debug, thiserror::Error)]
pub enum CategoryServiceError {
    /// Category not found
    #[error("Category not found: {0}")]
    NotFound(i64),

    /// Validation error
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct CategoryService {
    repo: Arc<dyn CategoryRepository>,
    reader: Arc<CatalogReader>,
}

impl CategoryService {
    pub fn new(repo: Arc<dyn CategoryRepository>, reader: Arc<CatalogReader>) -> Self {
        Self { repo, reader }
    }

    /// The category list, possibly cached
    pub async fn list(&self) -> Result<Vec<Category>, CategoryServiceError> {
        Ok(self.reader.get_category_list_cache().await?)
    }

    pub async fn get(&self, id: i64) -> Result<Category, CategoryServiceError> {
        self.repo
            .get_by_id(id)
            .await
            .context("Failed to get category")?
            .ok_or(CategoryServiceError::NotFound(id))
    }

    pub async fn create(
        &self,
        input: CreateCategoryInput,
    ) -> Result<Category, CategoryServiceError> {
        let name = validate_name(&input.name)?;
        let description = input
            .description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());

        let created = self
            .repo
            .create(&Category::new(name, description, input.in_stock))
            .await
            .context("Failed to create category")?;

        tracing::info!("Created category {} ({})", created.id, created.name);
        Ok(created)
    }

    /// Apply the fields present in `input`; an empty description clears it
    pub async fn update(
        &self,
        id: i64,
        input: UpdateCategoryInput,
    ) -> Result<Category, CategoryServiceError> {
        let mut category = self.get(id).await?;

        if let Some(name) = input.name {
            category.name = validate_name(&name)?;
        }
        if let Some(description) = input.description {
            let description = description.trim();
            category.description = (!description.is_empty()).then(|| description.to_string());
        }
        if let Some(in_stock) = input.in_stock {
            category.in_stock = in_stock;
        }

        Ok(self
            .repo
            .update(&category)
            .await
            .context("Failed to update category")?)
    }

    /// Delete a category. Its products stay, with no category.
    pub async fn delete(&self, id: i64) -> Result<(), CategoryServiceError> {
        self.get(id).await?;
        self.repo
            .delete(id)
            .await
            .context("Failed to delete category")?;
        tracing::info!("Deleted category {}", id);
        Ok(())
    }
}

fn validate_name(name: &str) -> Result<String, CategoryServiceError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(CategoryServiceError::ValidationError(
            "Category name cannot be empty".to_string(),
        ));
    }
    if name.chars().count() > CATEGORY_NAME_MAX_LEN {
        return Err(CategoryServiceError::ValidationError(format!(
            "Category name cannot exceed {} characters",
            CATEGORY_NAME_MAX_LEN
        )));
    }
    Ok(name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{Cache, MemoryCache};
    use crate::db::repositories::{SqlxCategoryRepository, SqlxProductRepository};
    use crate::db::{create_test_pool, migrations};
    use crate::services::catalog::CacheSettings;

    async fn setup(cache_enabled: bool) -> CategoryService {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let repo = SqlxCategoryRepository::boxed(pool.clone());
        let reader = CatalogReader::new(
            repo.clone(),
            SqlxProductRepository::boxed(pool),
            Arc::new(Cache::Memory(MemoryCache::new())),
            CacheSettings {
                enabled: cache_enabled,
                ttl: None,
            },
        );
        CategoryService::new(repo, Arc::new(reader))
    }

    fn input(name: &str) -> CreateCategoryInput {
        CreateCategoryInput {
            name: name.to_string(),
            description: Some("  ".to_string()),
            in_stock: true,
        }
    }

    #[tokio::test]
    async fn test_create_and_update() {
        let service = setup(false).await;

        let created = service.create(input("  Phones ")).await.unwrap();
        assert_eq!(created.name, "Phones");
        assert_eq!(created.description, None);

        let updated = service
            .update(
                created.id,
                UpdateCategoryInput {
                    description: Some("Mobile".into()),
                    in_stock: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.name, "Phones");
        assert_eq!(updated.description.as_deref(), Some("Mobile"));
        assert!(!updated.in_stock);
    }

    #[tokio::test]
    async fn test_validation_and_not_found() {
        let service = setup(false).await;

        assert!(matches!(
            service.create(input("   ")).await,
            Err(CategoryServiceError::ValidationError(_))
        ));
        assert!(matches!(
            service.create(input(&"x".repeat(151))).await,
            Err(CategoryServiceError::ValidationError(_))
        ));
        assert!(matches!(
            service.delete(42).await,
            Err(CategoryServiceError::NotFound(42))
        ));
    }

    #[tokio::test]
    async fn test_cached_list_goes_stale_after_create() {
        let service = setup(true).await;
        service.create(input("Phones")).await.unwrap();
        assert_eq!(service.list().await.unwrap().len(), 1);

        service.create(input("Tablets")).await.unwrap();
        assert_eq!(service.list().await.unwrap().len(), 1);
    }
}
