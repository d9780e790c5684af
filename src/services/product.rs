//! Product service
//!
//! Products are written through a form plus a version formset, saved in one
//! transaction only when both validate. Which form a user gets for an
//! existing product is decided by `select_product_form`.

use crate::db::repositories::{CategoryRepository, ProductRepository, VersionRepository};
use crate::forms::{
    EditState, FormErrors, FormState, FormsetState, ProductForm, ProductFormClass,
    ProductFormData, ProductModeratorForm, VersionFormset, VersionRowData,
};
use crate::models::{
    ActiveVersion, Permission, Product, ProductDetail, ProductListItem, User, Version,
};
use crate::services::catalog::CatalogReader;
use anyhow::Context;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;

/// Error types for product service operations
#[derive(Debug, thiserror::Error)]
pub enum ProductServiceError {
    /// Product not found
    #[error("Product not found: {0}")]
    NotFound(i64),

    /// The requester may not perform this operation
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Form or formset rejected the submission; nothing was saved
    #[error("Submitted product data is invalid")]
    Invalid(Box<EditState>),

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Which product form a user may edit a given product with
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormSelection {
    /// Every field (the owner)
    Full,
    /// Publication flag, description and category
    Moderator,
    Denied { reason: String },
}

/// Decide how `user` may edit `product`.
///
/// The owner always gets the full form. Anyone else needs all three
/// moderator permissions.
pub fn select_product_form(user: &User, product: &Product) -> FormSelection {
    if product.is_owned_by(user.id) {
        FormSelection::Full
    } else if user.has_perms(&Permission::MODERATOR) {
        FormSelection::Moderator
    } else {
        FormSelection::Denied {
            reason: "Only the owner or a moderator can edit this product".to_string(),
        }
    }
}

/// A product write: form fields at the top level, version rows under
/// `versions`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductSubmission {
    #[serde(flatten)]
    pub product: ProductFormData,
    #[serde(default)]
    pub versions: Vec<VersionRowData>,
}

pub struct ProductService {
    product_repo: Arc<dyn ProductRepository>,
    version_repo: Arc<dyn VersionRepository>,
    category_repo: Arc<dyn CategoryRepository>,
    reader: Arc<CatalogReader>,
}

impl ProductService {
    pub fn new(
        product_repo: Arc<dyn ProductRepository>,
        version_repo: Arc<dyn VersionRepository>,
        category_repo: Arc<dyn CategoryRepository>,
        reader: Arc<CatalogReader>,
    ) -> Self {
        Self {
            product_repo,
            version_repo,
            category_repo,
            reader,
        }
    }

    /// The product list (possibly cached) with each product's active version
    pub async fn list(&self) -> Result<Vec<ProductListItem>, ProductServiceError> {
        let products = self.reader.get_products_from_cache().await?;

        let mut current: HashMap<i64, Vec<Version>> = HashMap::new();
        for version in self
            .version_repo
            .list_current()
            .await
            .context("Failed to list current versions")?
        {
            if let Some(product_id) = version.product_id {
                current.entry(product_id).or_default().push(version);
            }
        }

        Ok(products
            .into_iter()
            .map(|product| {
                let active_version = current
                    .get(&product.id)
                    .map(|versions| ActiveVersion::pick(versions))
                    .unwrap_or(ActiveVersion::NotSpecified);
                ProductListItem {
                    product,
                    active_version,
                }
            })
            .collect())
    }

    pub async fn detail(&self, id: i64) -> Result<ProductDetail, ProductServiceError> {
        let product = self.get(id).await?;
        self.detail_of(product).await
    }

    /// Empty form and formset for a new product
    pub async fn new_form(&self, user: &User) -> Result<EditState, ProductServiceError> {
        require_perm(user, Permission::AddProduct)?;
        Ok(edit_state::<ProductForm>(ProductFormData::default(), &[]))
    }

    /// Current values in the form `user` is allowed to edit with
    pub async fn edit_form(&self, user: &User, id: i64) -> Result<EditState, ProductServiceError> {
        let product = self.get(id).await?;
        let versions = self.versions_of(id).await?;
        let data = ProductFormData::from_product(&product);

        match select_product_form(user, &product) {
            FormSelection::Full => Ok(edit_state::<ProductForm>(data, &versions)),
            FormSelection::Moderator => Ok(edit_state::<ProductModeratorForm>(data, &versions)),
            FormSelection::Denied { reason } => Err(ProductServiceError::Forbidden(reason)),
        }
    }

    /// Create a product owned by `user`, with its versions
    pub async fn create(
        &self,
        user: &User,
        submission: ProductSubmission,
    ) -> Result<ProductDetail, ProductServiceError> {
        require_perm(user, Permission::AddProduct)?;
        let saved = self
            .save::<ProductForm>(Product::draft(user.id), &[], submission)
            .await?;
        tracing::info!("User {} created product {}", user.id, saved.product.id);
        Ok(saved)
    }

    /// Update a product and its versions through the form `user` is
    /// allowed to use
    pub async fn update(
        &self,
        user: &User,
        id: i64,
        submission: ProductSubmission,
    ) -> Result<ProductDetail, ProductServiceError> {
        let product = self.get(id).await?;
        let versions = self.versions_of(id).await?;

        match select_product_form(user, &product) {
            FormSelection::Full => self.save::<ProductForm>(product, &versions, submission).await,
            FormSelection::Moderator => {
                self.save::<ProductModeratorForm>(product, &versions, submission)
                    .await
            }
            FormSelection::Denied { reason } => {
                tracing::debug!("User {} denied edit of product {}", user.id, id);
                Err(ProductServiceError::Forbidden(reason))
            }
        }
    }

    /// Delete a product. Its versions stay, with no product.
    pub async fn delete(&self, user: &User, id: i64) -> Result<(), ProductServiceError> {
        require_perm(user, Permission::DeleteProduct)?;
        self.get(id).await?;
        self.product_repo
            .delete(id)
            .await
            .context("Failed to delete product")?;
        tracing::info!("User {} deleted product {}", user.id, id);
        Ok(())
    }

    async fn save<F: ProductFormClass>(
        &self,
        mut product: Product,
        existing: &[Version],
        submission: ProductSubmission,
    ) -> Result<ProductDetail, ProductServiceError> {
        let ProductSubmission {
            product: data,
            versions: rows,
        } = submission;

        let category_exists = match data.category_id {
            Some(category_id) => self
                .category_repo
                .exists(category_id)
                .await
                .context("Failed to check category")?,
            None => true,
        };

        let form = F::clean(&data, category_exists);
        let formset = VersionFormset::bind(rows);
        let changes = formset.clean(existing);

        match (form, changes) {
            (Ok(form), Ok(changes)) => {
                form.apply(&mut product);
                let saved = self
                    .product_repo
                    .save_with_versions(&product, &changes)
                    .await
                    .context("Failed to save product")?;
                self.detail_of(saved).await
            }
            (form, changes) => Err(ProductServiceError::Invalid(Box::new(EditState {
                form: FormState::bound::<F>(data, form.err().unwrap_or_else(FormErrors::new)),
                formset: FormsetState {
                    rows: formset.into_rows(),
                    errors: changes.err(),
                },
            }))),
        }
    }

    async fn get(&self, id: i64) -> Result<Product, ProductServiceError> {
        self.product_repo
            .get_by_id(id)
            .await
            .context("Failed to get product")?
            .ok_or(ProductServiceError::NotFound(id))
    }

    async fn versions_of(&self, id: i64) -> Result<Vec<Version>, ProductServiceError> {
        Ok(self
            .version_repo
            .list_by_product(id)
            .await
            .context("Failed to list versions")?)
    }

    async fn detail_of(&self, product: Product) -> Result<ProductDetail, ProductServiceError> {
        let versions = self.versions_of(product.id).await?;
        Ok(ProductDetail {
            active_version: ActiveVersion::pick(&versions),
            product,
            versions,
        })
    }
}

fn require_perm(user: &User, perm: Permission) -> Result<(), ProductServiceError> {
    if user.has_perm(perm) {
        Ok(())
    } else {
        Err(ProductServiceError::Forbidden(format!(
            "Missing permission {}",
            perm
        )))
    }
}

fn edit_state<F: ProductFormClass>(data: ProductFormData, versions: &[Version]) -> EditState {
    EditState {
        form: FormState::unbound::<F>(data),
        formset: FormsetState {
            rows: VersionFormset::initial(versions),
            errors: None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{Cache, MemoryCache};
    use crate::db::repositories::{
        SqlxCategoryRepository, SqlxProductRepository, SqlxUserRepository,
        SqlxVersionRepository, UserRepository,
    };
    use crate::db::{create_test_pool, migrations, DynDatabasePool};
    use crate::forms::EXTRA_ROWS;
    use crate::models::{Category, VERSION_NOT_SPECIFIED};
    use crate::services::catalog::CacheSettings;
    use proptest::prelude::*;

    struct Fixture {
        pool: DynDatabasePool,
        service: ProductService,
        users: Arc<dyn UserRepository>,
        category_id: i64,
    }

    async fn setup() -> Fixture {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let categories = SqlxCategoryRepository::boxed(pool.clone());
        let products = SqlxProductRepository::boxed(pool.clone());
        let category_id = categories
            .create(&Category::new("Phones".into(), None, true))
            .await
            .unwrap()
            .id;
        let reader = CatalogReader::new(
            categories.clone(),
            products.clone(),
            Arc::new(Cache::Memory(MemoryCache::new())),
            CacheSettings::default(),
        );
        let service = ProductService::new(
            products,
            SqlxVersionRepository::boxed(pool.clone()),
            categories,
            Arc::new(reader),
        );

        Fixture {
            users: SqlxUserRepository::boxed(pool.clone()),
            pool,
            service,
            category_id,
        }
    }

    impl Fixture {
        async fn user(&self, email: &str, perms: &[Permission]) -> User {
            let user = self
                .users
                .create(&User::new(email.into(), "h".into(), false))
                .await
                .unwrap();
            for perm in perms {
                self.users.grant_permission(user.id, *perm).await.unwrap();
            }
            self.users.get_by_id(user.id).await.unwrap().unwrap()
        }

        async fn count(&self, table: &str) -> i64 {
            sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
                .fetch_one(self.pool.as_sqlite().unwrap())
                .await
                .unwrap()
        }
    }

    fn submission(name: &str, rows: Vec<VersionRowData>) -> ProductSubmission {
        ProductSubmission {
            product: ProductFormData {
                name: Some(name.into()),
                description: Some("A phone".into()),
                price: Some(49_900),
                category_id: None,
                is_published: Some(true),
            },
            versions: rows,
        }
    }

    fn row(number: i64, name: &str, current: bool) -> VersionRowData {
        VersionRowData {
            version_number: Some(number),
            name: Some(name.into()),
            current_version: Some(current),
            ..VersionRowData::default()
        }
    }

    fn named(id: i64) -> (User, Product) {
        let mut user = User::new("u@example.com".into(), "h".into(), false);
        user.id = id;
        let mut product = Product::draft(1);
        product.id = 1;
        (user, product)
    }

    #[test]
    fn test_gate_owner_gets_full_form() {
        let (user, product) = named(1);
        assert_eq!(select_product_form(&user, &product), FormSelection::Full);
    }

    #[test]
    fn test_gate_moderator_needs_all_three() {
        let (mut user, product) = named(2);
        user.permissions.extend([Permission::CanEditIsPublished, Permission::CanEditDescription]);
        assert!(matches!(
            select_product_form(&user, &product),
            FormSelection::Denied { .. }
        ));

        user.permissions.insert(Permission::CanEditCategory);
        assert_eq!(select_product_form(&user, &product), FormSelection::Moderator);
    }

    #[test]
    fn test_gate_ignores_grant_only_permissions() {
        let (mut user, product) = named(2);
        user.permissions.extend([Permission::ChangeProduct, Permission::ViewProduct]);
        assert!(matches!(
            select_product_form(&user, &product),
            FormSelection::Denied { .. }
        ));
    }

    proptest! {
        /// A non-owner is a moderator exactly when holding all three grants.
        #[test]
        fn gate_for_non_owners(mask in 0u8..8) {
            let (mut user, product) = named(2);
            for (i, perm) in Permission::MODERATOR.iter().enumerate() {
                if mask & (1 << i) != 0 {
                    user.permissions.insert(*perm);
                }
            }
            let selection = select_product_form(&user, &product);
            if mask == 0b111 {
                prop_assert_eq!(selection, FormSelection::Moderator);
            } else {
                let denied = matches!(selection, FormSelection::Denied { .. });
                prop_assert!(denied);
            }
        }
    }

    #[tokio::test]
    async fn test_create_with_versions() {
        let fx = setup().await;
        let owner = fx.user("o@example.com", &[Permission::AddProduct]).await;

        let mut sub = submission("Phone", vec![row(1, "v1", true), row(2, "v2", true)]);
        sub.versions.push(VersionRowData::default());
        sub.product.category_id = Some(fx.category_id);

        let detail = fx.service.create(&owner, sub).await.unwrap();
        assert_eq!(detail.product.owner_id, Some(owner.id));
        assert_eq!(detail.product.category_id, Some(fx.category_id));
        assert_eq!(detail.versions.len(), 2);
        assert_eq!(
            detail.active_version.version().map(|v| v.version_number),
            Some(2)
        );
    }

    #[tokio::test]
    async fn test_create_requires_permission() {
        let fx = setup().await;
        let user = fx.user("x@example.com", &[]).await;

        let result = fx.service.create(&user, submission("Phone", vec![])).await;
        assert!(matches!(result, Err(ProductServiceError::Forbidden(_))));
        assert!(fx.service.new_form(&user).await.is_err());
    }

    #[tokio::test]
    async fn test_invalid_version_row_persists_nothing() {
        let fx = setup().await;
        let owner = fx.user("o@example.com", &[Permission::AddProduct]).await;

        let sub = submission("Phone", vec![row(1, "ok", true), row(0, "bad", true)]);
        let Err(ProductServiceError::Invalid(state)) = fx.service.create(&owner, sub).await else {
            panic!("expected validation failure");
        };

        assert!(state.form.errors.is_empty());
        let formset_errors = state.formset.errors.expect("formset errors");
        assert!(formset_errors.rows[1].get("version_number").is_some());
        assert_eq!(state.formset.rows.len(), 2);
        assert_eq!(fx.count("products").await, 0);
        assert_eq!(fx.count("versions").await, 0);
    }

    #[tokio::test]
    async fn test_invalid_form_reports_with_formset_rows() {
        let fx = setup().await;
        let owner = fx.user("o@example.com", &[Permission::AddProduct]).await;

        let mut sub = submission("", vec![row(1, "v1", true)]);
        sub.product.category_id = Some(999);
        let Err(ProductServiceError::Invalid(state)) = fx.service.create(&owner, sub).await else {
            panic!("expected validation failure");
        };

        assert_eq!(state.form.class, "ProductForm");
        assert!(state.form.errors.get("name").is_some());
        assert!(state.form.errors.get("category_id").is_some());
        assert!(state.formset.errors.is_none());
        assert_eq!(fx.count("products").await, 0);
    }

    #[tokio::test]
    async fn test_moderator_update_touches_only_moderated_fields() {
        let fx = setup().await;
        let owner = fx.user("o@example.com", &[Permission::AddProduct]).await;
        let moderator = fx.user("m@example.com", &Permission::MODERATOR).await;

        let created = fx
            .service
            .create(&owner, submission("Phone", vec![row(1, "v1", true)]))
            .await
            .unwrap();
        let id = created.product.id;

        let edit = fx.service.edit_form(&moderator, id).await.unwrap();
        assert_eq!(edit.form.class, "ProductModeratorForm");
        assert_eq!(edit.formset.rows.len(), 1 + EXTRA_ROWS);

        let mut sub = submission("Renamed", VersionFormset::initial(&created.versions));
        sub.product.price = Some(1);
        sub.product.is_published = Some(false);
        sub.product.category_id = Some(fx.category_id);
        let updated = fx.service.update(&moderator, id, sub).await.unwrap();

        assert_eq!(updated.product.name, "Phone");
        assert_eq!(updated.product.price, 49_900);
        assert!(!updated.product.is_published);
        assert_eq!(updated.product.category_id, Some(fx.category_id));
        assert_eq!(updated.product.owner_id, Some(owner.id));
    }

    #[tokio::test]
    async fn test_stranger_is_denied() {
        let fx = setup().await;
        let owner = fx.user("o@example.com", &[Permission::AddProduct]).await;
        let stranger = fx
            .user("s@example.com", &[Permission::CanEditDescription])
            .await;

        let id = fx
            .service
            .create(&owner, submission("Phone", vec![]))
            .await
            .unwrap()
            .product
            .id;

        assert!(matches!(
            fx.service.edit_form(&stranger, id).await,
            Err(ProductServiceError::Forbidden(_))
        ));
        assert!(matches!(
            fx.service.update(&stranger, id, submission("X", vec![])).await,
            Err(ProductServiceError::Forbidden(_))
        ));
        assert!(matches!(
            fx.service.update(&stranger, 999, submission("X", vec![])).await,
            Err(ProductServiceError::NotFound(999))
        ));
    }

    #[tokio::test]
    async fn test_owner_edits_and_removes_versions() {
        let fx = setup().await;
        let owner = fx.user("o@example.com", &[Permission::AddProduct]).await;

        let created = fx
            .service
            .create(&owner, submission("Phone", vec![row(1, "v1", true), row(2, "v2", false)]))
            .await
            .unwrap();

        let mut rows = VersionFormset::initial(&created.versions);
        rows[0].delete = true;
        rows[1].current_version = Some(true);
        let updated = fx
            .service
            .update(&owner, created.product.id, submission("Phone 2", rows))
            .await
            .unwrap();

        assert_eq!(updated.product.name, "Phone 2");
        assert_eq!(updated.versions.len(), 1);
        assert_eq!(
            updated.active_version.version().and_then(|v| v.name.as_deref()),
            Some("v2")
        );
    }

    #[tokio::test]
    async fn test_list_attaches_active_version() {
        let fx = setup().await;
        let owner = fx.user("o@example.com", &[Permission::AddProduct]).await;

        fx.service
            .create(&owner, submission("With", vec![row(3, "v3", true)]))
            .await
            .unwrap();
        fx.service
            .create(&owner, submission("Without", vec![row(1, "old", false)]))
            .await
            .unwrap();

        let list = fx.service.list().await.unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].active_version.version().map(|v| v.version_number), Some(3));
        assert_eq!(list[1].active_version, ActiveVersion::NotSpecified);

        let json = serde_json::to_value(&list[1]).unwrap();
        assert_eq!(json["active_version"], VERSION_NOT_SPECIFIED);
        assert_eq!(json["name"], "Without");
    }

    #[tokio::test]
    async fn test_delete_requires_permission() {
        let fx = setup().await;
        let owner = fx.user("o@example.com", &[Permission::AddProduct]).await;
        let admin = fx.user("d@example.com", &[Permission::DeleteProduct]).await;

        let created = fx
            .service
            .create(&owner, submission("Phone", vec![row(1, "v1", true)]))
            .await
            .unwrap();

        assert!(matches!(
            fx.service.delete(&owner, created.product.id).await,
            Err(ProductServiceError::Forbidden(_))
        ));
        fx.service.delete(&admin, created.product.id).await.unwrap();
        assert_eq!(fx.count("products").await, 0);
        assert_eq!(fx.count("versions").await, 1);
    }
}
