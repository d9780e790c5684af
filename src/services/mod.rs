//! Services layer - Business logic
//!
//! Services validate input, enforce permissions and coordinate the
//! repositories and the cache. Each has its own error enum.

pub mod blog;
pub mod catalog;
pub mod category;
pub mod password;
pub mod product;
pub mod user;

pub use blog::{generate_slug, BlogService, BlogServiceError};
pub use catalog::{CacheSettings, CatalogReader};
pub use category::{CategoryService, CategoryServiceError};
pub use password::{hash_password, verify_password};
pub use product::{
    select_product_form, FormSelection, ProductService, ProductServiceError, ProductSubmission,
};
pub use user::{LoginInput, RegisterInput, UserService, UserServiceError};
