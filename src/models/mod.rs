//! Data models
//!
//! Database entities of the catalog (Category, Product, Version, Blog, User,
//! Session) and the input types used to create and update them.

mod blog;
mod category;
mod product;
mod session;
mod user;
mod version;

pub use blog::{
    Blog, CreateBlogInput, UpdateBlogInput, BLOG_PREVIEW_IMAGE_MAX_LEN, BLOG_TITLE_MAX_LEN,
};
pub use category::{Category, CreateCategoryInput, UpdateCategoryInput};
pub use product::{Product, ProductDetail, ProductListItem};
pub use session::Session;
pub use user::{Permission, User};
pub use version::{
    ActiveVersion, NewVersion, Version, VersionChange, VERSION_NAME_MAX_LEN, VERSION_NOT_SPECIFIED,
};
