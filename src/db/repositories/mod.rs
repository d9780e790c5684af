//! Database repositories
//!
//! One repository per entity. Each exposes a trait for the services to
//! depend on and a `Sqlx*Repository` implementation covering SQLite and MySQL.

pub mod blog;
pub mod category;
pub mod product;
pub mod session;
pub mod user;
pub mod version;

pub use blog::{BlogRepository, SqlxBlogRepository};
pub use category::{CategoryRepository, SqlxCategoryRepository};
pub use product::{ProductRepository, SqlxProductRepository};
pub use session::{SessionRepository, SqlxSessionRepository};
pub use user::{SqlxUserRepository, UserRepository};
pub use version::{SqlxVersionRepository, VersionRepository};
