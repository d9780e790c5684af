//! Database layer
//!
//! SQLite (default, single file) and MySQL are both supported; the driver is
//! chosen by configuration and hidden behind the `DatabasePool` trait.
//!
//! ```ignore
//! use catalog::config::DatabaseConfig;
//! use catalog::db::{create_pool, migrations};
//!
//! let pool = create_pool(&DatabaseConfig::default()).await?;
//! migrations::run_migrations(&pool).await?;
//! pool.ping().await?;
//! ```

pub mod migrations;
pub mod pool;
pub mod repositories;

pub use pool::{
    create_pool, create_test_pool, DatabasePool, DynDatabasePool, MysqlDatabase, SqliteDatabase,
};
