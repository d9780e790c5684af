//! Catalog - a product catalog with versioned products and a blog
//!
//! Products carry any number of versions and are edited through a form
//! plus a version formset saved in one transaction. Category and product
//! lists are served from a cache that is only dropped explicitly.

pub mod api;
pub mod cache;
pub mod config;
pub mod db;
pub mod forms;
pub mod models;
pub mod services;
