//! Blog post model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum length of a blog title, in characters
pub const BLOG_TITLE_MAX_LEN: usize = 150;

/// Maximum length of a preview image path
pub const BLOG_PREVIEW_IMAGE_MAX_LEN: usize = 255;

/// A blog post.
///
/// The slug is derived from the title once, when the post is created, and
/// is left alone by later edits.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Blog {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub content: String,
    /// Path or URL of the preview image
    pub preview_image: Option<String>,
    pub is_published: bool,
    /// Number of detail views
    pub view_counter: i64,
    pub owner_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// Input for creating a blog post
#[derive(Debug, Clone, Deserialize)]
pub struct CreateBlogInput {
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub preview_image: Option<String>,
    #[serde(default = "default_published")]
    pub is_published: bool,
}

fn default_published() -> bool {
    true
}

/// Input for updating a blog post; absent fields keep their value
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateBlogInput {
    pub title: Option<String>,
    pub content: Option<String>,
    pub preview_image: Option<String>,
    pub is_published: Option<bool>,
}
