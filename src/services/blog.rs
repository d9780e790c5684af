//! Blog service
//!
//! Posts get their slug once, from the title at creation. Every detail
//! read counts as a view.

use crate::db::repositories::BlogRepository;
use crate::models::{
    Blog, CreateBlogInput, UpdateBlogInput, BLOG_PREVIEW_IMAGE_MAX_LEN, BLOG_TITLE_MAX_LEN,
};
use anyhow::Context;
use chrono::Utc;
use slug::slugify;
use std::sync::Arc;

/// Error types for blog service operations
#[derive(Debug, thiserror::Error)]
pub enum BlogServiceError {
    /// Blog post not found
    #[error("Blog post not found: {0}")]
    NotFound(i64),

    /// Validation error
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct BlogService {
    repo: Arc<dyn BlogRepository>,
}

impl BlogService {
    pub fn new(repo: Arc<dyn BlogRepository>) -> Self {
        Self { repo }
    }

    /// Posts newest first, optionally filtered on the published flag
    pub async fn list(&self, published: Option<bool>) -> Result<Vec<Blog>, BlogServiceError> {
        Ok(self
            .repo
            .list(published)
            .await
            .context("Failed to list blog posts")?)
    }

    /// Load a post and count the view.
    ///
    /// The returned post carries the incremented counter.
    pub async fn detail(&self, id: i64) -> Result<Blog, BlogServiceError> {
        let mut blog = self.get(id).await?;
        blog.view_counter = self
            .repo
            .increment_views(id)
            .await
            .context("Failed to count view")?
            .ok_or(BlogServiceError::NotFound(id))?;
        Ok(blog)
    }

    /// Create a post owned by `owner_id`, slugged from its title
    pub async fn create(
        &self,
        owner_id: i64,
        input: CreateBlogInput,
    ) -> Result<Blog, BlogServiceError> {
        let title = validate_title(&input.title)?;
        let blog = Blog {
            id: 0,
            slug: generate_slug(&title),
            title,
            content: input.content,
            preview_image: clean_image(input.preview_image)?,
            is_published: input.is_published,
            view_counter: 0,
            owner_id: Some(owner_id),
            created_at: Utc::now(),
        };

        let created = self
            .repo
            .create(&blog)
            .await
            .context("Failed to create blog post")?;
        tracing::info!("Created blog post {} ({})", created.id, created.slug);
        Ok(created)
    }

    /// Apply the fields present in `input`. The slug stays as created.
    pub async fn update(&self, id: i64, input: UpdateBlogInput) -> Result<Blog, BlogServiceError> {
        let mut blog = self.get(id).await?;

        if let Some(title) = input.title {
            blog.title = validate_title(&title)?;
        }
        if let Some(content) = input.content {
            blog.content = content;
        }
        if let Some(image) = input.preview_image {
            blog.preview_image = clean_image(Some(image))?;
        }
        if let Some(is_published) = input.is_published {
            blog.is_published = is_published;
        }

        self.repo
            .update(&blog)
            .await
            .context("Failed to update blog post")?
            .ok_or(BlogServiceError::NotFound(id))
    }

    pub async fn delete(&self, id: i64) -> Result<(), BlogServiceError> {
        self.get(id).await?;
        self.repo
            .delete(id)
            .await
            .context("Failed to delete blog post")?;
        Ok(())
    }

    async fn get(&self, id: i64) -> Result<Blog, BlogServiceError> {
        self.repo
            .get_by_id(id)
            .await
            .context("Failed to get blog post")?
            .ok_or(BlogServiceError::NotFound(id))
    }
}

fn validate_title(title: &str) -> Result<String, BlogServiceError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(BlogServiceError::ValidationError(
            "Title cannot be empty".to_string(),
        ));
    }
    if title.chars().count() > BLOG_TITLE_MAX_LEN {
        return Err(BlogServiceError::ValidationError(format!(
            "Title cannot exceed {} characters",
            BLOG_TITLE_MAX_LEN
        )));
    }
    Ok(title.to_string())
}

fn clean_image(image: Option<String>) -> Result<Option<String>, BlogServiceError> {
    let image = image
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());
    if let Some(path) = &image {
        if path.chars().count() > BLOG_PREVIEW_IMAGE_MAX_LEN {
            return Err(BlogServiceError::ValidationError(format!(
                "Preview image cannot exceed {} characters",
                BLOG_PREVIEW_IMAGE_MAX_LEN
            )));
        }
    }
    Ok(image)
}

/// Derive a URL slug from a title.
///
/// Non-ASCII characters are transliterated to ASCII, then the text is
/// lowercased and anything other than letters, digits, underscores,
/// hyphens and whitespace is dropped. Runs of hyphens and whitespace
/// become one `-`, and leading or trailing `-`/`_` are stripped, so
/// "Café au lait" gives `cafe-au-lait` and "v1.2 release" gives
/// `v12-release`.
pub fn generate_slug(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut separator = false;

    for c in title.chars() {
        if c.is_whitespace() || c == '-' {
            separator = true;
        } else if c.is_ascii_alphanumeric() || c == '_' {
            push_slug_char(&mut slug, &mut separator, c.to_ascii_lowercase());
        } else if !c.is_ascii() {
            for folded in slugify(c.to_string()).chars() {
                push_slug_char(&mut slug, &mut separator, folded);
            }
        }
    }

    slug.trim_matches(|c| c == '-' || c == '_').to_string()
}

fn push_slug_char(slug: &mut String, separator: &mut bool, c: char) {
    if *separator && !slug.is_empty() {
        slug.push('-');
    }
    *separator = false;
    slug.push(c);
}
