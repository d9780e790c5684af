//! API middleware
//!
//! Shared application state, the JSON error type, session authentication
//! and permission checks.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::cache::Cache;
use crate::config::Config;
use crate::db::repositories::{
    SqlxBlogRepository, SqlxCategoryRepository, SqlxProductRepository, SqlxSessionRepository,
    SqlxUserRepository, SqlxVersionRepository,
};
use crate::db::DynDatabasePool;
use crate::models::{Permission, User};
use crate::services::{
    BlogService, BlogServiceError, CacheSettings, CatalogReader, CategoryService,
    CategoryServiceError, ProductService, ProductServiceError, UserService, UserServiceError,
};

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub user_service: Arc<UserService>,
    pub category_service: Arc<CategoryService>,
    pub product_service: Arc<ProductService>,
    pub blog_service: Arc<BlogService>,
    pub catalog: Arc<CatalogReader>,
}

impl AppState {
    /// Wire repositories and services over one pool and one cache
    pub fn new(pool: DynDatabasePool, cache: Arc<Cache>, config: &Config) -> Self {
        let category_repo = SqlxCategoryRepository::boxed(pool.clone());
        let product_repo = SqlxProductRepository::boxed(pool.clone());

        let catalog = Arc::new(CatalogReader::new(
            category_repo.clone(),
            product_repo.clone(),
            cache,
            CacheSettings::from_config(&config.cache),
        ));

        Self {
            user_service: Arc::new(UserService::with_session_days(
                SqlxUserRepository::boxed(pool.clone()),
                SqlxSessionRepository::boxed(pool.clone()),
                config.auth.session_days,
            )),
            category_service: Arc::new(CategoryService::new(
                category_repo.clone(),
                catalog.clone(),
            )),
            product_service: Arc::new(ProductService::new(
                product_repo,
                SqlxVersionRepository::boxed(pool.clone()),
                category_repo,
                catalog.clone(),
            )),
            blog_service: Arc::new(BlogService::new(SqlxBlogRepository::boxed(pool))),
            catalog,
        }
    }
}

/// Authenticated user extracted from request
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub User);

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or_else(|| ApiError::unauthorized("Authentication required"))
    }
}

impl AuthenticatedUser {
    /// Fail with 403 unless the user holds `perm`
    pub fn require(&self, perm: Permission) -> Result<&User, ApiError> {
        if self.0.has_perm(perm) {
            Ok(&self.0)
        } else {
            Err(ApiError::forbidden(format!("Missing permission {}", perm)))
        }
    }
}

/// Error response for API errors
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: Some(details),
            },
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new("UNAUTHORIZED", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new("FORBIDDEN", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("NOT_FOUND", message)
    }

    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::new("VALIDATION_ERROR", message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new("CONFLICT", message)
    }

    /// Log the cause and answer with a generic message
    pub fn internal_error(err: impl std::fmt::Display) -> Self {
        tracing::error!("Internal error: {:#}", err);
        Self::new("INTERNAL_ERROR", "Internal server error")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.error.code.as_str() {
            "UNAUTHORIZED" => StatusCode::UNAUTHORIZED,
            "FORBIDDEN" => StatusCode::FORBIDDEN,
            "NOT_FOUND" => StatusCode::NOT_FOUND,
            "VALIDATION_ERROR" => StatusCode::BAD_REQUEST,
            "CONFLICT" => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, Json(self)).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self::internal_error(err)
    }
}

impl From<UserServiceError> for ApiError {
    fn from(err: UserServiceError) -> Self {
        match err {
            UserServiceError::AuthenticationError(msg) => Self::unauthorized(msg),
            UserServiceError::ValidationError(msg) => Self::validation_error(msg),
            UserServiceError::UserExists(email) => {
                Self::conflict(format!("Email '{}' is already registered", email))
            }
            UserServiceError::NotFound(id) => Self::not_found(format!("User not found: {}", id)),
            UserServiceError::InternalError(e) => Self::internal_error(e),
        }
    }
}

impl From<CategoryServiceError> for ApiError {
    fn from(err: CategoryServiceError) -> Self {
        match err {
            CategoryServiceError::NotFound(id) => {
                Self::not_found(format!("Category not found: {}", id))
            }
            CategoryServiceError::ValidationError(msg) => Self::validation_error(msg),
            CategoryServiceError::InternalError(e) => Self::internal_error(e),
        }
    }
}

impl From<ProductServiceError> for ApiError {
    fn from(err: ProductServiceError) -> Self {
        match err {
            ProductServiceError::NotFound(id) => {
                Self::not_found(format!("Product not found: {}", id))
            }
            ProductServiceError::Forbidden(reason) => Self::forbidden(reason),
            ProductServiceError::Invalid(state) => match serde_json::to_value(&*state) {
                Ok(details) => Self::with_details(
                    "VALIDATION_ERROR",
                    "Please correct the errors below",
                    details,
                ),
                Err(e) => Self::internal_error(e),
            },
            ProductServiceError::InternalError(e) => Self::internal_error(e),
        }
    }
}

impl From<BlogServiceError> for ApiError {
    fn from(err: BlogServiceError) -> Self {
        match err {
            BlogServiceError::NotFound(id) => Self::not_found(format!("Blog post not found: {}", id)),
            BlogServiceError::ValidationError(msg) => Self::validation_error(msg),
            BlogServiceError::InternalError(e) => Self::internal_error(e),
        }
    }
}

/// Session token from `Authorization: Bearer` or the `session` cookie
pub fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());
    if let Some(token) = bearer {
        return Some(token.to_string());
    }

    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|h| h.to_str().ok())
        .flat_map(|s| s.split(';'))
        .filter_map(|c| c.trim().strip_prefix("session="))
        .find(|t| !t.is_empty())
        .map(str::to_string)
}

/// Authentication middleware
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_session_token(request.headers())
        .ok_or_else(|| ApiError::unauthorized("Missing authentication token"))?;

    let user = state
        .user_service
        .validate_session(&token)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Invalid or expired session"))?;

    request.extensions_mut().insert(AuthenticatedUser(user));
    Ok(next.run(request).await)
}

/// Superuser authorization middleware; runs after `require_auth`
pub async fn require_superuser(request: Request, next: Next) -> Result<Response, ApiError> {
    let user = request
        .extensions()
        .get::<AuthenticatedUser>()
        .ok_or_else(|| ApiError::unauthorized("Authentication required"))?;

    if !(user.0.is_active && user.0.is_superuser) {
        return Err(ApiError::forbidden("Superuser privileges required"));
    }

    Ok(next.run(request).await)
}
