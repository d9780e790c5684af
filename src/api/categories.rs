//! Category API endpoints
//!
//! - GET /api/v1/categories - Category list (cached)
//! - POST /api/v1/categories - Create
//! - PUT /api/v1/categories/{id} - Update
//! - DELETE /api/v1/categories/{id} - Delete

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};

use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::models::{Category, CreateCategoryInput, Permission, UpdateCategoryInput};

pub fn public_router() -> Router<AppState> {
    Router::new().route("/categories", get(list_categories))
}

pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/categories", post(create_category))
        .route(
            "/categories/{id}",
            put(update_category).delete(delete_category),
        )
}

/// GET /api/v1/categories
async fn list_categories(State(state): State<AppState>) -> Result<Json<Vec<Category>>, ApiError> {
    Ok(Json(state.category_service.list().await?))
}

/// POST /api/v1/categories
async fn create_category(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<CreateCategoryInput>,
) -> Result<impl IntoResponse, ApiError> {
    user.require(Permission::AddCategory)?;
    let category = state.category_service.create(body).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

/// PUT /api/v1/categories/{id}
async fn update_category(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<UpdateCategoryInput>,
) -> Result<Json<Category>, ApiError> {
    user.require(Permission::ChangeCategory)?;
    Ok(Json(state.category_service.update(id, body).await?))
}

/// DELETE /api/v1/categories/{id}
async fn delete_category(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    user.require(Permission::DeleteCategory)?;
    state.category_service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
