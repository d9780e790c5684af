//! Product API endpoints
//!
//! Reads are public. Writes carry the product fields at the top level of
//! the body and the version rows under `versions`; a rejected submission
//! answers 400 with the bound form and formset in `error.details`.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::forms::EditState;
use crate::models::{ProductDetail, ProductListItem};
use crate::services::ProductSubmission;

pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/products", get(list_products))
        .route("/products/{id}", get(get_product))
}

pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/products", post(create_product))
        .route("/products/new", get(new_product_form))
        .route("/products/{id}/edit", get(edit_product_form))
        .route(
            "/products/{id}",
            axum::routing::put(update_product).delete(delete_product),
        )
}

/// GET /api/v1/products
async fn list_products(
    State(state): State<AppState>,
) -> Result<Json<Vec<ProductListItem>>, ApiError> {
    Ok(Json(state.product_service.list().await?))
}

/// GET /api/v1/products/{id}
async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ProductDetail>, ApiError> {
    Ok(Json(state.product_service.detail(id).await?))
}

/// GET /api/v1/products/new
async fn new_product_form(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<EditState>, ApiError> {
    Ok(Json(state.product_service.new_form(&user.0).await?))
}

/// POST /api/v1/products
async fn create_product(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<ProductSubmission>,
) -> Result<impl IntoResponse, ApiError> {
    let detail = state.product_service.create(&user.0, body).await?;
    Ok((StatusCode::CREATED, Json(detail)))
}

/// GET /api/v1/products/{id}/edit
async fn edit_product_form(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<EditState>, ApiError> {
    Ok(Json(state.product_service.edit_form(&user.0, id).await?))
}

/// PUT /api/v1/products/{id}
async fn update_product(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<ProductSubmission>,
) -> Result<Json<ProductDetail>, ApiError> {
    Ok(Json(state.product_service.update(&user.0, id, body).await?))
}

/// DELETE /api/v1/products/{id}
async fn delete_product(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.product_service.delete(&user.0, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
