//! Blog API endpoints
//!
//! - GET /api/v1/blogs?published=true - List, newest first
//! - GET /api/v1/blogs/{id} - Detail; counts a view
//! - POST/PUT/DELETE - Any logged-in user

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::models::{Blog, CreateBlogInput, UpdateBlogInput};

#[derive(Debug, Default, Deserialize)]
pub struct ListBlogsQuery {
    pub published: Option<bool>,
}

pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/blogs", get(list_blogs))
        .route("/blogs/{id}", get(get_blog))
}

pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/blogs", post(create_blog))
        .route(
            "/blogs/{id}",
            axum::routing::put(update_blog).delete(delete_blog),
        )
}

async fn list_blogs(
    State(state): State<AppState>,
    Query(query): Query<ListBlogsQuery>,
) -> Result<Json<Vec<Blog>>, ApiError> {
    Ok(Json(state.blog_service.list(query.published).await?))
}

async fn get_blog(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Blog>, ApiError> {
    Ok(Json(state.blog_service.detail(id).await?))
}

async fn create_blog(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<CreateBlogInput>,
) -> Result<impl IntoResponse, ApiError> {
    let blog = state.blog_service.create(user.0.id, body).await?;
    Ok((StatusCode::CREATED, Json(blog)))
}

async fn update_blog(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<UpdateBlogInput>,
) -> Result<Json<Blog>, ApiError> {
    Ok(Json(state.blog_service.update(id, body).await?))
}

async fn delete_blog(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.blog_service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
