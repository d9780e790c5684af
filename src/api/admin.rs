//! Admin API endpoints (superuser only)
//!
//! - POST /api/v1/admin/cache/clear - Drop the cached catalog lists
//! - POST /api/v1/admin/users/{id}/permissions - Grant permissions
//! - DELETE /api/v1/admin/users/{id}/permissions/{codename} - Revoke one

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, post},
    Json, Router,
};
use serde::Deserialize;

use crate::api::auth::UserResponse;
use crate::api::middleware::{ApiError, AppState};
use crate::models::Permission;

/// Request for granting permissions, by codename
#[derive(Debug, Deserialize)]
pub struct GrantRequest {
    pub permissions: Vec<String>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/admin/cache/clear", post(clear_cache))
        .route("/admin/users/{id}/permissions", post(grant_permissions))
        .route(
            "/admin/users/{id}/permissions/{codename}",
            delete(revoke_permission),
        )
}

async fn clear_cache(State(state): State<AppState>) -> Result<StatusCode, ApiError> {
    state.catalog.clear().await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn grant_permissions(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<GrantRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    let perms = body
        .permissions
        .iter()
        .map(|codename| parse_permission(codename))
        .collect::<Result<Vec<_>, _>>()?;

    let user = state.user_service.grant_permissions(id, &perms).await?;
    Ok(Json(user.into()))
}

async fn revoke_permission(
    State(state): State<AppState>,
    Path((id, codename)): Path<(i64, String)>,
) -> Result<Json<UserResponse>, ApiError> {
    let perm = parse_permission(&codename)?;
    let user = state.user_service.revoke_permission(id, perm).await?;
    Ok(Json(user.into()))
}

fn parse_permission(codename: &str) -> Result<Permission, ApiError> {
    codename
        .parse()
        .map_err(|_| ApiError::validation_error(format!("Unknown permission: {}", codename)))
}
