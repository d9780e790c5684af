//! API layer - HTTP handlers and routing
//!
//! Every endpoint lives under `/api/v1`. Each resource module exposes a
//! public router and, where it has writes, a protected router that is
//! wrapped in `require_auth`.

pub mod admin;
pub mod auth;
pub mod blogs;
pub mod categories;
pub mod middleware;
pub mod products;

use anyhow::Context;
use axum::{
    http::{header, HeaderValue, Method},
    middleware as axum_middleware, Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub use middleware::{ApiError, AppState, AuthenticatedUser};

/// Build the `/api/v1` router
pub fn build_api_router(state: AppState) -> Router<AppState> {
    let admin_routes = admin::router()
        .route_layer(axum_middleware::from_fn(middleware::require_superuser))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    let protected_routes = Router::new()
        .merge(auth::protected_router())
        .merge(categories::protected_router())
        .merge(products::protected_router())
        .merge(blogs::protected_router())
        .route_layer(axum_middleware::from_fn_with_state(
            state,
            middleware::require_auth,
        ));

    Router::new()
        .merge(auth::public_router())
        .merge(categories::public_router())
        .merge(products::public_router())
        .merge(blogs::public_router())
        .merge(admin_routes)
        .merge(protected_routes)
}

/// Build the complete router with tracing and CORS
pub fn build_router(state: AppState, cors_origin: &str) -> anyhow::Result<Router> {
    let origin = cors_origin
        .parse::<HeaderValue>()
        .with_context(|| format!("Invalid CORS origin: {}", cors_origin))?;

    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::COOKIE])
        .allow_credentials(true);

    Ok(Router::new()
        .nest("/api/v1", build_api_router(state.clone()))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{Cache, MemoryCache};
    use crate::config::Config;
    use crate::db::{create_test_pool, migrations};
    use axum::http::StatusCode;
    use axum_test::TestServer;
    use serde_json::{json, Value};
    use std::sync::Arc;

    async fn server() -> TestServer {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let config = Config::default();
        let cache = Arc::new(Cache::Memory(MemoryCache::new()));
        let state = AppState::new(pool, cache, &config);
        let router = build_router(state, &config.server.cors_origin).unwrap();
        TestServer::new(router).unwrap()
    }

    /// Register and log in, returning the session token
    async fn sign_up(server: &TestServer, email: &str) -> String {
        let credentials = json!({ "email": email, "password": "pw" });
        server
            .post("/api/v1/auth/register")
            .json(&credentials)
            .await
            .assert_status(StatusCode::CREATED);

        let response = server.post("/api/v1/auth/login").json(&credentials).await;
        response.assert_status_ok();
        response.json::<Value>()["token"]
            .as_str()
            .expect("token")
            .to_string()
    }

    async fn me(server: &TestServer, token: &str) -> Value {
        server
            .get("/api/v1/auth/me")
            .authorization_bearer(token)
            .await
            .json::<Value>()
    }

    async fn grant(server: &TestServer, admin: &str, user_id: i64, perms: &[&str]) {
        server
            .post(&format!("/api/v1/admin/users/{}/permissions", user_id))
            .authorization_bearer(admin)
            .json(&json!({ "permissions": perms }))
            .await
            .assert_status_ok();
    }

    #[tokio::test]
    async fn test_auth_flow() {
        let server = server().await;
        let token = sign_up(&server, "root@example.com").await;

        let user = me(&server, &token).await;
        assert_eq!(user["email"], "root@example.com");
        assert_eq!(user["is_superuser"], true);
        assert!(user["permissions"]
            .as_array()
            .unwrap()
            .contains(&json!("catalog.add_product")));

        server
            .post("/api/v1/auth/logout")
            .authorization_bearer(&token)
            .await
            .assert_status(StatusCode::NO_CONTENT);
        server
            .get("/api/v1/auth/me")
            .authorization_bearer(&token)
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_login_failure_and_duplicate_registration() {
        let server = server().await;
        sign_up(&server, "a@example.com").await;

        let response = server
            .post("/api/v1/auth/login")
            .json(&json!({ "email": "a@example.com", "password": "wrong" }))
            .await;
        response.assert_status(StatusCode::UNAUTHORIZED);
        assert_eq!(response.json::<Value>()["error"]["code"], "UNAUTHORIZED");

        server
            .post("/api/v1/auth/register")
            .json(&json!({ "email": "a@example.com", "password": "pw" }))
            .await
            .assert_status(StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_product_edit_permissions() {
        let server = server().await;
        let admin = sign_up(&server, "root@example.com").await;
        let owner = sign_up(&server, "owner@example.com").await;
        let moderator = sign_up(&server, "mod@example.com").await;
        let stranger = sign_up(&server, "stranger@example.com").await;

        let owner_id = me(&server, &owner).await["id"].as_i64().unwrap();
        let moderator_id = me(&server, &moderator).await["id"].as_i64().unwrap();
        grant(&server, &admin, owner_id, &["catalog.add_product"]).await;
        grant(
            &server,
            &admin,
            moderator_id,
            &[
                "catalog.can_edit_is_published",
                "catalog.can_edit_description",
                "catalog.can_edit_category",
            ],
        )
        .await;

        server
            .post("/api/v1/products")
            .authorization_bearer(&stranger)
            .json(&json!({ "name": "Nope", "price": 1 }))
            .await
            .assert_status(StatusCode::FORBIDDEN);

        let created = server
            .post("/api/v1/products")
            .authorization_bearer(&owner)
            .json(&json!({
                "name": "Phone",
                "price": 49900,
                "is_published": true,
                "versions": [{ "version_number": 1, "name": "v1" }, {}],
            }))
            .await;
        created.assert_status(StatusCode::CREATED);
        let product = created.json::<Value>();
        let id = product["id"].as_i64().unwrap();
        assert_eq!(product["active_version"]["name"], "v1");

        let edit = server
            .get(&format!("/api/v1/products/{}/edit", id))
            .authorization_bearer(&moderator)
            .await
            .json::<Value>();
        assert_eq!(edit["form"]["class"], "ProductModeratorForm");
        assert_eq!(edit["formset"]["rows"].as_array().unwrap().len(), 2);

        let denied = server
            .put(&format!("/api/v1/products/{}", id))
            .authorization_bearer(&stranger)
            .json(&json!({ "name": "Hijacked", "price": 0 }))
            .await;
        denied.assert_status(StatusCode::FORBIDDEN);
        assert_eq!(denied.json::<Value>()["error"]["code"], "FORBIDDEN");

        let moderated = server
            .put(&format!("/api/v1/products/{}", id))
            .authorization_bearer(&moderator)
            .json(&json!({ "name": "Ignored", "description": "Checked" }))
            .await;
        moderated.assert_status_ok();
        let moderated = moderated.json::<Value>();
        assert_eq!(moderated["name"], "Phone");
        assert_eq!(moderated["description"], "Checked");
        assert_eq!(moderated["is_published"], false);
    }

    #[tokio::test]
    async fn test_invalid_submission_returns_bound_state() {
        let server = server().await;
        let admin = sign_up(&server, "root@example.com").await;

        let response = server
            .post("/api/v1/products")
            .authorization_bearer(&admin)
            .json(&json!({
                "name": "Phone",
                "price": 100,
                "versions": [{ "version_number": 0, "name": "zero" }],
            }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);

        let body = response.json::<Value>();
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
        let details = &body["error"]["details"];
        assert_eq!(details["form"]["data"]["name"], "Phone");
        assert!(details["formset"]["errors"]["rows"][0]["version_number"].is_array());

        let list = server.get("/api/v1/products").await.json::<Value>();
        assert_eq!(list, json!([]));
    }

    #[tokio::test]
    async fn test_lists_stay_cached_until_cleared() {
        let server = server().await;
        let admin = sign_up(&server, "root@example.com").await;

        assert_eq!(server.get("/api/v1/categories").await.json::<Value>(), json!([]));
        server
            .post("/api/v1/categories")
            .authorization_bearer(&admin)
            .json(&json!({ "name": "Phones", "in_stock": true }))
            .await
            .assert_status(StatusCode::CREATED);
        assert_eq!(server.get("/api/v1/categories").await.json::<Value>(), json!([]));

        server
            .post("/api/v1/admin/cache/clear")
            .authorization_bearer(&admin)
            .await
            .assert_status(StatusCode::NO_CONTENT);
        let categories = server.get("/api/v1/categories").await.json::<Value>();
        assert_eq!(categories[0]["name"], "Phones");
    }

    #[tokio::test]
    async fn test_admin_routes_need_superuser() {
        let server = server().await;
        sign_up(&server, "root@example.com").await;
        let user = sign_up(&server, "user@example.com").await;

        server
            .post("/api/v1/admin/cache/clear")
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
        server
            .post("/api/v1/admin/cache/clear")
            .authorization_bearer(&user)
            .await
            .assert_status(StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_blog_views_and_slug() {
        let server = server().await;
        let token = sign_up(&server, "writer@example.com").await;

        server
            .post("/api/v1/blogs")
            .json(&json!({ "title": "Anonymous" }))
            .await
            .assert_status(StatusCode::UNAUTHORIZED);

        let created = server
            .post("/api/v1/blogs")
            .authorization_bearer(&token)
            .json(&json!({ "title": "Hello, World!", "content": "Hi" }))
            .await;
        created.assert_status(StatusCode::CREATED);
        let blog = created.json::<Value>();
        assert_eq!(blog["slug"], "hello-world");
        let path = format!("/api/v1/blogs/{}", blog["id"]);

        assert_eq!(server.get(&path).await.json::<Value>()["view_counter"], 1);
        assert_eq!(server.get(&path).await.json::<Value>()["view_counter"], 2);

        let updated = server
            .put(&path)
            .authorization_bearer(&token)
            .json(&json!({ "title": "Renamed" }))
            .await
            .json::<Value>();
        assert_eq!(updated["slug"], "hello-world");
        assert_eq!(updated["view_counter"], 2);

        server
            .get("/api/v1/blogs/999")
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }
}
