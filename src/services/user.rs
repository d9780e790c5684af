//! User service
//!
//! Registration, login/logout, session validation and permission grants.
//! The first user to register becomes a superuser.

use crate::db::repositories::{SessionRepository, UserRepository};
use crate::models::{Permission, Session, User};
use crate::services::password::{hash_password, verify_password};
use anyhow::Context;
use serde::Deserialize;
use std::sync::Arc;

/// Default session lifetime in days
pub const DEFAULT_SESSION_DAYS: i64 = 7;

/// Error types for user service operations
#[derive(Debug, thiserror::Error)]
pub enum UserServiceError {
    /// Authentication failed (invalid credentials)
    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    /// Validation error (invalid input)
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Email already registered
    #[error("User already exists: {0}")]
    UserExists(String),

    /// User not found
    #[error("User not found: {0}")]
    NotFound(i64),

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Input for user registration
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterInput {
    pub email: String,
    pub password: String,
}

impl RegisterInput {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

/// Input for user login
#[derive(Debug, Clone, Deserialize)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
}

impl LoginInput {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

/// User service for managing users and authentication
pub struct UserService {
    user_repo: Arc<dyn UserRepository>,
    session_repo: Arc<dyn SessionRepository>,
    session_days: i64,
}

impl UserService {
    pub fn new(
        user_repo: Arc<dyn UserRepository>,
        session_repo: Arc<dyn SessionRepository>,
    ) -> Self {
        Self::with_session_days(user_repo, session_repo, DEFAULT_SESSION_DAYS)
    }

    /// Create a user service whose sessions last `session_days` days
    pub fn with_session_days(
        user_repo: Arc<dyn UserRepository>,
        session_repo: Arc<dyn SessionRepository>,
        session_days: i64,
    ) -> Self {
        Self {
            user_repo,
            session_repo,
            session_days,
        }
    }

    /// Register a new user.
    ///
    /// # Errors
    /// - `ValidationError` for an empty password or a malformed email
    /// - `UserExists` if the email is already registered
    pub async fn register(&self, input: RegisterInput) -> Result<User, UserServiceError> {
        let email = input.email.trim().to_lowercase();
        validate_register_input(&email, &input.password)?;

        if self
            .user_repo
            .get_by_email(&email)
            .await
            .context("Failed to check email")?
            .is_some()
        {
            return Err(UserServiceError::UserExists(email));
        }

        let is_first = self
            .user_repo
            .count()
            .await
            .context("Failed to count users")?
            == 0;

        let password_hash = hash_password(&input.password)?;
        let created = self
            .user_repo
            .create(&User::new(email, password_hash, is_first))
            .await
            .context("Failed to create user")?;

        if is_first {
            tracing::info!("First user {} registered as superuser", created.email);
        }

        Ok(created)
    }

    /// Check credentials and open a new session.
    ///
    /// Expired sessions are pruned on every login.
    pub async fn login(&self, input: LoginInput) -> Result<Session, UserServiceError> {
        let invalid =
            || UserServiceError::AuthenticationError("Invalid email or password".to_string());

        let email = input.email.trim().to_lowercase();
        let user = self
            .user_repo
            .get_by_email(&email)
            .await
            .context("Failed to get user by email")?
            .ok_or_else(invalid)?;

        if !verify_password(&input.password, &user.password_hash)? {
            return Err(invalid());
        }

        if !user.is_active {
            return Err(UserServiceError::AuthenticationError(
                "This account is inactive".to_string(),
            ));
        }

        match self.session_repo.delete_expired().await {
            Ok(0) => {}
            Ok(n) => tracing::debug!("Pruned {} expired sessions", n),
            Err(e) => tracing::warn!("Failed to prune expired sessions: {:#}", e),
        }

        let session = self
            .session_repo
            .create(&Session::start(user.id, self.session_days))
            .await
            .context("Failed to create session")?;

        Ok(session)
    }

    /// Delete a session. Unknown tokens are ignored.
    pub async fn logout(&self, token: &str) -> Result<(), UserServiceError> {
        self.session_repo
            .delete(token)
            .await
            .context("Failed to delete session")?;
        Ok(())
    }

    /// Resolve a session token to its user.
    ///
    /// Returns `None` for unknown or expired sessions and for inactive users.
    pub async fn validate_session(&self, token: &str) -> Result<Option<User>, UserServiceError> {
        let Some(session) = self
            .session_repo
            .get_by_id(token)
            .await
            .context("Failed to get session")?
        else {
            return Ok(None);
        };

        if session.is_expired() {
            if let Err(e) = self.session_repo.delete(token).await {
                tracing::warn!("Failed to delete expired session: {:#}", e);
            }
            return Ok(None);
        }

        let user = self
            .user_repo
            .get_by_id(session.user_id)
            .await
            .context("Failed to get user")?;

        Ok(user.filter(|u| u.is_active))
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<User>, UserServiceError> {
        Ok(self
            .user_repo
            .get_by_id(id)
            .await
            .context("Failed to get user by ID")?)
    }

    /// Grant permissions to a user and return the updated user
    pub async fn grant_permissions(
        &self,
        user_id: i64,
        perms: &[Permission],
    ) -> Result<User, UserServiceError> {
        self.require_user(user_id).await?;
        for perm in perms {
            self.user_repo.grant_permission(user_id, *perm).await?;
        }
        tracing::info!("Granted {:?} to user {}", perms, user_id);
        self.require_user(user_id).await
    }

    /// Revoke one permission and return the updated user
    pub async fn revoke_permission(
        &self,
        user_id: i64,
        perm: Permission,
    ) -> Result<User, UserServiceError> {
        self.require_user(user_id).await?;
        self.user_repo.revoke_permission(user_id, perm).await?;
        tracing::info!("Revoked {} from user {}", perm, user_id);
        self.require_user(user_id).await
    }

    async fn require_user(&self, user_id: i64) -> Result<User, UserServiceError> {
        self.get_by_id(user_id)
            .await?
            .ok_or(UserServiceError::NotFound(user_id))
    }
}

fn validate_register_input(email: &str, password: &str) -> Result<(), UserServiceError> {
    if email.is_empty() {
        return Err(UserServiceError::ValidationError(
            "Email cannot be empty".to_string(),
        ));
    }

    let valid_shape = email
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));
    if !valid_shape {
        return Err(UserServiceError::ValidationError(
            "Invalid email format".to_string(),
        ));
    }

    if password.is_empty() {
        return Err(UserServiceError::ValidationError(
            "Password cannot be empty".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxSessionRepository, SqlxUserRepository};
    use crate::db::{create_test_pool, migrations, DynDatabasePool};
    use chrono::{Duration, Utc};

    async fn setup() -> (DynDatabasePool, UserService) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let service = UserService::new(
            SqlxUserRepository::boxed(pool.clone()),
            SqlxSessionRepository::boxed(pool.clone()),
        );
        (pool, service)
    }

    #[tokio::test]
    async fn test_first_user_becomes_superuser() {
        let (_pool, service) = setup().await;

        let first = service
            .register(RegisterInput::new("Admin@Example.com", "pw"))
            .await
            .unwrap();
        let second = service
            .register(RegisterInput::new("user@example.com", "pw"))
            .await
            .unwrap();

        assert!(first.is_superuser);
        assert_eq!(first.email, "admin@example.com");
        assert!(!second.is_superuser);
    }

    #[tokio::test]
    async fn test_register_rejects_bad_input() {
        let (_pool, service) = setup().await;

        for (email, password) in [("", "pw"), ("no-at-sign", "pw"), ("a@b.com", "")] {
            let result = service.register(RegisterInput::new(email, password)).await;
            assert!(matches!(result, Err(UserServiceError::ValidationError(_))));
        }

        service
            .register(RegisterInput::new("a@b.com", "pw"))
            .await
            .unwrap();
        let dup = service.register(RegisterInput::new("A@B.com", "pw")).await;
        assert!(matches!(dup, Err(UserServiceError::UserExists(_))));
    }

    #[tokio::test]
    async fn test_login_logout_roundtrip() {
        let (_pool, service) = setup().await;
        let user = service
            .register(RegisterInput::new("a@b.com", "pw"))
            .await
            .unwrap();

        let session = service.login(LoginInput::new("a@b.com", "pw")).await.unwrap();
        let current = service.validate_session(&session.id).await.unwrap().unwrap();
        assert_eq!(current.id, user.id);

        service.logout(&session.id).await.unwrap();
        assert!(service.validate_session(&session.id).await.unwrap().is_none());
        service.logout("never-issued").await.unwrap();
    }

    #[tokio::test]
    async fn test_login_rejects_bad_credentials() {
        let (_pool, service) = setup().await;
        service
            .register(RegisterInput::new("a@b.com", "pw"))
            .await
            .unwrap();

        let wrong = service.login(LoginInput::new("a@b.com", "nope")).await;
        assert!(matches!(wrong, Err(UserServiceError::AuthenticationError(_))));

        let unknown = service.login(LoginInput::new("x@b.com", "pw")).await;
        assert!(matches!(unknown, Err(UserServiceError::AuthenticationError(_))));
    }

    #[tokio::test]
    async fn test_expired_session_is_rejected_and_removed() {
        let (pool, service) = setup().await;
        let user = service
            .register(RegisterInput::new("a@b.com", "pw"))
            .await
            .unwrap();

        let sessions = SqlxSessionRepository::new(pool);
        let mut stale = Session::start(user.id, 1);
        stale.expires_at = Utc::now() - Duration::minutes(1);
        sessions.create(&stale).await.unwrap();

        assert!(service.validate_session(&stale.id).await.unwrap().is_none());
        assert!(sessions.get_by_id(&stale.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_grant_and_revoke_permissions() {
        let (_pool, service) = setup().await;
        service
            .register(RegisterInput::new("root@b.com", "pw"))
            .await
            .unwrap();
        let user = service
            .register(RegisterInput::new("mod@b.com", "pw"))
            .await
            .unwrap();

        let updated = service
            .grant_permissions(user.id, &Permission::MODERATOR)
            .await
            .unwrap();
        assert!(updated.has_perms(&Permission::MODERATOR));

        let updated = service
            .revoke_permission(user.id, Permission::CanEditCategory)
            .await
            .unwrap();
        assert!(!updated.has_perm(Permission::CanEditCategory));

        let missing = service.grant_permissions(999, &[Permission::AddProduct]).await;
        assert!(matches!(missing, Err(UserServiceError::NotFound(999))));
    }
}
