//! Session flows: the single entry point the HTTP layer calls into.
//!
//! Lineage of a refresh token: issued `Active` at login, moved to `Revoked`
//! by an explicit revoke (terminal). `Expired` is derived at read time once
//! the expiry passes. Nothing ever returns to `Active`.
//!
//! Refresh tokens are not rotated when used: the same token keeps working
//! for new access tokens until it expires or is revoked.

use axum::http::HeaderMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::OnceCell;
use uuid::Uuid;

use crate::auth::api_key::{mask, ApiKey};
use crate::auth::header::{extract_api_key, extract_bearer};
use crate::auth::jwt::AccessTokenCodec;
use crate::auth::password::{hash_password, verify_password, PasswordError};
use crate::auth::refresh::{RefreshError, RefreshTokens};
use crate::config::{Platform, SessionConfig};
use crate::errors::{AppError, AuthFailure};
use crate::models::user::UserProfile;
use crate::store::{with_deadline, RefreshTokenStore, StoreError, UserDirectory};

const DUMMY_PASSWORD: &str = "chirpy-dummy-password";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    #[serde(flatten)]
    pub user: UserProfile,
    pub token: String,
    pub refresh_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshResponse {
    pub token: String,
}

pub struct SessionService {
    users: Arc<dyn UserDirectory>,
    access: AccessTokenCodec,
    refresh: RefreshTokens,
    api_key: ApiKey,
    bcrypt_cost: u32,
    store_timeout: std::time::Duration,
    // verified against when the email is unknown, so timing does not reveal it.
    // Filled in `new`; built lazily only if that failed.
    dummy_hash: OnceCell<String>,
}

impl SessionService {
    pub fn new(
        config: &SessionConfig,
        users: Arc<dyn UserDirectory>,
        refresh_store: Arc<dyn RefreshTokenStore>,
    ) -> Self {
        let access = AccessTokenCodec::new(config.secret.clone(), config.access_token_ttl)
            .with_leeway(config.token_leeway_secs);
        let refresh = RefreshTokens::new(refresh_store, config.refresh_token_ttl, config.store_timeout);

        Self {
            users,
            access,
            refresh,
            api_key: ApiKey::new(config.api_key.clone()),
            bcrypt_cost: config.bcrypt_cost,
            store_timeout: config.store_timeout,
            dummy_hash: OnceCell::new_with(bcrypt::hash(DUMMY_PASSWORD, config.bcrypt_cost).ok()),
        }
    }

    /// Create an account. The password is hashed before it reaches the store.
    pub async fn register(&self, email: &str, password: &str) -> Result<UserProfile, AppError> {
        if email.trim().is_empty() {
            return Err(AppError::InvalidInput("email is required"));
        }
        if password.is_empty() {
            return Err(AppError::InvalidInput("password is required"));
        }

        let hash = hash_password(password, self.bcrypt_cost)
            .await
            .map_err(|e| AppError::Internal(e.into()))?;

        let user = with_deadline(self.store_timeout, self.users.create_user(email, &hash))
            .await
            .map_err(|e| match e {
                StoreError::Conflict(what) => AppError::Conflict(what),
                other => AppError::Unavailable(other),
            })?;

        tracing::info!(user_id = %user.id, "registered user");
        Ok(user)
    }

    /// Delete every account and its refresh tokens. Only allowed on the dev
    /// platform.
    pub async fn reset_users(&self, platform: Platform) -> Result<u64, AppError> {
        if platform != Platform::Dev {
            tracing::warn!(platform = ?platform, "refused user reset outside dev");
            return Err(AppError::Forbidden("reset is only allowed on the dev platform"));
        }

        let removed = with_deadline(self.store_timeout, self.users.reset_users()).await?;
        tracing::warn!(removed, "reset all users");
        Ok(removed)
    }

    /// Password login. Unknown email and wrong password fail identically.
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, AppError> {
        let credentials = with_deadline(self.store_timeout, self.users.get_user_by_email(email)).await?;

        let Some(credentials) = credentials else {
            self.verify_against_dummy(password).await?;
            tracing::debug!("login rejected: unknown email");
            return Err(AppError::Unauthorized(AuthFailure::InvalidCredentials));
        };

        match verify_password(password, &credentials.password_hash).await {
            Ok(()) => {}
            Err(PasswordError::Mismatch) => {
                tracing::debug!(user_id = %credentials.id, "login rejected: wrong password");
                return Err(AppError::Unauthorized(AuthFailure::InvalidCredentials));
            }
            Err(PasswordError::Malformed(e)) => {
                tracing::error!(user_id = %credentials.id, "stored password hash is unusable: {}", e);
                return Err(AppError::Unauthorized(AuthFailure::InvalidCredentials));
            }
            Err(e @ PasswordError::Hashing(_)) => return Err(AppError::Internal(e.into())),
        }

        let user = with_deadline(self.store_timeout, self.users.get_user_by_id(credentials.id))
            .await?
            .ok_or_else(|| anyhow::anyhow!("user {} disappeared during login", credentials.id))?;

        let token = self.issue_access_token(user.id)?;
        let refresh_token = self.refresh.issue(user.id).await?;

        tracing::info!(user_id = %user.id, "user logged in");
        Ok(LoginResponse {
            user,
            token,
            refresh_token,
        })
    }

    /// Exchange the refresh token in `Authorization: Bearer` for a new access token.
    pub async fn refresh(&self, headers: &HeaderMap) -> Result<RefreshResponse, AppError> {
        let presented = extract_bearer(headers)?;

        let user_id = self.refresh.resolve(&presented).await.map_err(|e| {
            log_refresh_failure("refresh", &e);
            AppError::from(e)
        })?;

        let token = self.issue_access_token(user_id)?;
        tracing::debug!(user_id = %user_id, "issued access token from refresh token");
        Ok(RefreshResponse { token })
    }

    /// Revoke the refresh token in `Authorization: Bearer`. Unknown tokens
    /// are an authorization failure.
    pub async fn revoke(&self, headers: &HeaderMap) -> Result<(), AppError> {
        let presented = extract_bearer(headers)?;

        self.refresh.revoke(&presented).await.map_err(|e| {
            log_refresh_failure("revoke", &e);
            AppError::from(e)
        })?;

        tracing::info!("refresh token revoked");
        Ok(())
    }

    /// Authenticate an API call by its access token; returns the user id.
    pub async fn authorize(&self, headers: &HeaderMap) -> Result<Uuid, AppError> {
        let presented = extract_bearer(headers)?;

        self.access.validate(&presented).map_err(|kind| {
            tracing::debug!(kind = ?kind, "access token rejected");
            AppError::from(kind)
        })
    }

    /// Authorize a privileged server-to-server callback by its API key.
    pub async fn authorize_callback(&self, headers: &HeaderMap) -> Result<(), AppError> {
        let presented = extract_api_key(headers)?;

        if self.api_key.matches(&presented) {
            Ok(())
        } else {
            // SECURITY: never log the expected key or the full provided key
            tracing::warn!("callback rejected: invalid api key (provided: '{}')", mask(&presented));
            Err(AppError::Unauthorized(AuthFailure::ApiKeyMismatch))
        }
    }

    fn issue_access_token(&self, user_id: Uuid) -> Result<String, AppError> {
        self.access
            .issue(user_id)
            .map_err(|e| AppError::Internal(anyhow::Error::new(e).context("signing access token")))
    }

    async fn verify_against_dummy(&self, password: &str) -> Result<(), AppError> {
        let cost = self.bcrypt_cost;
        let hash = self
            .dummy_hash
            .get_or_try_init(|| async move { hash_password(DUMMY_PASSWORD, cost).await })
            .await
            .map_err(|e| AppError::Internal(e.into()))?;

        // the outcome is irrelevant; only the time spent matters
        let _ = verify_password(password, hash).await;
        Ok(())
    }
}

fn log_refresh_failure(flow: &str, err: &RefreshError) {
    match err {
        RefreshError::Store(e) => tracing::error!(flow, "refresh token store failed: {}", e),
        kind => tracing::debug!(flow, "refresh token rejected: {}", kind),
    }
}
