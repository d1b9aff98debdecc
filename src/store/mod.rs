pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

use crate::models::refresh_token::RefreshTokenRecord;
use crate::models::user::{UserCredentials, UserProfile};

/// Infrastructure failures. Always retryable from the caller's point of view,
/// never an authentication outcome.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store call timed out after {0:?}")]
    Timeout(Duration),

    #[error("duplicate key: {0}")]
    Conflict(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Identity/account store consumed by the session flows.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn get_user_by_email(&self, email: &str) -> Result<Option<UserCredentials>, StoreError>;

    async fn get_user_by_id(&self, id: Uuid) -> Result<Option<UserProfile>, StoreError>;

    /// Fails with `StoreError::Conflict` when the email is already taken.
    async fn create_user(&self, email: &str, password_hash: &str) -> Result<UserProfile, StoreError>;

    /// Delete every account along with its refresh tokens. Returns the number
    /// of accounts removed.
    async fn reset_users(&self) -> Result<u64, StoreError>;
}

/// Durable refresh-token records. Each method is a single record operation.
#[async_trait]
pub trait RefreshTokenStore: Send + Sync {
    async fn insert_refresh_token(&self, record: &RefreshTokenRecord) -> Result<(), StoreError>;

    async fn get_refresh_token(&self, token: &str) -> Result<Option<RefreshTokenRecord>, StoreError>;

    /// Marks the record revoked at `at`, keeping an earlier revocation time if
    /// one exists. Returns false when no record matches.
    async fn revoke_refresh_token(&self, token: &str, at: DateTime<Utc>) -> Result<bool, StoreError>;
}

/// Bound a store call by `deadline`. Dropping the returned future cancels the call.
pub async fn with_deadline<T, F>(deadline: Duration, fut: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    match tokio::time::timeout(deadline, fut).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::Timeout(deadline)),
    }
}
