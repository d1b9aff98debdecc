//! Refresh tokens: opaque, long-lived, revocable.
//!
//! A token is 32 bytes from the OS RNG, hex encoded, and is its own lookup
//! key. Collisions are not checked for; at 256 bits they are an accepted
//! theoretical risk, and a duplicate insert is rejected by the store.

use chrono::{DateTime, Duration, Utc};
use rand::rngs::OsRng;
use rand::RngCore;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::models::refresh_token::{RefreshTokenRecord, RefreshTokenState};
use crate::store::{with_deadline, RefreshTokenStore, StoreError};

pub const REFRESH_TOKEN_BYTES: usize = 32;

/// Default refresh token lifetime in days.
pub const DEFAULT_REFRESH_TOKEN_TTL_DAYS: i64 = 60;

#[derive(Debug, Error)]
pub enum RefreshError {
    #[error("refresh token not found")]
    NotFound,

    #[error("refresh token has expired")]
    Expired,

    #[error("refresh token has been revoked")]
    Revoked,

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub fn generate_refresh_token() -> String {
    let mut key = [0u8; REFRESH_TOKEN_BYTES];
    OsRng.fill_bytes(&mut key);
    hex::encode(key)
}

/// Issue, resolve and revoke refresh tokens against a durable store.
#[derive(Clone)]
pub struct RefreshTokens {
    store: Arc<dyn RefreshTokenStore>,
    ttl: Duration,
    deadline: std::time::Duration,
}

impl RefreshTokens {
    pub fn new(store: Arc<dyn RefreshTokenStore>, ttl: Duration, deadline: std::time::Duration) -> Self {
        Self { store, ttl, deadline }
    }

    pub async fn issue(&self, user_id: Uuid) -> Result<String, StoreError> {
        let now = Utc::now();
        let expires_at = super::expiry_after(now, self.ttl);
        let record = RefreshTokenRecord::new(generate_refresh_token(), user_id, now, expires_at);

        with_deadline(self.deadline, self.store.insert_refresh_token(&record)).await?;
        tracing::debug!(user_id = %user_id, expires_at = %record.expires_at, "issued refresh token");

        Ok(record.token)
    }

    pub async fn resolve(&self, token: &str) -> Result<Uuid, RefreshError> {
        self.resolve_at(token, Utc::now()).await
    }

    pub async fn resolve_at(&self, token: &str, now: DateTime<Utc>) -> Result<Uuid, RefreshError> {
        let record = with_deadline(self.deadline, self.store.get_refresh_token(token))
            .await?
            .ok_or(RefreshError::NotFound)?;

        match record.state_at(now) {
            RefreshTokenState::Active => Ok(record.user_id),
            RefreshTokenState::Revoked => Err(RefreshError::Revoked),
            RefreshTokenState::Expired => Err(RefreshError::Expired),
        }
    }

    /// Permanently disables `token`. Revoking twice is harmless; the first
    /// revocation time is kept.
    pub async fn revoke(&self, token: &str) -> Result<(), RefreshError> {
        let revoked = with_deadline(self.deadline, self.store.revoke_refresh_token(token, Utc::now())).await?;
        if revoked {
            Ok(())
        } else {
            Err(RefreshError::NotFound)
        }
    }
}
