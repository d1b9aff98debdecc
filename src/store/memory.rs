//! In-process store backed by `DashMap`. Used by the test suite and by
//! embedders that want the session flows without Postgres.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use uuid::Uuid;

use super::{RefreshTokenStore, StoreError, UserDirectory};
use crate::models::refresh_token::RefreshTokenRecord;
use crate::models::user::{UserCredentials, UserProfile};

#[derive(Clone)]
struct UserRow {
    profile: UserProfile,
    password_hash: String,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    // keyed by email
    users: Arc<DashMap<String, UserRow>>,
    refresh_tokens: Arc<DashMap<String, RefreshTokenRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn refresh_token_count(&self) -> usize {
        self.refresh_tokens.len()
    }
}

#[async_trait]
impl UserDirectory for MemoryStore {
    async fn get_user_by_email(&self, email: &str) -> Result<Option<UserCredentials>, StoreError> {
        Ok(self.users.get(email).map(|row| UserCredentials {
            id: row.profile.id,
            password_hash: row.password_hash.clone(),
        }))
    }

    async fn get_user_by_id(&self, id: Uuid) -> Result<Option<UserProfile>, StoreError> {
        Ok(self
            .users
            .iter()
            .find(|row| row.profile.id == id)
            .map(|row| row.profile.clone()))
    }

    async fn create_user(&self, email: &str, password_hash: &str) -> Result<UserProfile, StoreError> {
        match self.users.entry(email.to_string()) {
            Entry::Occupied(_) => Err(StoreError::Conflict("users.email".to_string())),
            Entry::Vacant(slot) => {
                let now = Utc::now();
                let profile = UserProfile {
                    id: Uuid::new_v4(),
                    email: email.to_string(),
                    created_at: now,
                    updated_at: now,
                };
                slot.insert(UserRow {
                    profile: profile.clone(),
                    password_hash: password_hash.to_string(),
                });
                Ok(profile)
            }
        }
    }

    async fn reset_users(&self) -> Result<u64, StoreError> {
        let removed = self.users.len() as u64;
        self.users.clear();
        self.refresh_tokens.clear();
        Ok(removed)
    }
}

#[async_trait]
impl RefreshTokenStore for MemoryStore {
    async fn insert_refresh_token(&self, record: &RefreshTokenRecord) -> Result<(), StoreError> {
        match self.refresh_tokens.entry(record.token.clone()) {
            Entry::Occupied(_) => Err(StoreError::Conflict("refresh_tokens.token".to_string())),
            Entry::Vacant(slot) => {
                slot.insert(record.clone());
                Ok(())
            }
        }
    }

    async fn get_refresh_token(&self, token: &str) -> Result<Option<RefreshTokenRecord>, StoreError> {
        Ok(self.refresh_tokens.get(token).map(|r| r.value().clone()))
    }

    async fn revoke_refresh_token(&self, token: &str, at: DateTime<Utc>) -> Result<bool, StoreError> {
        match self.refresh_tokens.get_mut(token) {
            Some(mut record) => {
                if record.revoked_at.is_none() {
                    record.revoked_at = Some(at);
                }
                record.updated_at = at;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
