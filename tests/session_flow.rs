//! End-to-end session lifecycle against the in-memory store.
//!
//! Covers login → refresh → revoke → refresh-fails, plus the failure modes
//! the HTTP layer has to tell apart (input vs auth vs infrastructure).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::http::{header::AUTHORIZATION, HeaderMap, HeaderValue, StatusCode};
use axum::response::IntoResponse;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use chirpy::auth::jwt::validate_access_token;
use chirpy::config::SessionConfig;
use chirpy::errors::{AppError, AuthFailure};
use chirpy::models::refresh_token::RefreshTokenRecord;
use chirpy::models::user::{UserCredentials, UserProfile};
use chirpy::session::SessionService;
use chirpy::store::memory::MemoryStore;
use chirpy::store::{RefreshTokenStore, StoreError, UserDirectory};

const SECRET: &str = "integration-secret";
const API_KEY: &str = "f271c81ff7084ee5b99a5091b42d486e";

fn config() -> SessionConfig {
    let mut cfg = SessionConfig::new(SECRET, API_KEY);
    cfg.bcrypt_cost = 4;
    cfg
}

fn sessions(store: &MemoryStore) -> SessionService {
    SessionService::new(&config(), Arc::new(store.clone()), Arc::new(store.clone()))
}

fn bearer(token: &str) -> HeaderMap {
    let mut h = HeaderMap::new();
    h.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {}", token)).unwrap());
    h
}

#[tokio::test]
async fn test_full_session_lifecycle() {
    let store = MemoryStore::new();
    let svc = sessions(&store);

    let user = svc.register("a@b.com", "hunter2").await.unwrap();

    let login = svc.login("a@b.com", "hunter2").await.unwrap();
    assert_eq!(login.user.id, user.id);
    assert_eq!(login.user.email, "a@b.com");
    assert_eq!(validate_access_token(&login.token, SECRET), Ok(user.id));

    // refresh yields a different access token for the same user
    let refreshed = svc.refresh(&bearer(&login.refresh_token)).await.unwrap();
    assert_ne!(refreshed.token, login.token);
    assert_eq!(validate_access_token(&refreshed.token, SECRET), Ok(user.id));
    assert_eq!(svc.authorize(&bearer(&refreshed.token)).await.unwrap(), user.id);

    // the refresh token is not rotated; it keeps working until revoked
    svc.refresh(&bearer(&login.refresh_token)).await.unwrap();

    svc.revoke(&bearer(&login.refresh_token)).await.unwrap();

    let err = svc.refresh(&bearer(&login.refresh_token)).await.unwrap_err();
    assert!(matches!(err, AppError::Unauthorized(AuthFailure::RefreshRevoked)));
    assert_eq!(err.into_response().status(), StatusCode::UNAUTHORIZED);

    // revocation is permanent
    let err = svc.refresh(&bearer(&login.refresh_token)).await.unwrap_err();
    assert!(matches!(err, AppError::Unauthorized(_)));

    // access tokens already handed out stay valid until they expire
    assert_eq!(svc.authorize(&bearer(&refreshed.token)).await.unwrap(), user.id);
}

#[tokio::test]
async fn test_revoking_one_session_leaves_others_alone() {
    let store = MemoryStore::new();
    let svc = sessions(&store);
    svc.register("a@b.com", "hunter2").await.unwrap();

    let phone = svc.login("a@b.com", "hunter2").await.unwrap();
    let laptop = svc.login("a@b.com", "hunter2").await.unwrap();

    svc.revoke(&bearer(&phone.refresh_token)).await.unwrap();

    assert!(svc.refresh(&bearer(&phone.refresh_token)).await.is_err());
    assert!(svc.refresh(&bearer(&laptop.refresh_token)).await.is_ok());
}

#[tokio::test]
async fn test_second_revoke_succeeds_unknown_is_unauthorized() {
    let store = MemoryStore::new();
    let svc = sessions(&store);
    svc.register("a@b.com", "hunter2").await.unwrap();
    let login = svc.login("a@b.com", "hunter2").await.unwrap();

    svc.revoke(&bearer(&login.refresh_token)).await.unwrap();
    // the record still exists, so a second revoke is accepted
    svc.revoke(&bearer(&login.refresh_token)).await.unwrap();

    let never_issued = svc.revoke(&bearer("00ff")).await.unwrap_err();
    assert_eq!(never_issued.into_response().status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_expired_refresh_token_is_rejected() {
    let store = MemoryStore::new();
    let svc = sessions(&store);
    let user = svc.register("a@b.com", "hunter2").await.unwrap();

    let issued = Utc::now() - chrono::Duration::days(61);
    let record = RefreshTokenRecord::new(
        "ab".repeat(32),
        user.id,
        issued,
        issued + chrono::Duration::days(60),
    );
    store.insert_refresh_token(&record).await.unwrap();

    let err = svc.refresh(&bearer(&record.token)).await.unwrap_err();
    assert!(matches!(err, AppError::Unauthorized(AuthFailure::RefreshExpired)));
}

#[tokio::test]
async fn test_missing_and_malformed_headers_are_input_errors() {
    let store = MemoryStore::new();
    let svc = sessions(&store);

    let err = svc.refresh(&HeaderMap::new()).await.unwrap_err();
    assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);

    let mut h = HeaderMap::new();
    h.insert(AUTHORIZATION, HeaderValue::from_static("InvalidBearer abc"));
    let err = svc.revoke(&h).await.unwrap_err();
    assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_privileged_callback() {
    let store = MemoryStore::new();
    let svc = sessions(&store);

    let mut h = HeaderMap::new();
    h.insert(AUTHORIZATION, HeaderValue::from_str(&format!("ApiKey {}", API_KEY)).unwrap());
    assert!(svc.authorize_callback(&h).await.is_ok());

    let mut h = HeaderMap::new();
    h.insert(AUTHORIZATION, HeaderValue::from_static("ApiKey wrong"));
    let err = svc.authorize_callback(&h).await.unwrap_err();
    assert_eq!(err.into_response().status(), StatusCode::UNAUTHORIZED);

    // a user's access token is not an api key
    let user = svc.register("a@b.com", "hunter2").await.unwrap();
    let login = svc.login("a@b.com", "hunter2").await.unwrap();
    assert_eq!(login.user.id, user.id);
    assert!(svc.authorize_callback(&bearer(&login.token)).await.is_err());
}

/// Identity store whose every call hangs, to exercise the store deadline.
struct StalledStore;

#[async_trait]
impl UserDirectory for StalledStore {
    async fn get_user_by_email(&self, _: &str) -> Result<Option<UserCredentials>, StoreError> {
        std::future::pending().await
    }

    async fn get_user_by_id(&self, _: Uuid) -> Result<Option<UserProfile>, StoreError> {
        std::future::pending().await
    }

    async fn create_user(&self, _: &str, _: &str) -> Result<UserProfile, StoreError> {
        std::future::pending().await
    }

    async fn reset_users(&self) -> Result<u64, StoreError> {
        std::future::pending().await
    }
}

#[async_trait]
impl RefreshTokenStore for StalledStore {
    async fn insert_refresh_token(&self, _: &RefreshTokenRecord) -> Result<(), StoreError> {
        std::future::pending().await
    }

    async fn get_refresh_token(&self, _: &str) -> Result<Option<RefreshTokenRecord>, StoreError> {
        std::future::pending().await
    }

    async fn revoke_refresh_token(&self, _: &str, _: DateTime<Utc>) -> Result<bool, StoreError> {
        std::future::pending().await
    }
}

#[tokio::test]
async fn test_stalled_store_is_unavailable_not_unauthorized() {
    let mut cfg = config();
    cfg.store_timeout = Duration::from_millis(20);
    let svc = SessionService::new(&cfg, Arc::new(StalledStore), Arc::new(StalledStore));

    let err = svc.login("a@b.com", "hunter2").await.unwrap_err();
    assert!(err.is_retryable());
    assert!(matches!(err, AppError::Unavailable(StoreError::Timeout(_))));

    let err = svc.refresh(&bearer("deadbeef")).await.unwrap_err();
    assert!(err.is_retryable());
    assert_eq!(err.into_response().status(), StatusCode::SERVICE_UNAVAILABLE);

    let err = svc.revoke(&bearer("deadbeef")).await.unwrap_err();
    assert!(matches!(err, AppError::Unavailable(_)));
}
