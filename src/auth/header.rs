//! `Authorization` header parsing for the two schemes the service accepts:
//! `Bearer <token>` for user sessions and `ApiKey <key>` for privileged
//! callbacks. Scheme words match case-sensitively.

use axum::http::{header::AUTHORIZATION, HeaderMap};
use thiserror::Error;

pub const BEARER_SCHEME: &str = "Bearer";
pub const API_KEY_SCHEME: &str = "ApiKey";

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum HeaderError {
    #[error("no authorization header included in request")]
    Missing,

    #[error("malformed authorization header")]
    Malformed,
}

/// Returns the token from `Authorization: Bearer <token>`.
pub fn extract_bearer(headers: &HeaderMap) -> Result<String, HeaderError> {
    extract_credential(headers, BEARER_SCHEME)
}

/// Returns the key from `Authorization: ApiKey <key>`.
pub fn extract_api_key(headers: &HeaderMap) -> Result<String, HeaderError> {
    extract_credential(headers, API_KEY_SCHEME)
}

fn extract_credential(headers: &HeaderMap, scheme: &str) -> Result<String, HeaderError> {
    let Some(value) = headers.get(AUTHORIZATION) else {
        return Err(HeaderError::Missing);
    };
    let value = value.to_str().map_err(|_| HeaderError::Malformed)?;
    if value.trim().is_empty() {
        return Err(HeaderError::Missing);
    }

    let mut fields = value.split_whitespace();
    match (fields.next(), fields.next()) {
        (Some(word), Some(credential)) if word == scheme => Ok(credential.to_string()),
        _ => Err(HeaderError::Malformed),
    }
}
