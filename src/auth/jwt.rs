//! Access tokens: short-lived HS256 JWTs binding a user id to this service.
//!
//! Validation runs its checks in a fixed order and reports the first failure:
//! 1. structure (three segments, decodable header, payload matching `AccessClaims`)
//! 2. signature under the shared secret
//! 3. time bounds (`Expired`, then `NotYetValid`), widened by the leeway
//! 4. issuer tag
//! 5. subject parses as a user id
//!
//! Validation is a pure function of token, secret, leeway and the clock
//! reading passed in; there is no shared state.

use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, decode_header, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Issuer tag carried by every access token this service signs.
pub const ACCESS_TOKEN_ISSUER: &str = "chirpy-access";

/// Default access token lifetime in seconds (1 hour).
pub const DEFAULT_ACCESS_TOKEN_TTL_SECS: i64 = 3600;

/// Why an access token was rejected. Never shown to end callers.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum TokenError {
    #[error("token is malformed")]
    Malformed,

    #[error("token signature is invalid")]
    SignatureInvalid,

    #[error("token has expired")]
    Expired,

    #[error("token is not valid yet")]
    NotYetValid,

    #[error("token issuer does not match")]
    IssuerMismatch,

    #[error("token subject is not a user id")]
    SubjectUnparseable,
}

/// Claims carried by an access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Subject (user id)
    pub sub: String,
    /// Issuer, always `ACCESS_TOKEN_ISSUER` for tokens we sign
    pub iss: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration (Unix timestamp)
    pub exp: i64,
    /// Random token id; keeps two tokens minted in the same second distinct
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,
}

impl AccessClaims {
    pub fn new(user_id: Uuid, issued_at: DateTime<Utc>, lifetime: Duration) -> Self {
        Self {
            sub: user_id.to_string(),
            iss: ACCESS_TOKEN_ISSUER.to_string(),
            iat: issued_at.timestamp(),
            exp: super::expiry_after(issued_at, lifetime).timestamp(),
            jti: Some(Uuid::new_v4().to_string()),
        }
    }
}

/// Signs and validates access tokens with one secret, lifetime and leeway.
#[derive(Clone)]
pub struct AccessTokenCodec {
    secret: String,
    lifetime: Duration,
    leeway_secs: i64,
}

impl std::fmt::Debug for AccessTokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessTokenCodec")
            .field("secret", &"****")
            .field("lifetime", &self.lifetime)
            .field("leeway_secs", &self.leeway_secs)
            .finish()
    }
}

impl AccessTokenCodec {
    pub fn new(secret: impl Into<String>, lifetime: Duration) -> Self {
        Self {
            secret: secret.into(),
            lifetime,
            leeway_secs: 0,
        }
    }

    /// Tolerate this many seconds of clock skew on `iat` and `exp`.
    pub fn with_leeway(mut self, leeway_secs: u64) -> Self {
        self.leeway_secs = i64::try_from(leeway_secs).unwrap_or(i64::MAX);
        self
    }

    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    pub fn issue(&self, user_id: Uuid) -> Result<String, jsonwebtoken::errors::Error> {
        self.issue_at(user_id, Utc::now())
    }

    pub fn issue_at(
        &self,
        user_id: Uuid,
        issued_at: DateTime<Utc>,
    ) -> Result<String, jsonwebtoken::errors::Error> {
        let claims = AccessClaims::new(user_id, issued_at, self.lifetime);
        sign_claims(&claims, &self.secret)
    }

    pub fn validate(&self, token: &str) -> Result<Uuid, TokenError> {
        self.validate_at(token, Utc::now())
    }

    pub fn validate_at(&self, token: &str, now: DateTime<Utc>) -> Result<Uuid, TokenError> {
        let claims = decode_unverified(token)?;
        verify_signature(token, &self.secret)?;

        let now = now.timestamp();
        if now > claims.exp.saturating_add(self.leeway_secs) {
            return Err(TokenError::Expired);
        }
        if now < claims.iat.saturating_sub(self.leeway_secs) {
            return Err(TokenError::NotYetValid);
        }

        if claims.iss != ACCESS_TOKEN_ISSUER {
            return Err(TokenError::IssuerMismatch);
        }

        Uuid::parse_str(&claims.sub).map_err(|_| TokenError::SubjectUnparseable)
    }
}

/// Issue an access token for `user_id` valid for `lifetime` from now.
/// A negative lifetime yields an already-expired token.
pub fn issue_access_token(
    user_id: Uuid,
    secret: &str,
    lifetime: Duration,
) -> Result<String, jsonwebtoken::errors::Error> {
    AccessTokenCodec::new(secret, lifetime).issue(user_id)
}

/// Validate an access token with no clock-skew leeway.
pub fn validate_access_token(token: &str, secret: &str) -> Result<Uuid, TokenError> {
    AccessTokenCodec::new(secret, Duration::zero()).validate(token)
}

pub(crate) fn sign_claims(
    claims: &AccessClaims,
    secret: &str,
) -> Result<String, jsonwebtoken::errors::Error> {
    let header = Header::new(Algorithm::HS256);
    encode(&header, claims, &EncodingKey::from_secret(secret.as_bytes()))
}

fn decode_unverified(token: &str) -> Result<AccessClaims, TokenError> {
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 || parts.iter().any(|p| p.is_empty()) {
        return Err(TokenError::Malformed);
    }

    decode_header(token).map_err(|_| TokenError::Malformed)?;

    let engine = base64::engine::general_purpose::URL_SAFE_NO_PAD;
    let payload = engine.decode(parts[1]).map_err(|_| TokenError::Malformed)?;
    serde_json::from_slice(&payload).map_err(|_| TokenError::Malformed)
}

fn verify_signature(token: &str, secret: &str) -> Result<(), TokenError> {
    // Time and issuer checks happen afterwards, in our own order.
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = false;
    validation.validate_nbf = false;
    validation.required_spec_claims.clear();

    decode::<AccessClaims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)
        .map(|_| ())
        .map_err(|e| match e.kind() {
            ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => TokenError::SignatureInvalid,
            _ => TokenError::Malformed,
        })
}
