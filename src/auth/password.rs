// Password hashing and verification

use thiserror::Error;

/// bcrypt work factor used when configuration does not override it.
pub const DEFAULT_BCRYPT_COST: u32 = 10;

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("password does not match")]
    Mismatch,

    #[error("stored hash is malformed: {0}")]
    Malformed(String),

    #[error("hashing failed: {0}")]
    Hashing(String),
}

/// Hash a password with bcrypt.
///
/// Every call draws a fresh salt, so hashing the same password twice gives
/// two different strings. Runs on the blocking pool; bcrypt is slow on purpose.
pub async fn hash_password(password: &str, cost: u32) -> Result<String, PasswordError> {
    let password = password.to_string();

    tokio::task::spawn_blocking(move || {
        bcrypt::hash(password, cost).map_err(|e| PasswordError::Hashing(e.to_string()))
    })
    .await
    .map_err(|e| PasswordError::Hashing(format!("task join error: {}", e)))?
}

/// Verify a password against a stored bcrypt hash.
///
/// The cost is read from the hash itself. The final comparison inside
/// bcrypt is constant-time.
pub async fn verify_password(password: &str, hash: &str) -> Result<(), PasswordError> {
    let password = password.to_string();
    let hash = hash.to_string();

    let matched = tokio::task::spawn_blocking(move || {
        bcrypt::verify(password, &hash).map_err(|e| PasswordError::Malformed(e.to_string()))
    })
    .await
    .map_err(|e| PasswordError::Hashing(format!("task join error: {}", e)))??;

    if matched {
        Ok(())
    } else {
        Err(PasswordError::Mismatch)
    }
}
