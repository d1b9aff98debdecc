use std::time::Duration;

use crate::auth::jwt::DEFAULT_ACCESS_TOKEN_TTL_SECS;
use crate::auth::password::DEFAULT_BCRYPT_COST;
use crate::auth::refresh::DEFAULT_REFRESH_TOKEN_TTL_DAYS;

/// Upper bounds for the configurable lifetimes.
pub const MAX_ACCESS_TOKEN_TTL_SECS: i64 = 24 * 60 * 60;
pub const MAX_REFRESH_TOKEN_TTL_DAYS: i64 = 3650;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Dev,
    Production,
}

/// Everything the session flows need, passed in at construction.
#[derive(Clone)]
pub struct SessionConfig {
    /// HS256 signing secret for access tokens.
    pub secret: String,
    /// Key expected from privileged callers (`Authorization: ApiKey ...`).
    pub api_key: String,
    pub access_token_ttl: chrono::Duration,
    pub refresh_token_ttl: chrono::Duration,
    /// Seconds of clock skew tolerated on access token `iat`/`exp`.
    pub token_leeway_secs: u64,
    pub bcrypt_cost: u32,
    /// Deadline applied to each store call.
    pub store_timeout: Duration,
}

impl std::fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // SECURITY: never print the secret or the api key
        f.debug_struct("SessionConfig")
            .field("access_token_ttl", &self.access_token_ttl)
            .field("refresh_token_ttl", &self.refresh_token_ttl)
            .field("token_leeway_secs", &self.token_leeway_secs)
            .field("bcrypt_cost", &self.bcrypt_cost)
            .field("store_timeout", &self.store_timeout)
            .finish_non_exhaustive()
    }
}

impl SessionConfig {
    /// Defaults for everything except the two secrets.
    pub fn new(secret: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            api_key: api_key.into(),
            access_token_ttl: chrono::Duration::seconds(DEFAULT_ACCESS_TOKEN_TTL_SECS),
            refresh_token_ttl: chrono::Duration::days(DEFAULT_REFRESH_TOKEN_TTL_DAYS),
            token_leeway_secs: 0,
            bcrypt_cost: DEFAULT_BCRYPT_COST,
            store_timeout: Duration::from_millis(5000),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub platform: Platform,
    pub session: SessionConfig,
}

pub fn load() -> anyhow::Result<Config> {
    dotenvy::dotenv().ok();
    from_lookup(|key| std::env::var(key).ok())
}

/// Build a `Config` from any key lookup. Missing secrets and unparseable
/// numbers are fatal.
pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Config>
where
    F: Fn(&str) -> Option<String>,
{
    let required = |key: &str| -> anyhow::Result<String> {
        match lookup(key) {
            Some(v) if !v.trim().is_empty() => Ok(v),
            _ => anyhow::bail!("{} must be set", key),
        }
    };

    let platform = match lookup("CHIRPY_PLATFORM").as_deref().map(str::trim) {
        None | Some("") | Some("production") => Platform::Production,
        Some("dev") => Platform::Dev,
        Some(other) => anyhow::bail!("CHIRPY_PLATFORM must be 'dev' or 'production', got '{}'", other),
    };

    let mut session = SessionConfig::new(required("CHIRPY_SECRET")?, required("CHIRPY_API_KEY")?);

    if let Some(secs) = parse_var::<i64>(&lookup, "CHIRPY_ACCESS_TTL_SECS")? {
        if !(1..=MAX_ACCESS_TOKEN_TTL_SECS).contains(&secs) {
            anyhow::bail!(
                "CHIRPY_ACCESS_TTL_SECS must be between 1 and {}, got {}",
                MAX_ACCESS_TOKEN_TTL_SECS,
                secs
            );
        }
        session.access_token_ttl = chrono::Duration::try_seconds(secs)
            .ok_or_else(|| anyhow::anyhow!("CHIRPY_ACCESS_TTL_SECS out of range: {}", secs))?;
    }
    if let Some(days) = parse_var::<i64>(&lookup, "CHIRPY_REFRESH_TTL_DAYS")? {
        if !(1..=MAX_REFRESH_TOKEN_TTL_DAYS).contains(&days) {
            anyhow::bail!(
                "CHIRPY_REFRESH_TTL_DAYS must be between 1 and {}, got {}",
                MAX_REFRESH_TOKEN_TTL_DAYS,
                days
            );
        }
        session.refresh_token_ttl = chrono::Duration::try_days(days)
            .ok_or_else(|| anyhow::anyhow!("CHIRPY_REFRESH_TTL_DAYS out of range: {}", days))?;
    }
    if let Some(leeway) = parse_var::<u64>(&lookup, "CHIRPY_TOKEN_LEEWAY_SECS")? {
        session.token_leeway_secs = leeway;
    }
    if let Some(cost) = parse_var::<u32>(&lookup, "CHIRPY_BCRYPT_COST")? {
        if !(4..=31).contains(&cost) {
            anyhow::bail!("CHIRPY_BCRYPT_COST must be between 4 and 31, got {}", cost);
        }
        session.bcrypt_cost = cost;
    }
    if let Some(ms) = parse_var::<u64>(&lookup, "CHIRPY_STORE_TIMEOUT_MS")? {
        session.store_timeout = Duration::from_millis(ms);
    }

    Ok(Config {
        database_url: lookup("DATABASE_URL").unwrap_or_else(|| "postgres://localhost/chirpy".into()),
        platform,
        session,
    })
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> anyhow::Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| anyhow::anyhow!("invalid {}: {}", key, e)),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    const BASE: [(&str, &str); 2] = [("CHIRPY_SECRET", "s3cret"), ("CHIRPY_API_KEY", "k3y")];

    #[test]
    fn test_defaults() {
        let cfg = from_lookup(lookup(&BASE)).unwrap();
        assert_eq!(cfg.database_url, "postgres://localhost/chirpy");
        assert_eq!(cfg.platform, Platform::Production);
        assert_eq!(cfg.session.access_token_ttl, chrono::Duration::hours(1));
        assert_eq!(cfg.session.refresh_token_ttl, chrono::Duration::days(60));
        assert_eq!(cfg.session.bcrypt_cost, 10);
        assert_eq!(cfg.session.token_leeway_secs, 0);
        assert_eq!(cfg.session.store_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_missing_secret_is_fatal() {
        let err = from_lookup(lookup(&[("CHIRPY_API_KEY", "k3y")])).unwrap_err();
        assert!(err.to_string().contains("CHIRPY_SECRET"));

        let err = from_lookup(lookup(&[("CHIRPY_SECRET", "s3cret"), ("CHIRPY_API_KEY", " ")])).unwrap_err();
        assert!(err.to_string().contains("CHIRPY_API_KEY"));
    }

    #[test]
    fn test_overrides() {
        let mut pairs = BASE.to_vec();
        pairs.extend([
            ("DATABASE_URL", "postgres://db/chirpy"),
            ("CHIRPY_PLATFORM", "dev"),
            ("CHIRPY_ACCESS_TTL_SECS", "900"),
            ("CHIRPY_REFRESH_TTL_DAYS", "7"),
            ("CHIRPY_TOKEN_LEEWAY_SECS", "30"),
            ("CHIRPY_BCRYPT_COST", "12"),
            ("CHIRPY_STORE_TIMEOUT_MS", "250"),
        ]);
        let cfg = from_lookup(lookup(&pairs)).unwrap();
        assert_eq!(cfg.database_url, "postgres://db/chirpy");
        assert_eq!(cfg.platform, Platform::Dev);
        assert_eq!(cfg.session.access_token_ttl, chrono::Duration::minutes(15));
        assert_eq!(cfg.session.refresh_token_ttl, chrono::Duration::days(7));
        assert_eq!(cfg.session.token_leeway_secs, 30);
        assert_eq!(cfg.session.bcrypt_cost, 12);
        assert_eq!(cfg.session.store_timeout, Duration::from_millis(250));
    }

    #[test]
    fn test_bad_numbers_are_fatal() {
        let mut pairs = BASE.to_vec();
        pairs.push(("CHIRPY_BCRYPT_COST", "3"));
        assert!(from_lookup(lookup(&pairs)).is_err());

        let mut pairs = BASE.to_vec();
        pairs.push(("CHIRPY_ACCESS_TTL_SECS", "soon"));
        assert!(from_lookup(lookup(&pairs)).is_err());

        let mut pairs = BASE.to_vec();
        pairs.push(("CHIRPY_PLATFORM", "staging"));
        assert!(from_lookup(lookup(&pairs)).is_err());
    }

    #[test]
    fn test_oversized_lifetimes_are_fatal() {
        for (key, value) in [
            ("CHIRPY_ACCESS_TTL_SECS", "9223372036854775807"),
            ("CHIRPY_ACCESS_TTL_SECS", "86401"),
            ("CHIRPY_ACCESS_TTL_SECS", "0"),
            ("CHIRPY_REFRESH_TTL_DAYS", "100000000"),
            ("CHIRPY_REFRESH_TTL_DAYS", "3651"),
            ("CHIRPY_REFRESH_TTL_DAYS", "-1"),
        ] {
            let mut pairs = BASE.to_vec();
            pairs.push((key, value));
            let err = from_lookup(lookup(&pairs)).unwrap_err();
            assert!(err.to_string().contains(key), "{}={} accepted", key, value);
        }
    }

    #[test]
    fn test_lifetime_upper_bounds_are_inclusive() {
        let mut pairs = BASE.to_vec();
        pairs.push(("CHIRPY_ACCESS_TTL_SECS", "86400"));
        pairs.push(("CHIRPY_REFRESH_TTL_DAYS", "3650"));
        let cfg = from_lookup(lookup(&pairs)).unwrap();
        assert_eq!(cfg.session.access_token_ttl, chrono::Duration::days(1));
        assert_eq!(cfg.session.refresh_token_ttl, chrono::Duration::days(3650));
    }

    #[test]
    fn test_debug_hides_secrets() {
        let cfg = from_lookup(lookup(&BASE)).unwrap();
        let rendered = format!("{:?}", cfg);
        assert!(!rendered.contains("s3cret"));
        assert!(!rendered.contains("k3y"));
    }
}
