pub mod api_key;
pub mod header;
pub mod jwt;
pub mod password;
pub mod refresh;

use chrono::{DateTime, Duration, Utc};

/// `issued_at + lifetime`, clamped to the representable range instead of
/// overflowing.
pub(crate) fn expiry_after(issued_at: DateTime<Utc>, lifetime: Duration) -> DateTime<Utc> {
    match issued_at.checked_add_signed(lifetime) {
        Some(at) => at,
        None if lifetime < Duration::zero() => DateTime::<Utc>::MIN_UTC,
        None => DateTime::<Utc>::MAX_UTC,
    }
}
