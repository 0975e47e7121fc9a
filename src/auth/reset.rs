use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;

use crate::config::RESET_TOKEN_TTL_HOURS;

const RESET_TOKEN_BYTES: usize = 32;

/// Opaque reset token: 32 random bytes, URL-safe base64.
pub fn generate_reset_token() -> String {
    let mut bytes = [0u8; RESET_TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

pub fn reset_token_expiry(now: DateTime<Utc>) -> DateTime<Utc> {
    now + Duration::hours(RESET_TOKEN_TTL_HOURS)
}

pub fn reset_link(frontend_url: &str, token: &str) -> String {
    format!("{}/reset-password?token={token}", frontend_url.trim_end_matches('/'))
}
