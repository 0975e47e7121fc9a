//! Authentication and authorization: password hashing, signed session
//! tokens, role gates, password-reset tokens and anti-forgery tokens.

pub mod csrf;
pub mod password;
pub mod reset;
pub mod service;
pub mod token;

pub use password::*;
pub use service::*;
pub use token::*;

use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

use crate::db::DatabaseError;
use crate::models::enums::Role;

static EMAIL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap());

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Invalid session token")]
    InvalidToken,

    #[error("Session token expired")]
    TokenExpired,

    #[error("Insufficient permissions")]
    Forbidden,

    #[error("Invalid or expired reset token")]
    InvalidOrExpired,

    #[error("{0}")]
    WeakPassword(String),

    #[error("Invalid email address: {0}")]
    InvalidEmail(String),

    #[error("Account not found: {0}")]
    AccountNotFound(String),

    #[error("Token signing failed: {0}")]
    Signing(String),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

/// Trim and lower-case an email, rejecting anything without a plausible
/// `local@domain.tld` shape.
pub fn normalize_email(raw: &str) -> Result<String, AuthError> {
    let email = raw.trim().to_lowercase();
    if !EMAIL_PATTERN.is_match(&email) {
        return Err(AuthError::InvalidEmail(raw.trim().to_string()));
    }
    Ok(email)
}

pub fn require_admin(claims: &Claims) -> Result<(), AuthError> {
    if claims.role == Role::Admin {
        Ok(())
    } else {
        Err(AuthError::Forbidden)
    }
}

/// Allow the account owner or any admin.
pub fn require_self_or_admin(claims: &Claims, owner_email: &str) -> Result<(), AuthError> {
    if claims.role == Role::Admin || claims.sub.eq_ignore_ascii_case(owner_email) {
        Ok(())
    } else {
        Err(AuthError::Forbidden)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims(sub: &str, role: Role) -> Claims {
        Claims {
            sub: sub.into(),
            role,
            iat: 0,
            exp: i64::MAX,
        }
    }

    #[test]
    fn admin_gate() {
        assert!(require_admin(&claims("a@x.io", Role::Admin)).is_ok());
        assert!(matches!(
            require_admin(&claims("p@x.io", Role::Patient)),
            Err(AuthError::Forbidden)
        ));
    }

    #[test]
    fn owner_or_admin_gate() {
        let patient = claims("p@x.io", Role::Patient);
        assert!(require_self_or_admin(&patient, "p@x.io").is_ok());
        assert!(require_self_or_admin(&patient, "P@X.io").is_ok());
        assert!(require_self_or_admin(&patient, "other@x.io").is_err());
        assert!(require_self_or_admin(&claims("a@x.io", Role::Admin), "other@x.io").is_ok());
    }

    #[test]
    fn email_normalized() {
        assert_eq!(normalize_email("  Ada@Example.COM ").unwrap(), "ada@example.com");
    }

    #[test]
    fn bad_emails_rejected() {
        for raw in ["", "ada", "ada@", "@example.com", "ada@example", "a da@example.com"] {
            assert!(normalize_email(raw).is_err(), "{raw} should be rejected");
        }
    }
}
