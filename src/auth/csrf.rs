//! Double-submit anti-forgery tokens: the value handed out at login is set
//! as the `csrf_token` cookie and must be echoed in `X-CSRF-Token` on every
//! state-changing request.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;
use subtle::ConstantTimeEq;

pub const CSRF_COOKIE: &str = "csrf_token";
pub const CSRF_HEADER: &str = "X-CSRF-Token";

pub fn generate_csrf_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// GET, HEAD and OPTIONS never need a token.
pub fn is_safe_method(method: &str) -> bool {
    matches!(method, "GET" | "HEAD" | "OPTIONS")
}

pub fn tokens_match(header: &str, cookie: &str) -> bool {
    !header.is_empty() && bool::from(header.as_bytes().ct_eq(cookie.as_bytes()))
}

/// Find a cookie value in a `Cookie` header.
pub fn cookie_value<'a>(cookie_header: &'a str, name: &str) -> Option<&'a str> {
    cookie_header
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value)
}

pub fn set_cookie_header(token: &str) -> String {
    format!("{CSRF_COOKIE}={token}; Path=/; SameSite=Strict")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn safe_methods() {
        assert!(is_safe_method("GET"));
        assert!(is_safe_method("OPTIONS"));
        assert!(!is_safe_method("POST"));
        assert!(!is_safe_method("DELETE"));
    }

    #[test]
    fn matching_requires_equal_nonempty_values() {
        assert!(tokens_match("abc", "abc"));
        assert!(!tokens_match("abc", "abd"));
        assert!(!tokens_match("abc", "abcd"));
        assert!(!tokens_match("", ""));
    }

    #[test]
    fn cookie_lookup() {
        let header = "theme=dark; csrf_token=xyz123; other=1";
        assert_eq!(cookie_value(header, "csrf_token"), Some("xyz123"));
        assert_eq!(cookie_value(header, "missing"), None);
    }

    #[test]
    fn generated_tokens_differ() {
        assert_ne!(generate_csrf_token(), generate_csrf_token());
    }

    #[test]
    fn cookie_header_format() {
        assert_eq!(set_cookie_header("t"), "csrf_token=t; Path=/; SameSite=Strict");
    }
}
