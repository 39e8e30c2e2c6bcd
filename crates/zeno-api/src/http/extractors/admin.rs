//! Admin key authentication extractor.
//!
//! When `admin_api_key` is configured, admin routes require it in either:
//! - `Authorization: Bearer <key>` header
//! - `X-API-Key: <key>` header
//!
//! Keys are compared by SHA-256 digest. Without a configured key the admin
//! routes are open.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use sha2::{Digest, Sha256};

use crate::http::error::AppError;
use crate::state::AppState;

/// Authorized admin request marker.
pub struct AdminAuthorized;

impl FromRequestParts<AppState> for AdminAuthorized {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Some(expected) = state.config.admin_api_key.as_deref() else {
            return Ok(AdminAuthorized);
        };

        let provided = extract_api_key(parts)?;
        if keys_match(&provided, expected) {
            Ok(AdminAuthorized)
        } else {
            tracing::warn!("rejected admin request with invalid key");
            Err(AppError::Unauthorized("Invalid admin API key.".to_string()))
        }
    }
}

/// Extract the API key from request headers.
fn extract_api_key(parts: &Parts) -> Result<String, AppError> {
    if let Some(auth) = parts.headers.get("authorization") {
        let auth_str = auth.to_str().map_err(|_| {
            AppError::Unauthorized("Invalid Authorization header encoding".to_string())
        })?;
        if let Some(key) = auth_str.strip_prefix("Bearer ") {
            return Ok(key.trim().to_string());
        }
    }

    if let Some(key) = parts.headers.get("x-api-key") {
        let key_str = key.to_str().map_err(|_| {
            AppError::Unauthorized("Invalid X-API-Key header encoding".to_string())
        })?;
        return Ok(key_str.trim().to_string());
    }

    Err(AppError::Unauthorized(
        "Missing admin API key. Provide via 'Authorization: Bearer <key>' or 'X-API-Key: <key>' header.".to_string(),
    ))
}

/// Compute SHA-256 hash of an API key (lowercase hex).
pub fn hash_api_key(key: &str) -> String {
    let digest = Sha256::digest(key.as_bytes());
    format!("{:x}", digest)
}

/// Constant-time comparison of the two key digests.
fn keys_match(provided: &str, expected: &str) -> bool {
    let a = hash_api_key(provided);
    let b = hash_api_key(expected);
    a.bytes().zip(b.bytes()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts(header: Option<(&str, &str)>) -> Parts {
        let mut builder = Request::builder().uri("/api/admin/stats");
        if let Some((name, value)) = header {
            builder = builder.header(name, value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn extracts_bearer_and_x_api_key() {
        assert_eq!(
            extract_api_key(&parts(Some(("authorization", "Bearer  k1 ")))).unwrap(),
            "k1"
        );
        assert_eq!(
            extract_api_key(&parts(Some(("x-api-key", "k2")))).unwrap(),
            "k2"
        );
        assert!(extract_api_key(&parts(None)).is_err());
    }

    #[test]
    fn key_comparison() {
        assert!(keys_match("secret", "secret"));
        assert!(!keys_match("secret", "secreT"));
        assert!(!keys_match("", "secret"));
    }

    #[test]
    fn hash_is_lowercase_hex() {
        let h = hash_api_key("abc");
        assert_eq!(h.len(), 64);
        assert_eq!(
            h,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
