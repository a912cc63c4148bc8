//! Request extractors for admin authentication and client identity.

use std::convert::Infallible;
use std::net::SocketAddr;

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use constant_time_eq::constant_time_eq;
use sha2::{Digest, Sha256};

use crate::app_state::AppState;
use crate::error::GatewayError;

/// Expected admin bearer token, held as a SHA-256 digest.
#[derive(Clone)]
pub struct AdminCredentials {
    token_digest: Option<[u8; 32]>,
}

impl std::fmt::Debug for AdminCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminCredentials")
            .field("configured", &self.token_digest.is_some())
            .finish()
    }
}

impl AdminCredentials {
    /// Builds credentials for `token`. `None` disables admin access.
    #[must_use]
    pub fn new(token: Option<&str>) -> Self {
        Self {
            token_digest: token.map(digest),
        }
    }

    /// Returns `true` if `presented` matches the configured token.
    #[must_use]
    pub fn verify(&self, presented: &str) -> bool {
        let Some(expected) = &self.token_digest else {
            return false;
        };
        constant_time_eq(expected, &digest(presented))
    }
}

fn digest(token: &str) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(&Sha256::digest(token.as_bytes()));
    out
}

/// Marker extracted by handlers that require the admin bearer token.
#[derive(Debug, Clone, Copy)]
pub struct AdminAuth;

impl FromRequestParts<AppState> for AdminAuth {
    type Rejection = GatewayError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)
            .ok_or_else(|| GatewayError::Unauthorized("missing bearer token".to_string()))?;

        if state.admin.verify(token) {
            Ok(Self)
        } else {
            tracing::warn!(path = %parts.uri.path(), "admin token rejected");
            Err(GatewayError::Unauthorized("invalid admin token".to_string()))
        }
    }
}

/// The non-empty token of an `Authorization: Bearer` header.
#[must_use]
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Best-effort client address used as a rate-limit key.
///
/// Resolution order: first `X-Forwarded-For` entry, `X-Real-IP`, the peer
/// address from `ConnectInfo`, then `"unknown"`. Header values longer than
/// 64 bytes or containing anything but `[A-Za-z0-9.:-]` are ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientAddr(pub String);

impl<S> FromRequestParts<S> for ClientAddr
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string());
        Ok(Self(
            forwarded_client(&parts.headers)
                .or(peer)
                .unwrap_or_else(|| "unknown".to_string()),
        ))
    }
}

const MAX_CLIENT_ADDR_LEN: usize = 64;

fn forwarded_client(headers: &HeaderMap) -> Option<String> {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());
    header("x-forwarded-for")
        .and_then(|raw| raw.split(',').next())
        .and_then(plausible_addr)
        .or_else(|| header("x-real-ip").and_then(plausible_addr))
        .map(str::to_string)
}

fn plausible_addr(raw: &str) -> Option<&str> {
    let value = raw.trim();
    if value.is_empty() || value.len() > MAX_CLIENT_ADDR_LEN {
        return None;
    }
    value
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'.' || b == b':' || b == b'-')
        .then_some(value)
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn verify_matches_only_the_configured_token() {
        let creds = AdminCredentials::new(Some("s3cret"));
        assert!(creds.verify("s3cret"));
        assert!(!creds.verify("s3cret "));
        assert!(!creds.verify(""));
        assert!(!AdminCredentials::new(None).verify("s3cret"));
    }

    #[test]
    fn debug_does_not_leak_the_digest() {
        let rendered = format!("{:?}", AdminCredentials::new(Some("s3cret")));
        assert_eq!(rendered, "AdminCredentials { configured: true }");
    }

    #[test]
    fn forwarded_for_takes_first_hop() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.7, 10.0.0.1"));
        headers.insert("x-real-ip", HeaderValue::from_static("10.0.0.2"));
        assert_eq!(forwarded_client(&headers).as_deref(), Some("203.0.113.7"));
    }

    #[test]
    fn real_ip_is_the_fallback() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("10.0.0.2"));
        assert_eq!(forwarded_client(&headers).as_deref(), Some("10.0.0.2"));
        assert_eq!(forwarded_client(&HeaderMap::new()), None);
    }

    #[test]
    fn oversized_or_odd_forwarded_values_are_ignored() {
        let mut headers = HeaderMap::new();
        let long = "1".repeat(MAX_CLIENT_ADDR_LEN + 1);
        let Ok(value) = HeaderValue::from_str(&long) else {
            panic!("header value rejected");
        };
        headers.insert("x-forwarded-for", value);
        assert_eq!(forwarded_client(&headers), None);

        headers.insert("x-forwarded-for", HeaderValue::from_static("evil<script>"));
        headers.insert("x-real-ip", HeaderValue::from_static("2001:db8::1"));
        assert_eq!(forwarded_client(&headers).as_deref(), Some("2001:db8::1"));
    }
}
