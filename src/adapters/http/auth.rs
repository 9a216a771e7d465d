//! Request authentication: session JWTs for user routes, a static bearer key for the batch trigger.

use super::error::ApiError;
use super::AppState;
use crate::domain::DomainError;
use axum::extract::FromRequestParts;
use axum::http::header::{AUTHORIZATION, COOKIE};
use axum::http::request::Parts;
use axum::http::HeaderMap;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

pub const SESSION_COOKIE: &str = "auth-token";

/// Claims of a dashboard session token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    pub exp: u64,
}

/// Verify an HS256 session token and return its claims.
pub fn decode_session(token: &str, secret: &str) -> Result<SessionClaims, DomainError> {
    let validation = Validation::new(Algorithm::HS256);
    decode::<SessionClaims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)
        .map(|data| data.claims)
        .map_err(|e| DomainError::Auth(e.to_string()))
}

fn bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

fn session_cookie(headers: &HeaderMap) -> Option<&str> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value)
        .filter(|v| !v.is_empty())
}

/// Session token from the `auth-token` cookie, else the bearer header.
pub fn session_token(headers: &HeaderMap) -> Option<&str> {
    session_cookie(headers).or_else(|| bearer(headers))
}

/// Batch trigger guard. An unset or empty key rejects every call.
pub fn require_internal_key(headers: &HeaderMap, expected: Option<&str>) -> Result<(), ApiError> {
    let expected = expected
        .filter(|k| !k.is_empty())
        .ok_or_else(|| ApiError::unauthorized("Unauthorized"))?;
    match bearer(headers) {
        Some(given) if given == expected => Ok(()),
        _ => Err(ApiError::unauthorized("Unauthorized")),
    }
}

/// Authenticated dashboard user.
pub struct AuthUser(pub SessionClaims);

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let secret = state
            .jwt_secret
            .as_deref()
            .ok_or_else(|| ApiError::unauthorized("Unauthorized"))?;
        let token = session_token(&parts.headers).ok_or_else(|| ApiError::unauthorized("Unauthorized"))?;
        let claims = decode_session(token, secret).map_err(|e| {
            tracing::debug!(error = %e, "session token rejected");
            ApiError::unauthorized("Unauthorized")
        })?;
        Ok(Self(claims))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn token(secret: &str, exp: u64) -> String {
        let claims = SessionClaims {
            id: "user-1".into(),
            email: Some("a@example.com".into()),
            name: None,
            exp,
        };
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    fn far_future() -> u64 {
        (chrono::Utc::now().timestamp() + 3600) as u64
    }

    #[test]
    fn decodes_valid_and_rejects_wrong_secret_or_expired() {
        let claims = decode_session(&token("s3cret", far_future()), "s3cret").unwrap();
        assert_eq!(claims.id, "user-1");
        assert!(decode_session(&token("other", far_future()), "s3cret").is_err());
        assert!(decode_session(&token("s3cret", 1_000), "s3cret").is_err());
    }

    #[test]
    fn cookie_wins_over_bearer() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("theme=dark; auth-token=from-cookie"));
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer from-header"));
        assert_eq!(session_token(&headers), Some("from-cookie"));

        headers.remove(COOKIE);
        assert_eq!(session_token(&headers), Some("from-header"));
    }

    #[test]
    fn internal_key_checks() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer key-1"));
        assert!(require_internal_key(&headers, Some("key-1")).is_ok());
        assert!(require_internal_key(&headers, Some("key-2")).is_err());
        assert!(require_internal_key(&headers, Some("")).is_err());
        assert!(require_internal_key(&headers, None).is_err());
        assert!(require_internal_key(&HeaderMap::new(), Some("key-1")).is_err());
    }
}
