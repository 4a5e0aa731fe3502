//! Principal Extractor (4.H): normalizes an authenticated subject into a
//! `Principal` string, falling back to `"admin"` when auth is disabled.
//!
//! Full OIDC discovery and JWKS verification are out of core scope — the
//! core only needs *a* string to scope Store calls by. When auth is
//! enabled this verifies a locally-signed HMAC bearer token, which keeps
//! the extractor's decoding step isolated so a JWKS-backed verifier can
//! replace it later without touching call sites.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::error::Error;

pub const ADMIN_PRINCIPAL: &str = "admin";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: i64,
    pub iat: i64,
}

/// Issues and verifies the bearer tokens this core accepts when
/// `auth_enabled` is set. Not an OIDC client: the secret is a local HMAC
/// key configured by the operator, not fetched from an issuer.
#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtService {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    pub fn generate_token(&self, subject: &str, ttl: std::time::Duration) -> Result<String, Error> {
        let now = chrono::Utc::now().timestamp();
        let claims = Claims {
            sub: subject.to_string(),
            iat: now,
            exp: now + ttl.as_secs() as i64,
        };
        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| Error::unauthorized(format!("failed to issue token: {e}")))
    }

    pub fn validate_token(&self, token: &str) -> Result<Claims, Error> {
        decode::<Claims>(token, &self.decoding_key, &Validation::default())
            .map(|data| data.claims)
            .map_err(|e| Error::unauthorized(format!("invalid token: {e}")))
    }
}

/// Authentication mode shared through `AppState`.
#[derive(Clone)]
pub enum AuthMode {
    Disabled,
    Enabled(JwtService),
}

impl AuthMode {
    pub fn is_enabled(&self) -> bool {
        matches!(self, AuthMode::Enabled(_))
    }
}

fn extract_bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

/// An axum extractor that yields the calling principal per §4.H: the
/// literal `"admin"` when auth is disabled, otherwise the `sub` claim of a
/// validated bearer token.
pub struct Principal(pub String);

impl<S> FromRequestParts<S> for Principal
where
    S: Send + Sync,
    crate::api::AppState: axum::extract::FromRef<S>,
{
    type Rejection = crate::api::error::ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = crate::api::AppState::from_ref(state);
        match &app_state.auth {
            AuthMode::Disabled => Ok(Principal(ADMIN_PRINCIPAL.to_string())),
            AuthMode::Enabled(jwt) => {
                let token = extract_bearer_token(parts)
                    .ok_or_else(|| Error::unauthorized("missing bearer token"))?;
                let claims = jwt.validate_token(token)?;
                if claims.sub.is_empty() {
                    return Err(Error::unauthorized("token has no subject").into());
                }
                Ok(Principal(claims.sub))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_token() {
        let svc = JwtService::new("test-secret");
        let token = svc.generate_token("alice", std::time::Duration::from_secs(3600)).unwrap();
        let claims = svc.validate_token(&token).unwrap();
        assert_eq!(claims.sub, "alice");
    }

    #[test]
    fn rejects_a_tampered_token() {
        let svc = JwtService::new("test-secret");
        let mut token = svc.generate_token("alice", std::time::Duration::from_secs(3600)).unwrap();
        token.push('x');
        assert!(svc.validate_token(&token).is_err());
    }

    #[test]
    fn rejects_an_expired_token() {
        let svc = JwtService::new("test-secret");
        let token = svc.generate_token("alice", std::time::Duration::from_secs(0)).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(1100));
        assert!(svc.validate_token(&token).is_err());
    }
}
