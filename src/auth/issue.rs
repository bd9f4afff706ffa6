//! Access token minting for local testing and tooling.

use std::collections::HashMap;

use chrono::Utc;
use jsonwebtoken::{EncodingKey, Header, encode};

use super::{AccessClaims, AuthError, SecretDeriver, jwt::Audience};
use crate::config::{AuthConfig, JwtAlgorithm};

/// Signs access tokens with the same per-client secrets the verifier uses.
#[derive(Debug, Clone)]
pub struct TokenIssuer {
    deriver: SecretDeriver,
    algorithm: JwtAlgorithm,
    ttl_secs: u64,
}

impl TokenIssuer {
    pub fn new(deriver: SecretDeriver, config: &AuthConfig) -> Self {
        Self {
            deriver,
            algorithm: config.signing_algorithm(),
            ttl_secs: config.access_token_ttl_secs,
        }
    }

    /// Mint a token for `subject` addressed to `client_id`, valid from now.
    pub fn issue(&self, client_id: &str, subject: &str) -> Result<String, AuthError> {
        self.issue_at(client_id, subject, Utc::now().timestamp())
    }

    pub fn issue_at(&self, client_id: &str, subject: &str, now: i64) -> Result<String, AuthError> {
        let ttl = i64::try_from(self.ttl_secs).unwrap_or(i64::MAX);
        let claims = AccessClaims {
            sub: subject.to_string(),
            aud: Audience::Single(client_id.to_string()),
            exp: now.saturating_add(ttl),
            iat: Some(now),
            extra: HashMap::new(),
        };
        self.sign(client_id, &claims)
    }

    /// Sign arbitrary claims with `derive(client_id)`.
    pub fn sign(&self, client_id: &str, claims: &AccessClaims) -> Result<String, AuthError> {
        let secret = self.deriver.derive(client_id);
        encode(
            &Header::new(self.algorithm.to_jwt_algorithm()),
            claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .map_err(|e| AuthError::Signing(e.to_string()))
    }
}
