//! Access token verification against per-client derived secrets.
//!
//! The secret used to check a token's signature is selected by the client id
//! presented alongside it, so verification always takes both explicitly:
//! [`TokenVerifier::verify`]`(token, client_id)`.

use std::collections::HashMap;

use chrono::Utc;
use jsonwebtoken::{
    Algorithm, DecodingKey, TokenData, Validation, decode, decode_header, errors::ErrorKind,
};
use serde::{Deserialize, Serialize};

use super::{AuthError, SecretDeriver};
use crate::config::{AuthConfig, JwtAlgorithm};

/// Claims carried by an access token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Subject (principal id)
    pub sub: String,

    /// Audience: the client id the token was issued to
    #[serde(default)]
    pub aud: Audience,

    /// Expiration time (Unix timestamp)
    pub exp: i64,

    /// Issued at (Unix timestamp)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,

    /// All other claims
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl AccessClaims {
    /// The authenticated principal.
    pub fn principal_id(&self) -> &str {
        &self.sub
    }
}

/// Audience can be a single string or an array of strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    #[default]
    None,
    Single(String),
    Multiple(Vec<String>),
}

impl Audience {
    pub fn contains(&self, aud: &str) -> bool {
        match self {
            Audience::None => false,
            Audience::Single(s) => s == aud,
            Audience::Multiple(v) => v.iter().any(|s| s == aud),
        }
    }
}

/// Verifies access tokens. Stateless apart from immutable configuration.
#[derive(Debug, Clone)]
pub struct TokenVerifier {
    deriver: SecretDeriver,
    algorithms: Vec<JwtAlgorithm>,
    leeway_secs: u64,
}

impl TokenVerifier {
    pub fn new(deriver: SecretDeriver, config: &AuthConfig) -> Self {
        Self {
            deriver,
            algorithms: config.algorithms.clone(),
            leeway_secs: config.leeway_secs,
        }
    }

    /// Verify `token` as issued to `client_id` and return its claims.
    pub fn verify(&self, token: &str, client_id: &str) -> Result<AccessClaims, AuthError> {
        self.verify_at(token, client_id, Utc::now().timestamp())
    }

    /// Verify against an explicit clock reading (Unix seconds).
    ///
    /// Checks, in order: algorithm allowlist, signature under
    /// `derive(client_id)`, `aud == client_id`, then `now < exp`.
    pub fn verify_at(
        &self,
        token: &str,
        client_id: &str,
        now: i64,
    ) -> Result<AccessClaims, AuthError> {
        let header = decode_header(token).map_err(|e| {
            tracing::debug!(error = %e, "Failed to decode token header");
            AuthError::MalformedToken(e.to_string())
        })?;

        // Only the configured HMAC algorithms; rejects "none" and asymmetric
        // algorithms that would reinterpret the derived secret.
        if !self.is_algorithm_allowed(header.alg) {
            tracing::warn!(
                algorithm = ?header.alg,
                allowed = ?self.algorithms,
                "Token algorithm not in allowlist"
            );
            return Err(AuthError::InvalidSignature);
        }

        let secret = self.deriver.derive(client_id);
        let mut validation = Validation::new(header.alg);
        validation.set_audience(&[client_id]);
        validation.set_required_spec_claims(&["exp", "aud", "sub"]);
        // Expiry is checked below against the injected clock
        validation.validate_exp = false;

        let token_data: TokenData<AccessClaims> =
            decode(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)
                .map_err(map_decode_error)?;
        let claims = token_data.claims;

        let leeway = i64::try_from(self.leeway_secs).unwrap_or(i64::MAX);
        if now >= claims.exp.saturating_add(leeway) {
            return Err(AuthError::TokenExpired);
        }

        Ok(claims)
    }

    fn is_algorithm_allowed(&self, alg: Algorithm) -> bool {
        self.algorithms.iter().any(|allowed| allowed.matches(alg))
    }
}

fn map_decode_error(e: jsonwebtoken::errors::Error) -> AuthError {
    match e.kind() {
        ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => AuthError::InvalidSignature,
        ErrorKind::ExpiredSignature => AuthError::TokenExpired,
        ErrorKind::InvalidAudience => AuthError::AudienceMismatch,
        ErrorKind::MissingRequiredClaim(claim) if claim == "aud" => AuthError::AudienceMismatch,
        _ => AuthError::MalformedToken(e.to_string()),
    }
}
