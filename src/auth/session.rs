//! Session introspection: how long until the presented access token expires.
//!
//! Read-only time arithmetic on the `exp` claim. The signature is not checked;
//! nothing here grants access.

use std::collections::HashSet;

use chrono::Utc;
use jsonwebtoken::{DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};

use super::header::parse_authorization_header;

/// Outcome of introspecting a session token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionStatus {
    /// Token still valid for this many seconds (may be zero).
    Active { expires_in: i64 },
    /// Token `exp` is in the past.
    Expired,
    /// Header or token could not be decoded. Carries the client-facing message:
    /// the header error for a malformed header, a fixed message for a token
    /// that does not decode.
    Undecodable(String),
}

impl SessionStatus {
    /// HTTP-style status code for the outcome.
    pub fn status_code(&self) -> u16 {
        match self {
            SessionStatus::Active { .. } => 200,
            SessionStatus::Expired => 401,
            SessionStatus::Undecodable(_) => 500,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ExpiryClaim {
    exp: i64,
}

/// Response body for an active session.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionExpiry {
    pub access_token_expires_in: i64,
}

/// Inspect the token in an `Authorization` header value.
pub fn introspect_session(header: Option<&str>) -> SessionStatus {
    introspect_session_at(header, Utc::now().timestamp())
}

pub fn introspect_session_at(header: Option<&str>, now: i64) -> SessionStatus {
    let token = match parse_authorization_header(header) {
        Ok(token) => token,
        Err(e) => return SessionStatus::Undecodable(e.to_string()),
    };

    let mut validation = Validation::default();
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims = HashSet::from(["exp".to_string()]);

    let exp = match decode::<ExpiryClaim>(token, &DecodingKey::from_secret(&[]), &validation) {
        Ok(data) => data.claims.exp,
        Err(e) => {
            tracing::error!(error = %e, "Error in getting access token expiry date");
            return SessionStatus::Undecodable("Error in getting accessToken Expiry date".into());
        }
    };

    let expires_in = exp.saturating_sub(now);
    if expires_in < 0 {
        tracing::info!("Received expired token");
        SessionStatus::Expired
    } else {
        SessionStatus::Active { expires_in }
    }
}
