//! Authentication errors.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Client identifier header absent or empty
    #[error("{0} key missing in request header")]
    MissingClientId(&'static str),

    /// Authorization header missing or not of the form `Bearer <token>`
    #[error("Malformed authorization header: {0}")]
    MalformedHeader(&'static str),

    /// Signature did not verify under the client's derived secret
    #[error("Invalid token signature")]
    InvalidSignature,

    /// Token `exp` has elapsed
    #[error("Token expired")]
    TokenExpired,

    /// Token `aud` does not name the presenting client
    #[error("Token audience does not match client id")]
    AudienceMismatch,

    /// Token could not be decoded (bad encoding, missing claim, wrong algorithm)
    #[error("Malformed token: {0}")]
    MalformedToken(String),

    /// Token could not be signed
    #[error("Failed to sign token: {0}")]
    Signing(String),
}

impl AuthError {
    /// Whether this error came out of token verification.
    ///
    /// Verification failures are reported to callers as an opaque
    /// `Unauthorized`; everything else is a structural problem with the request.
    pub fn is_verification_failure(&self) -> bool {
        matches!(
            self,
            AuthError::InvalidSignature
                | AuthError::TokenExpired
                | AuthError::AudienceMismatch
                | AuthError::MalformedToken(_)
        )
    }

    /// Stable machine-readable code for logs and `Fail` responses.
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::MissingClientId(_) => "missing_client_id",
            AuthError::MalformedHeader(_) => "malformed_header",
            AuthError::InvalidSignature => "invalid_signature",
            AuthError::TokenExpired => "token_expired",
            AuthError::AudienceMismatch => "audience_mismatch",
            AuthError::MalformedToken(_) => "malformed_token",
            AuthError::Signing(_) => "signing_failed",
        }
    }
}
