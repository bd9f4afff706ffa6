//! `Authorization` header parsing.

use super::AuthError;

/// Scheme keyword expected in the authorization header. Case-sensitive.
pub const BEARER_PREFIX: &str = "Bearer ";

/// Extract the bare token from an `Authorization` header value.
///
/// The value must be exactly `Bearer <token>`: case-sensitive scheme, a single
/// separating space, and a non-empty token with no further whitespace.
pub fn parse_authorization_header(value: Option<&str>) -> Result<&str, AuthError> {
    let value = value.ok_or(AuthError::MalformedHeader("missing authorization header"))?;
    if value.is_empty() {
        return Err(AuthError::MalformedHeader("empty authorization header"));
    }

    let token = value
        .strip_prefix(BEARER_PREFIX)
        .ok_or(AuthError::MalformedHeader("expected 'Bearer <token>'"))?;

    if token.is_empty() {
        return Err(AuthError::MalformedHeader("empty bearer token"));
    }
    if token.chars().any(char::is_whitespace) {
        return Err(AuthError::MalformedHeader("expected 'Bearer <token>'"));
    }

    Ok(token)
}
