//! Request authentication: header parsing, per-client secrets, token verification.

mod error;
pub mod header;
pub mod issue;
pub mod jwt;
mod secret;
pub mod session;

pub use error::AuthError;
pub use header::parse_authorization_header;
pub use issue::TokenIssuer;
pub use jwt::{AccessClaims, Audience, TokenVerifier};
pub use secret::{DerivedSecret, SecretDeriver};
pub use session::{SessionExpiry, SessionStatus, introspect_session};

/// Header carrying the client identifier. Selects the verification secret and
/// is the expected token audience.
pub const CLIENT_ID_HEADER: &str = "X-Client-Id";
