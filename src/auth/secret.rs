//! Per-client verification secret derivation.
//!
//! Each client's token-signing secret is `HMAC-SHA256(salt, client_id)`. The
//! client id arrives in a request header and is attacker-controlled, so the
//! construction has to be one-way under a key the attacker does not know:
//! knowing the secret for one client says nothing about any other client's.
//!
//! The salt is process-wide configuration. In real deployments it must come
//! from a secret manager (e.g. injected into the environment and referenced
//! as `${AUTHORIZER_SALT}` in the config file), never from a committed file.

use std::fmt;

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// A derived per-client secret. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct DerivedSecret([u8; 32]);

impl DerivedSecret {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for DerivedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DerivedSecret(<redacted>)")
    }
}

/// Derives verification secrets from client ids.
///
/// Constructed once at startup with the configured salt; immutable afterwards
/// and safe to share across concurrent requests.
#[derive(Clone)]
pub struct SecretDeriver {
    salt: Vec<u8>,
}

impl SecretDeriver {
    pub fn new(salt: impl AsRef<[u8]>) -> Self {
        Self {
            salt: salt.as_ref().to_vec(),
        }
    }

    /// Derive the secret for `client_id`. Deterministic and pure.
    pub fn derive(&self, client_id: &str) -> DerivedSecret {
        let mut mac =
            HmacSha256::new_from_slice(&self.salt).expect("HMAC accepts keys of any length");
        mac.update(client_id.as_bytes());
        let mut out = [0u8; 32];
        out.copy_from_slice(&mac.finalize().into_bytes());
        DerivedSecret(out)
    }
}

impl fmt::Debug for SecretDeriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretDeriver")
            .field("salt", &"<redacted>")
            .finish()
    }
}
