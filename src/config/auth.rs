use std::fmt;

use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Token verification configuration.
#[derive(Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthConfig {
    /// Process-wide salt mixed into every per-client secret.
    ///
    /// Source this from a secret manager through environment interpolation
    /// (`salt = "${AUTHORIZER_SALT}"`). Never commit a literal value.
    pub salt: String,

    /// Accepted signing algorithms. Secrets are derived symmetric keys, so only
    /// the HMAC family is available.
    #[serde(default = "default_algorithms")]
    pub algorithms: Vec<JwtAlgorithm>,

    /// Clock skew tolerance applied to `exp`, in seconds.
    #[serde(default)]
    pub leeway_secs: u64,

    /// Lifetime of access tokens minted by `portcullis issue`, in seconds.
    #[serde(default = "default_access_token_ttl")]
    pub access_token_ttl_secs: u64,
}

impl AuthConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.salt.is_empty() {
            return Err(ConfigError::Validation("auth.salt must not be empty".into()));
        }
        if self.algorithms.is_empty() {
            return Err(ConfigError::Validation(
                "auth.algorithms must list at least one algorithm".into(),
            ));
        }
        if self.access_token_ttl_secs == 0 {
            return Err(ConfigError::Validation(
                "auth.access_token_ttl_secs must be greater than zero".into(),
            ));
        }
        if self.salt.len() < 16 {
            tracing::warn!(
                length = self.salt.len(),
                "auth.salt is shorter than 16 bytes; use a high-entropy value from a secret manager"
            );
        }
        Ok(())
    }

    /// Algorithm used to sign minted tokens (the first accepted one).
    pub fn signing_algorithm(&self) -> JwtAlgorithm {
        self.algorithms
            .first()
            .copied()
            .unwrap_or(JwtAlgorithm::HS256)
    }
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("salt", &"****")
            .field("algorithms", &self.algorithms)
            .field("leeway_secs", &self.leeway_secs)
            .field("access_token_ttl_secs", &self.access_token_ttl_secs)
            .finish()
    }
}

/// JWT signing algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JwtAlgorithm {
    /// HMAC with SHA-256
    HS256,
    /// HMAC with SHA-384
    HS384,
    /// HMAC with SHA-512
    HS512,
}

impl JwtAlgorithm {
    /// Convert to jsonwebtoken Algorithm.
    pub fn to_jwt_algorithm(self) -> jsonwebtoken::Algorithm {
        match self {
            JwtAlgorithm::HS256 => jsonwebtoken::Algorithm::HS256,
            JwtAlgorithm::HS384 => jsonwebtoken::Algorithm::HS384,
            JwtAlgorithm::HS512 => jsonwebtoken::Algorithm::HS512,
        }
    }

    /// Check if this algorithm matches a jsonwebtoken Algorithm.
    pub fn matches(self, alg: jsonwebtoken::Algorithm) -> bool {
        self.to_jwt_algorithm() == alg
    }
}

#[cfg(test)]
impl AuthConfig {
    /// HS256-only config with the given salt.
    pub(crate) fn for_tests(salt: &str) -> Self {
        Self {
            salt: salt.to_string(),
            algorithms: default_algorithms(),
            leeway_secs: 0,
            access_token_ttl_secs: default_access_token_ttl(),
        }
    }
}

fn default_algorithms() -> Vec<JwtAlgorithm> {
    vec![JwtAlgorithm::HS256]
}

fn default_access_token_ttl() -> u64 {
    3600 // 1 hour
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(salt: &str) -> AuthConfig {
        AuthConfig::for_tests(salt)
    }

    #[test]
    fn test_debug_redacts_salt() {
        let debug = format!("{:?}", config("do-not-print-this-salt"));
        assert!(!debug.contains("do-not-print-this-salt"));
        assert!(debug.contains("****"));
    }

    #[test]
    fn test_empty_salt_rejected() {
        assert!(config("").validate().is_err());
        assert!(config("0123456789abcdef0123").validate().is_ok());
    }

    #[test]
    fn test_empty_algorithms_rejected() {
        let cfg = AuthConfig {
            algorithms: vec![],
            ..config("0123456789abcdef")
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_signing_algorithm_is_first_allowed() {
        let cfg = AuthConfig {
            algorithms: vec![JwtAlgorithm::HS512, JwtAlgorithm::HS256],
            ..config("0123456789abcdef")
        };
        assert_eq!(cfg.signing_algorithm(), JwtAlgorithm::HS512);
    }

    #[test]
    fn test_jwt_algorithm_matches() {
        assert!(JwtAlgorithm::HS256.matches(jsonwebtoken::Algorithm::HS256));
        assert!(!JwtAlgorithm::HS256.matches(jsonwebtoken::Algorithm::HS512));
        assert!(!JwtAlgorithm::HS384.matches(jsonwebtoken::Algorithm::RS384));
    }
}
