//! Authorization errors.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("Malformed invocation descriptor: {0}")]
    MalformedInvocationDescriptor(String),

    #[error("Invalid resource path '{path}': {reason}")]
    InvalidResourcePath { path: String, reason: &'static str },

    #[error("Unknown HTTP verb: {0}")]
    UnknownVerb(String),

    #[error("Policy has already been built")]
    PolicyAlreadyBuilt,

    #[error("Grant lookup failed: {0}")]
    GrantLookup(String),
}

impl AuthzError {
    pub fn invalid_path(path: impl Into<String>, reason: &'static str) -> Self {
        Self::InvalidResourcePath {
            path: path.into(),
            reason,
        }
    }

    /// Stable machine-readable code for logs and `Fail` responses.
    pub fn code(&self) -> &'static str {
        match self {
            AuthzError::MalformedInvocationDescriptor(_) => "malformed_invocation_descriptor",
            AuthzError::InvalidResourcePath { .. } => "invalid_resource_path",
            AuthzError::UnknownVerb(_) => "unknown_verb",
            AuthzError::PolicyAlreadyBuilt => "policy_already_built",
            AuthzError::GrantLookup(_) => "grant_lookup_failed",
        }
    }
}
