use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::authz::GrantRule;

/// Grants compiled into every decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicyConfig {
    /// Grant rules for every authenticated principal.
    ///
    /// Omitted: allow every verb on every path. An explicit empty list
    /// compiles to an empty statement list (implicit deny).
    #[serde(default = "default_grants")]
    pub grants: Vec<GrantRule>,

    /// Forward the client id to the backend in the decision context.
    #[serde(default)]
    pub context: bool,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            grants: default_grants(),
            context: false,
        }
    }
}

impl PolicyConfig {
    /// Reject rules that would fail every decision at compile time.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (i, rule) in self.grants.iter().enumerate() {
            rule.to_grant()
                .map_err(|e| ConfigError::Validation(format!("policy.grants[{i}]: {e}")))?;
        }
        Ok(())
    }
}

fn default_grants() -> Vec<GrantRule> {
    vec![GrantRule::allow_all()]
}
