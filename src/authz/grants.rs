//! Where a principal's grants come from.
//!
//! The decision path awaits a [`GrantSource`] after the token verifies and
//! before the policy is compiled. Sources that do I/O own their timeouts and
//! retries; the host bounds the whole lookup per request.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{AuthzError, Effect, Grant, HttpVerb};

/// A grant as configured or stored, before path validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GrantRule {
    pub effect: Effect,
    pub verb: HttpVerb,
    pub path: String,
    /// Optional IAM condition block.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditions: Option<serde_json::Value>,
}

impl GrantRule {
    pub fn new(effect: Effect, verb: HttpVerb, path: impl Into<String>) -> Self {
        Self {
            effect,
            verb,
            path: path.into(),
            conditions: None,
        }
    }

    /// Every verb on every path.
    pub fn allow_all() -> Self {
        Self::new(Effect::Allow, HttpVerb::All, "*")
    }

    pub fn to_grant(&self) -> Result<Grant, AuthzError> {
        let grant = Grant::new(self.effect, self.verb, &self.path)?;
        Ok(match &self.conditions {
            Some(conditions) => grant.with_conditions(conditions.clone()),
            None => grant,
        })
    }
}

#[async_trait]
pub trait GrantSource: Send + Sync {
    /// Grant rules for an authenticated principal of `client_id`.
    async fn grants_for(
        &self,
        principal_id: &str,
        client_id: &str,
    ) -> Result<Vec<GrantRule>, AuthzError>;
}

/// Serves the same configured rules to every principal.
#[derive(Debug, Clone)]
pub struct StaticGrantSource {
    rules: Vec<GrantRule>,
}

impl StaticGrantSource {
    pub fn new(rules: Vec<GrantRule>) -> Self {
        Self { rules }
    }

    pub fn allow_all() -> Self {
        Self::new(vec![GrantRule::allow_all()])
    }
}

#[async_trait]
impl GrantSource for StaticGrantSource {
    async fn grants_for(
        &self,
        _principal_id: &str,
        _client_id: &str,
    ) -> Result<Vec<GrantRule>, AuthzError> {
        Ok(self.rules.clone())
    }
}
