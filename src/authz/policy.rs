//! Policy builder: accumulates allow/deny grants for one principal and
//! compiles them into the smallest equivalent set of `execute-api:Invoke`
//! statements.
//!
//! Compilation rules:
//! - grants are partitioned by effect; Deny statements are emitted before Allow
//! - within an effect, grants are grouped by resource path; a path granted for
//!   every defined verb (or for `*` explicitly) becomes a single `*`-verb
//!   resource, otherwise each verb keeps its own resource
//! - resources sharing an effect and verb segment share one statement
//! - conditional grants are never merged; each becomes its own statement
//!
//! The result is exactly as permissive as the accumulated grants.

use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
    str::FromStr,
};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::{AuthzError, ResourceContext, pattern_matches};

/// IAM policy language version understood by the gateway.
pub const POLICY_VERSION: &str = "2012-10-17";

/// The only action an authorizer policy grants.
pub const INVOKE_ACTION: &str = "execute-api:Invoke";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Effect {
    #[serde(alias = "allow")]
    Allow,
    #[serde(alias = "deny")]
    Deny,
}

/// HTTP verbs a grant can name. `All` is the `*` wildcard.
///
/// Declaration order is the order verbs appear in compiled output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HttpVerb {
    All,
    Get,
    Post,
    Put,
    Patch,
    Head,
    Delete,
    Options,
}

impl HttpVerb {
    /// Every concrete verb. A path granted for all of these collapses to `*`.
    pub const DEFINED: [HttpVerb; 7] = [
        HttpVerb::Get,
        HttpVerb::Post,
        HttpVerb::Put,
        HttpVerb::Patch,
        HttpVerb::Head,
        HttpVerb::Delete,
        HttpVerb::Options,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            HttpVerb::All => "*",
            HttpVerb::Get => "GET",
            HttpVerb::Post => "POST",
            HttpVerb::Put => "PUT",
            HttpVerb::Patch => "PATCH",
            HttpVerb::Head => "HEAD",
            HttpVerb::Delete => "DELETE",
            HttpVerb::Options => "OPTIONS",
        }
    }
}

impl fmt::Display for HttpVerb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpVerb {
    type Err = AuthzError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "*" | "ALL" => Ok(HttpVerb::All),
            "GET" => Ok(HttpVerb::Get),
            "POST" => Ok(HttpVerb::Post),
            "PUT" => Ok(HttpVerb::Put),
            "PATCH" => Ok(HttpVerb::Patch),
            "HEAD" => Ok(HttpVerb::Head),
            "DELETE" => Ok(HttpVerb::Delete),
            "OPTIONS" => Ok(HttpVerb::Options),
            _ => Err(AuthzError::UnknownVerb(s.to_string())),
        }
    }
}

impl Serialize for HttpVerb {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for HttpVerb {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// One accumulated permission unit.
#[derive(Debug, Clone, PartialEq)]
pub struct Grant {
    pub effect: Effect,
    pub verb: HttpVerb,
    /// Normalized path: no leading slash, empty for the API root.
    pub resource_path: String,
    /// IAM condition block; conditional grants compile to their own statement.
    pub conditions: Option<serde_json::Value>,
}

impl Grant {
    /// Build a grant, validating and normalizing `path`.
    pub fn new(effect: Effect, verb: HttpVerb, path: &str) -> Result<Self, AuthzError> {
        Ok(Self {
            effect,
            verb,
            resource_path: normalize_path(path)?,
            conditions: None,
        })
    }

    pub fn with_conditions(mut self, conditions: serde_json::Value) -> Self {
        self.conditions = Some(conditions);
        self
    }
}

/// Validate a resource path and strip a single leading slash.
///
/// Allowed: ASCII letters and digits, `-`, `_`, `.`, `*`, `/` as separator,
/// and whole-segment placeholders `{name}` / `{name+}`. Empty segments (`//`)
/// and trailing slashes are rejected. `/` and the empty string both mean the
/// API root.
pub fn normalize_path(path: &str) -> Result<String, AuthzError> {
    if path.contains("//") {
        return Err(AuthzError::invalid_path(path, "empty path segment"));
    }
    let normalized = path.strip_prefix('/').unwrap_or(path);
    if normalized.is_empty() {
        return Ok(String::new());
    }

    for segment in normalized.split('/') {
        if segment.is_empty() {
            return Err(AuthzError::invalid_path(path, "empty path segment"));
        }
        if segment.starts_with('{') || segment.ends_with('}') {
            if !is_placeholder(segment) {
                return Err(AuthzError::invalid_path(
                    path,
                    "placeholders must be a whole segment of the form {name} or {name+}",
                ));
            }
            continue;
        }
        if !segment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '*'))
        {
            return Err(AuthzError::invalid_path(path, "disallowed character"));
        }
    }

    Ok(normalized.to_string())
}

fn is_placeholder(segment: &str) -> bool {
    let Some(inner) = segment
        .strip_prefix('{')
        .and_then(|s| s.strip_suffix('}'))
    else {
        return false;
    };
    let name = inner.strip_suffix('+').unwrap_or(inner);
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// A compiled `execute-api:Invoke` statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledStatement {
    #[serde(rename = "Effect")]
    pub effect: Effect,
    #[serde(rename = "Action")]
    pub action: Vec<String>,
    #[serde(rename = "Resource")]
    pub resource: Vec<String>,
    #[serde(rename = "Condition", default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<serde_json::Value>,
}

impl CompiledStatement {
    fn new(effect: Effect, resource: Vec<String>, condition: Option<serde_json::Value>) -> Self {
        Self {
            effect,
            action: vec![INVOKE_ACTION.to_string()],
            resource,
            condition,
        }
    }
}

/// Wire-compatible policy document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyDocument {
    #[serde(rename = "Version")]
    pub version: String,
    #[serde(rename = "Statement")]
    pub statement: Vec<CompiledStatement>,
}

impl PolicyDocument {
    /// Evaluate the document for a concrete method ARN: an explicit Deny
    /// wins, then any Allow, otherwise implicit deny (`None`). Conditional
    /// statements are skipped since their conditions are only evaluable by
    /// the gateway.
    ///
    /// The verb field of a resource matches exactly one verb (`*` stands for
    /// any verb); the path is matched with the resource glob rules.
    pub fn evaluate(&self, method_arn: &str) -> Option<Effect> {
        let matching = |effect: Effect| {
            self.statement.iter().any(|s| {
                s.effect == effect
                    && s.condition.is_none()
                    && s.resource.iter().any(|r| resource_matches(r, method_arn))
            })
        };
        if matching(Effect::Deny) {
            Some(Effect::Deny)
        } else if matching(Effect::Allow) {
            Some(Effect::Allow)
        } else {
            None
        }
    }
}

/// Match a resource ARN against a method ARN field by field.
///
/// Falls back to a whole-string glob match when either side lacks the
/// `{apiId}/{stage}/{verb}` layout.
pub(crate) fn resource_matches(resource: &str, method_arn: &str) -> bool {
    match (split_method_arn(resource), split_method_arn(method_arn)) {
        (Some((prefix, verb, path)), Some((m_prefix, m_verb, m_path))) => {
            prefix == m_prefix
                && (verb == HttpVerb::All.as_str() || verb == m_verb)
                && pattern_matches(path, m_path)
        }
        _ => pattern_matches(resource, method_arn),
    }
}

/// Split `arn:...:{apiId}/{stage}/{verb}/{path}` into
/// (`arn:...:{apiId}/{stage}`, verb, path).
fn split_method_arn(arn: &str) -> Option<(&str, &str, &str)> {
    let (fields_end, _) = arn.match_indices(':').nth(4)?;
    let api_part = &arn[fields_end + 1..];
    let mut segments = api_part.splitn(4, '/');
    let api_id = segments.next()?;
    let stage = segments.next()?;
    let verb = segments.next()?;
    let path = segments.next().unwrap_or_default();
    let prefix_len = fields_end + 1 + api_id.len() + 1 + stage.len();
    Some((&arn[..prefix_len], verb, path))
}

/// A compiled policy for one principal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthPolicy {
    #[serde(rename = "principalId")]
    pub principal_id: String,
    #[serde(rename = "policyDocument")]
    pub policy_document: PolicyDocument,
}

/// Builder lifecycle: `Empty → Accumulating → Compiled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyState {
    Empty,
    Accumulating,
    Compiled,
}

/// Accumulates grants for one principal within one resource context.
///
/// Owned by a single decision; [`PolicyBuilder::build`] is terminal and any
/// later call fails with [`AuthzError::PolicyAlreadyBuilt`].
#[derive(Debug)]
pub struct PolicyBuilder {
    principal_id: String,
    context: ResourceContext,
    grants: Vec<Grant>,
    state: PolicyState,
}

impl PolicyBuilder {
    pub fn new(principal_id: impl Into<String>, context: ResourceContext) -> Self {
        Self {
            principal_id: principal_id.into(),
            context,
            grants: Vec::new(),
            state: PolicyState::Empty,
        }
    }

    pub fn state(&self) -> PolicyState {
        self.state
    }

    pub fn grants(&self) -> &[Grant] {
        &self.grants
    }

    /// Append a grant. Exact duplicates are ignored.
    pub fn add_grant(&mut self, grant: Grant) -> Result<&mut Self, AuthzError> {
        if self.state == PolicyState::Compiled {
            return Err(AuthzError::PolicyAlreadyBuilt);
        }
        if !self.grants.contains(&grant) {
            self.grants.push(grant);
        }
        self.state = PolicyState::Accumulating;
        Ok(self)
    }

    pub fn allow_method(&mut self, verb: HttpVerb, path: &str) -> Result<&mut Self, AuthzError> {
        self.add_grant(Grant::new(Effect::Allow, verb, path)?)
    }

    pub fn deny_method(&mut self, verb: HttpVerb, path: &str) -> Result<&mut Self, AuthzError> {
        self.add_grant(Grant::new(Effect::Deny, verb, path)?)
    }

    pub fn allow_method_with_conditions(
        &mut self,
        verb: HttpVerb,
        path: &str,
        conditions: serde_json::Value,
    ) -> Result<&mut Self, AuthzError> {
        self.add_grant(Grant::new(Effect::Allow, verb, path)?.with_conditions(conditions))
    }

    pub fn deny_method_with_conditions(
        &mut self,
        verb: HttpVerb,
        path: &str,
        conditions: serde_json::Value,
    ) -> Result<&mut Self, AuthzError> {
        self.add_grant(Grant::new(Effect::Deny, verb, path)?.with_conditions(conditions))
    }

    /// Allow every defined verb on every path.
    pub fn allow_all_methods(&mut self) -> Result<&mut Self, AuthzError> {
        self.all_methods(Effect::Allow)
    }

    /// Deny every defined verb on every path.
    pub fn deny_all_methods(&mut self) -> Result<&mut Self, AuthzError> {
        self.all_methods(Effect::Deny)
    }

    fn all_methods(&mut self, effect: Effect) -> Result<&mut Self, AuthzError> {
        for verb in HttpVerb::DEFINED {
            self.add_grant(Grant::new(effect, verb, "*")?)?;
        }
        Ok(self)
    }

    /// Compile the accumulated grants. Terminal.
    pub fn build(&mut self) -> Result<AuthPolicy, AuthzError> {
        if self.state == PolicyState::Compiled {
            return Err(AuthzError::PolicyAlreadyBuilt);
        }
        self.state = PolicyState::Compiled;

        let mut statement = Vec::new();
        for effect in [Effect::Deny, Effect::Allow] {
            statement.extend(self.compile_effect(effect));
        }

        tracing::debug!(
            principal_id = %self.principal_id,
            grants = self.grants.len(),
            statements = statement.len(),
            "Compiled policy"
        );

        Ok(AuthPolicy {
            principal_id: self.principal_id.clone(),
            policy_document: PolicyDocument {
                version: POLICY_VERSION.to_string(),
                statement,
            },
        })
    }

    fn compile_effect(&self, effect: Effect) -> Vec<CompiledStatement> {
        let mut verbs_by_path: BTreeMap<&str, BTreeSet<HttpVerb>> = BTreeMap::new();
        for grant in self
            .grants
            .iter()
            .filter(|g| g.effect == effect && g.conditions.is_none())
        {
            verbs_by_path
                .entry(grant.resource_path.as_str())
                .or_default()
                .insert(grant.verb);
        }

        let mut resources_by_verb: BTreeMap<HttpVerb, Vec<String>> = BTreeMap::new();
        for (path, verbs) in verbs_by_path {
            let collapsed = verbs.contains(&HttpVerb::All)
                || HttpVerb::DEFINED.iter().all(|v| verbs.contains(v));
            if collapsed {
                resources_by_verb
                    .entry(HttpVerb::All)
                    .or_default()
                    .push(self.context.resource_arn(HttpVerb::All.as_str(), path));
            } else {
                for verb in verbs {
                    resources_by_verb
                        .entry(verb)
                        .or_default()
                        .push(self.context.resource_arn(verb.as_str(), path));
                }
            }
        }

        let mut statements: Vec<CompiledStatement> = resources_by_verb
            .into_values()
            .map(|resources| CompiledStatement::new(effect, resources, None))
            .collect();

        statements.extend(
            self.grants
                .iter()
                .filter(|g| g.effect == effect)
                .filter_map(|g| {
                    let conditions = g.conditions.clone()?;
                    let arn = self.context.resource_arn(g.verb.as_str(), &g.resource_path);
                    Some(CompiledStatement::new(effect, vec![arn], Some(conditions)))
                }),
        );

        statements
    }
}
