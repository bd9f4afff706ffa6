//! Per-request decision entry point.

use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{AuthzError, GrantSource, PolicyBuilder, PolicyDocument, ResourceContext, StaticGrantSource};
use crate::{
    auth::{AuthError, CLIENT_ID_HEADER, SecretDeriver, TokenVerifier, parse_authorization_header},
    config::AuthorizerConfig,
};

/// What the host hands over for one request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizerRequest {
    /// Request headers. Names are matched case-insensitively; an exact-case
    /// match wins over other spellings of the same name.
    #[serde(default)]
    pub headers: HashMap<String, String>,

    /// Invocation descriptor (method ARN) of the called method.
    #[serde(alias = "invocationDescriptor")]
    pub method_arn: String,

    /// Authorization header value supplied directly by token-type hosts.
    /// Takes precedence over the `Authorization` header when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorization_token: Option<String>,
}

impl AuthorizerRequest {
    /// Look up a header. Among keys differing only in case, the exact spelling
    /// is preferred, then the lexicographically smallest key.
    pub fn header(&self, name: &str) -> Option<&str> {
        if let Some(value) = self.headers.get(name) {
            return Some(value.as_str());
        }
        self.headers
            .iter()
            .filter(|(k, _)| k.eq_ignore_ascii_case(name))
            .min_by(|(a, _), (b, _)| a.cmp(b))
            .map(|(_, v)| v.as_str())
    }

    fn authorization(&self) -> Option<&str> {
        self.authorization_token
            .as_deref()
            .or_else(|| self.header(http::header::AUTHORIZATION.as_str()))
    }
}

/// The authorization verdict returned to the gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    #[serde(rename = "principalId")]
    pub principal_id: String,

    #[serde(rename = "policyDocument")]
    pub policy_document: PolicyDocument,

    /// Key/value pairs the gateway forwards to the backend.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub context: BTreeMap<String, String>,
}

/// Two-tier failure signal.
///
/// `Fail` covers malformed requests and host contract violations; its detail
/// is safe to expose. `Unauthorized` covers every token verification failure
/// and deliberately carries no detail.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecisionError {
    #[error("Fail: {message}")]
    Fail { code: &'static str, message: String },

    #[error("Unauthorized")]
    Unauthorized,
}

impl From<AuthError> for DecisionError {
    fn from(e: AuthError) -> Self {
        if e.is_verification_failure() {
            DecisionError::Unauthorized
        } else {
            DecisionError::Fail {
                code: e.code(),
                message: e.to_string(),
            }
        }
    }
}

impl From<AuthzError> for DecisionError {
    fn from(e: AuthzError) -> Self {
        DecisionError::Fail {
            code: e.code(),
            message: e.to_string(),
        }
    }
}

/// Wires header parsing, token verification, context resolution and policy
/// compilation together. Shareable across concurrent requests; each call gets
/// its own [`PolicyBuilder`].
#[derive(Clone)]
pub struct Authorizer {
    verifier: TokenVerifier,
    grants: Arc<dyn GrantSource>,
    attach_context: bool,
}

impl Authorizer {
    pub fn new(verifier: TokenVerifier, grants: Arc<dyn GrantSource>) -> Self {
        Self {
            verifier,
            grants,
            attach_context: false,
        }
    }

    /// Build from configuration, serving the configured grant rules.
    pub fn from_config(config: &AuthorizerConfig) -> Self {
        let verifier = TokenVerifier::new(SecretDeriver::new(&config.auth.salt), &config.auth);
        let grants = Arc::new(StaticGrantSource::new(config.policy.grants.clone()));
        Self::new(verifier, grants).with_context(config.policy.context)
    }

    /// Attach `clientId` to the decision context.
    pub fn with_context(mut self, attach: bool) -> Self {
        self.attach_context = attach;
        self
    }

    pub async fn decide(&self, request: &AuthorizerRequest) -> Result<Decision, DecisionError> {
        self.decide_at(request, Utc::now().timestamp()).await
    }

    #[tracing::instrument(
        name = "authorizer.decide",
        skip_all,
        fields(method_arn = %request.method_arn, principal_id = tracing::field::Empty)
    )]
    pub async fn decide_at(
        &self,
        request: &AuthorizerRequest,
        now: i64,
    ) -> Result<Decision, DecisionError> {
        let client_id = request
            .header(CLIENT_ID_HEADER)
            .filter(|id| !id.is_empty())
            .ok_or(AuthError::MissingClientId(CLIENT_ID_HEADER))?;

        let token = parse_authorization_header(request.authorization())?;

        let claims = self
            .verifier
            .verify_at(token, client_id, now)
            .map_err(|e| {
                tracing::warn!(client_id, code = e.code(), error = %e, "Token verification failed");
                DecisionError::from(e)
            })?;
        let principal_id = claims.principal_id();
        tracing::Span::current().record("principal_id", principal_id);

        let context = ResourceContext::from_method_arn(&request.method_arn).map_err(|e| {
            tracing::error!(error = %e, "Host supplied a malformed method ARN");
            e
        })?;

        let rules = self.grants.grants_for(principal_id, client_id).await?;

        let mut builder = PolicyBuilder::new(principal_id, context);
        for rule in &rules {
            builder.add_grant(rule.to_grant()?)?;
        }
        let policy = builder.build()?;

        let mut decision_context = BTreeMap::new();
        if self.attach_context {
            decision_context.insert("clientId".to_string(), client_id.to_string());
        }

        tracing::debug!(
            statements = policy.policy_document.statement.len(),
            "Authorization decision compiled"
        );

        Ok(Decision {
            principal_id: policy.principal_id,
            policy_document: policy.policy_document,
            context: decision_context,
        })
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use serde_json::json;

    use super::*;
    use crate::{
        auth::TokenIssuer,
        authz::{Effect, GrantRule, HttpVerb},
        config::AuthConfig,
    };

    const NOW: i64 = 1_700_000_000;
    const SALT: &str = "decision-test-salt";
    const METHOD_ARN: &str = "arn:aws:execute-api:us-east-1:123456789012:api1/prod/GET/pets";

    fn authorizer_with(rules: Vec<GrantRule>) -> Authorizer {
        let config = AuthConfig::for_tests(SALT);
        let verifier = TokenVerifier::new(SecretDeriver::new(SALT), &config);
        Authorizer::new(verifier, Arc::new(StaticGrantSource::new(rules)))
    }

    fn authorizer() -> Authorizer {
        authorizer_with(vec![GrantRule::allow_all()])
    }

    fn sign(client_id: &str, subject: &str) -> String {
        let config = AuthConfig::for_tests(SALT);
        TokenIssuer::new(SecretDeriver::new(SALT), &config)
            .issue_at(client_id, subject, NOW)
            .unwrap()
    }

    fn request(client_id: Option<&str>, authorization: Option<&str>) -> AuthorizerRequest {
        let mut headers = HashMap::new();
        if let Some(id) = client_id {
            headers.insert(CLIENT_ID_HEADER.to_string(), id.to_string());
        }
        if let Some(auth) = authorization {
            headers.insert("Authorization".to_string(), auth.to_string());
        }
        AuthorizerRequest {
            headers,
            method_arn: METHOD_ARN.to_string(),
            authorization_token: None,
        }
    }

    #[tokio::test]
    async fn test_valid_request_allows_everything() {
        let header = format!("Bearer {}", sign("app1", "u1"));
        let decision = authorizer()
            .decide_at(&request(Some("app1"), Some(&header)), NOW + 1)
            .await
            .unwrap();

        assert_eq!(decision.principal_id, "u1");
        let statements = &decision.policy_document.statement;
        assert_eq!(statements.len(), 1);
        assert_eq!(statements[0].effect, Effect::Allow);
        assert_eq!(
            statements[0].resource,
            vec!["arn:aws:execute-api:us-east-1:123456789012:api1/prod/*/*"]
        );
        assert!(decision.context.is_empty());
    }

    #[tokio::test]
    async fn test_missing_client_id_fails() {
        let header = format!("Bearer {}", sign("app1", "u1"));
        let err = authorizer()
            .decide_at(&request(None, Some(&header)), NOW)
            .await
            .unwrap_err();

        assert!(matches!(err, DecisionError::Fail { code: "missing_client_id", .. }));
    }

    #[tokio::test]
    async fn test_client_id_checked_before_header() {
        let err = authorizer()
            .decide_at(&request(Some(""), Some("Token abc")), NOW)
            .await
            .unwrap_err();
        assert!(matches!(err, DecisionError::Fail { code: "missing_client_id", .. }));
    }

    #[tokio::test]
    async fn test_malformed_header_fails() {
        let err = authorizer()
            .decide_at(&request(Some("app1"), Some("Token abc")), NOW)
            .await
            .unwrap_err();
        assert!(matches!(err, DecisionError::Fail { code: "malformed_header", .. }));
    }

    #[tokio::test]
    async fn test_verification_failures_are_opaque() {
        let other_client = format!("Bearer {}", sign("app2", "u1"));
        let own = format!("Bearer {}", sign("app1", "u1"));

        let wrong_secret = authorizer()
            .decide_at(&request(Some("app1"), Some(&other_client)), NOW)
            .await
            .unwrap_err();
        let expired = authorizer()
            .decide_at(&request(Some("app1"), Some(&own)), NOW + 7200)
            .await
            .unwrap_err();

        assert_eq!(wrong_secret, DecisionError::Unauthorized);
        assert_eq!(expired, DecisionError::Unauthorized);
        assert_eq!(expired.to_string(), "Unauthorized");
    }

    #[tokio::test]
    async fn test_malformed_method_arn_fails() {
        let header = format!("Bearer {}", sign("app1", "u1"));
        let mut req = request(Some("app1"), Some(&header));
        req.method_arn = "not-an-arn".to_string();

        let err = authorizer().decide_at(&req, NOW).await.unwrap_err();
        assert!(matches!(
            err,
            DecisionError::Fail { code: "malformed_invocation_descriptor", .. }
        ));
    }

    #[tokio::test]
    async fn test_invalid_grant_path_fails_without_partial_policy() {
        let header = format!("Bearer {}", sign("app1", "u1"));
        let authorizer = authorizer_with(vec![
            GrantRule::new(Effect::Allow, HttpVerb::Get, "/pets"),
            GrantRule::new(Effect::Allow, HttpVerb::Get, "a//b"),
        ]);

        let err = authorizer
            .decide_at(&request(Some("app1"), Some(&header)), NOW)
            .await
            .unwrap_err();
        assert!(matches!(err, DecisionError::Fail { code: "invalid_resource_path", .. }));
    }

    #[tokio::test]
    async fn test_no_grants_is_implicit_deny() {
        let header = format!("Bearer {}", sign("app1", "u1"));
        let decision = authorizer_with(vec![])
            .decide_at(&request(Some("app1"), Some(&header)), NOW)
            .await
            .unwrap();
        assert!(decision.policy_document.statement.is_empty());
    }

    #[tokio::test]
    async fn test_authorization_token_field_takes_precedence() {
        let mut req = request(Some("app1"), Some("Token ignored"));
        req.authorization_token = Some(format!("Bearer {}", sign("app1", "u9")));

        let decision = authorizer().decide_at(&req, NOW).await.unwrap();
        assert_eq!(decision.principal_id, "u9");
    }

    #[tokio::test]
    async fn test_headers_match_case_insensitively() {
        let mut req = AuthorizerRequest {
            method_arn: METHOD_ARN.to_string(),
            ..Default::default()
        };
        req.headers.insert("x-client-id".into(), "app1".into());
        req.headers
            .insert("authorization".into(), format!("Bearer {}", sign("app1", "u1")));

        assert!(authorizer().decide_at(&req, NOW).await.is_ok());
    }

    #[test]
    fn test_header_lookup_prefers_exact_case() {
        let mut req = AuthorizerRequest::default();
        req.headers.insert("x-client-id".into(), "lower".into());
        req.headers.insert("X-CLIENT-ID".into(), "upper".into());

        assert_eq!(req.header("x-client-id"), Some("lower"));
        assert_eq!(req.header("X-CLIENT-ID"), Some("upper"));
        // No exact match: the smallest key wins on every lookup
        for _ in 0..16 {
            assert_eq!(req.header("X-Client-Id"), Some("upper"));
        }
        assert_eq!(req.header("x-other"), None);
    }

    #[tokio::test]
    async fn test_context_attached_when_enabled() {
        let header = format!("Bearer {}", sign("app1", "u1"));
        let decision = authorizer()
            .with_context(true)
            .decide_at(&request(Some("app1"), Some(&header)), NOW)
            .await
            .unwrap();
        assert_eq!(decision.context.get("clientId").map(String::as_str), Some("app1"));
    }

    struct FailingSource;

    #[async_trait]
    impl GrantSource for FailingSource {
        async fn grants_for(&self, _: &str, _: &str) -> Result<Vec<GrantRule>, AuthzError> {
            Err(AuthzError::GrantLookup("store unavailable".into()))
        }
    }

    #[tokio::test]
    async fn test_grant_lookup_failure_fails() {
        let config = AuthConfig::for_tests(SALT);
        let authorizer = Authorizer::new(
            TokenVerifier::new(SecretDeriver::new(SALT), &config),
            Arc::new(FailingSource),
        );
        let header = format!("Bearer {}", sign("app1", "u1"));

        let err = authorizer
            .decide_at(&request(Some("app1"), Some(&header)), NOW)
            .await
            .unwrap_err();
        assert!(matches!(err, DecisionError::Fail { code: "grant_lookup_failed", .. }));
    }

    #[test]
    fn test_request_deserializes_gateway_event() {
        let req: AuthorizerRequest = serde_json::from_value(json!({
            "type": "REQUEST",
            "methodArn": METHOD_ARN,
            "headers": {"X-Client-Id": "app1", "Authorization": "Bearer t"},
        }))
        .unwrap();
        assert_eq!(req.header("x-client-id"), Some("app1"));
        assert_eq!(req.method_arn, METHOD_ARN);

        let req: AuthorizerRequest = serde_json::from_value(json!({
            "invocationDescriptor": METHOD_ARN,
        }))
        .unwrap();
        assert_eq!(req.method_arn, METHOD_ARN);
    }
}
