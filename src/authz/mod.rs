//! Authorization: turning an authenticated principal into a scoped
//! `execute-api:Invoke` policy.
//!
//! The decision flow:
//! 1. Check the client id header and extract the bearer token
//! 2. Verify the token against the client's derived secret
//! 3. Resolve the resource context from the method ARN
//! 4. Fetch the principal's grant rules and compile them into a policy
//! 5. Return the decision, or a two-tier `Fail`/`Unauthorized` error

mod context;
mod decision;
mod error;
mod grants;
mod policy;

pub use context::ResourceContext;
pub use decision::{Authorizer, AuthorizerRequest, Decision, DecisionError};
pub use error::AuthzError;
pub use grants::{GrantRule, GrantSource, StaticGrantSource};
pub use policy::{
    AuthPolicy, CompiledStatement, Effect, Grant, HttpVerb, INVOKE_ACTION, POLICY_VERSION,
    PolicyBuilder, PolicyDocument, PolicyState, normalize_path,
};

/// Match a resource pattern against a concrete value.
///
/// Supports the wildcard forms the gateway understands:
/// - `*` matches any run of characters, including `/` and the empty run
/// - `{name}` matches exactly one non-empty path segment
/// - `{name+}` matches one or more characters across segments
/// - anything else matches literally (case sensitive)
///
/// # Examples
///
/// ```ignore
/// assert!(pattern_matches("*", "anything"));
/// assert!(pattern_matches("pets/*", "pets/1/toys"));
/// assert!(pattern_matches("pets/{id}", "pets/1"));
/// assert!(!pattern_matches("pets/{id}", "pets/1/toys"));
/// assert!(pattern_matches("team", "team"));
/// ```
pub(crate) fn pattern_matches(pattern: &str, value: &str) -> bool {
    if pattern == "*" {
        return true;
    }
    if !pattern.contains(['*', '{']) {
        return pattern == value;
    }

    let mut expr = String::from("^");
    let mut rest = pattern;
    while let Some(pos) = rest.find(['*', '{']) {
        expr.push_str(&regex::escape(&rest[..pos]));
        let tail = &rest[pos..];
        if let Some(after) = tail.strip_prefix('*') {
            expr.push_str(".*");
            rest = after;
        } else if let Some(end) = tail.find('}') {
            let greedy = tail[..end].ends_with('+');
            expr.push_str(if greedy { ".+" } else { "[^/]+" });
            rest = &tail[end + 1..];
        } else {
            expr.push_str(&regex::escape(tail));
            rest = "";
        }
    }
    expr.push_str(&regex::escape(rest));
    expr.push('$');

    regex::Regex::new(&expr).is_ok_and(|re| re.is_match(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_matches_full_wildcard() {
        assert!(pattern_matches("*", "anything"));
        assert!(pattern_matches("*", ""));
        assert!(pattern_matches("*", "pets/1/toys"));
    }

    #[test]
    fn test_pattern_matches_prefix_wildcard() {
        assert!(pattern_matches("team*", "team"));
        assert!(pattern_matches("team*", "teams"));
        assert!(pattern_matches("team*", "team/admin"));

        assert!(!pattern_matches("team*", "project"));
        assert!(!pattern_matches("team*", ""));
        assert!(!pattern_matches("team*", "ateam"));
        assert!(!pattern_matches("team*", "Team")); // case sensitive
    }

    #[test]
    fn test_pattern_matches_exact() {
        assert!(pattern_matches("team", "team"));
        assert!(pattern_matches("", ""));

        assert!(!pattern_matches("team", "teams"));
        assert!(!pattern_matches("team", "Team"));
    }

    #[test]
    fn test_pattern_matches_inner_wildcards() {
        let pattern = "arn:aws:execute-api:us-east-1:1:api/prod/*/pets";
        assert!(pattern_matches(pattern, "arn:aws:execute-api:us-east-1:1:api/prod/GET/pets"));
        assert!(!pattern_matches(pattern, "arn:aws:execute-api:us-east-1:1:api/prod/GET/owners"));
        // Literal dots are not regex wildcards
        assert!(!pattern_matches("v1.2/*", "v1x2/a"));
    }

    #[test]
    fn test_pattern_matches_placeholders() {
        assert!(pattern_matches("pets/{id}", "pets/1"));
        assert!(!pattern_matches("pets/{id}", "pets/"));
        assert!(!pattern_matches("pets/{id}", "pets/1/toys"));
        assert!(pattern_matches("files/{proxy+}", "files/a/b/c"));
        assert!(!pattern_matches("files/{proxy+}", "files/"));
    }
}
