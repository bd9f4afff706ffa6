//! Resource context resolution from the gateway's method ARN.
//!
//! The gateway identifies the invoked method as
//! `arn:{partition}:execute-api:{region}:{account}:{apiId}/{stage}/{verb}/{path...}`.
//! Only the parts needed to address other methods of the same API and stage
//! are kept.

use serde::{Deserialize, Serialize};

use super::AuthzError;

/// Everything needed to build fully-qualified resource ARNs for one decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceContext {
    pub partition: String,
    pub region: String,
    pub account_id: String,
    pub rest_api_id: String,
    pub stage: String,
}

impl ResourceContext {
    /// Decompose a method ARN.
    ///
    /// Requires six colon-separated fields, the `execute-api` service, and an
    /// `{apiId}/{stage}` prefix in the last one. Any empty component is a contract violation by the host.
    pub fn from_method_arn(method_arn: &str) -> Result<Self, AuthzError> {
        let fields: Vec<&str> = method_arn.splitn(6, ':').collect();
        let [arn, partition, service, region, account_id, api_part] = fields[..] else {
            return Err(AuthzError::MalformedInvocationDescriptor(format!(
                "expected 6 ':'-separated fields in '{method_arn}'"
            )));
        };
        if arn != "arn" {
            return Err(AuthzError::MalformedInvocationDescriptor(format!(
                "'{method_arn}' is not an ARN"
            )));
        }
        if service != "execute-api" {
            return Err(AuthzError::MalformedInvocationDescriptor(format!(
                "'{method_arn}' names service '{service}', expected 'execute-api'"
            )));
        }

        let mut api_segments = api_part.split('/');
        let rest_api_id = api_segments.next().unwrap_or_default();
        let stage = api_segments.next().unwrap_or_default();

        let context = Self {
            partition: partition.to_string(),
            region: region.to_string(),
            account_id: account_id.to_string(),
            rest_api_id: rest_api_id.to_string(),
            stage: stage.to_string(),
        };

        if [
            &context.partition,
            &context.region,
            &context.account_id,
            &context.rest_api_id,
            &context.stage,
        ]
        .iter()
        .any(|s| s.is_empty())
        {
            return Err(AuthzError::MalformedInvocationDescriptor(format!(
                "missing partition, region, account, API id or stage in '{method_arn}'"
            )));
        }

        Ok(context)
    }

    /// `arn:{partition}:execute-api:{region}:{account}:{apiId}/{stage}/{verb}/{path}`
    pub fn resource_arn(&self, verb: &str, path: &str) -> String {
        format!(
            "arn:{}:execute-api:{}:{}:{}/{}/{}/{}",
            self.partition, self.region, self.account_id, self.rest_api_id, self.stage, verb, path
        )
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn test_parses_method_arn() {
        let ctx = ResourceContext::from_method_arn(
            "arn:aws:execute-api:us-east-1:123456789012:abcdef1234/prod/GET/pets/42",
        )
        .unwrap();

        assert_eq!(ctx.partition, "aws");
        assert_eq!(ctx.region, "us-east-1");
        assert_eq!(ctx.account_id, "123456789012");
        assert_eq!(ctx.rest_api_id, "abcdef1234");
        assert_eq!(ctx.stage, "prod");
    }

    #[test]
    fn test_parses_without_method_suffix() {
        let ctx = ResourceContext::from_method_arn(
            "arn:aws-cn:execute-api:cn-north-1:123456789012:api/dev",
        )
        .unwrap();
        assert_eq!(ctx.partition, "aws-cn");
        assert_eq!(ctx.stage, "dev");
    }

    #[test]
    fn test_resource_arn() {
        let ctx = ResourceContext::from_method_arn(
            "arn:aws:execute-api:eu-west-1:111122223333:api1/v1/POST/orders",
        )
        .unwrap();
        assert_eq!(
            ctx.resource_arn("GET", "pets/*"),
            "arn:aws:execute-api:eu-west-1:111122223333:api1/v1/GET/pets/*"
        );
    }

    #[rstest]
    #[case::empty("")]
    #[case::too_few_fields("arn:aws:execute-api:us-east-1:123456789012")]
    #[case::not_an_arn("urn:aws:execute-api:us-east-1:123456789012:api/prod/GET/")]
    #[case::other_service("arn:aws:s3:us-east-1:123456789012:api/prod/GET/")]
    #[case::empty_service("arn:aws::us-east-1:123456789012:api/prod/GET/")]
    #[case::missing_stage("arn:aws:execute-api:us-east-1:123456789012:api")]
    #[case::empty_stage("arn:aws:execute-api:us-east-1:123456789012:api//GET/")]
    #[case::empty_region("arn:aws:execute-api::123456789012:api/prod/GET/")]
    #[case::empty_account("arn:aws:execute-api:us-east-1::api/prod/GET/")]
    fn test_rejects_malformed(#[case] arn: &str) {
        assert!(matches!(
            ResourceContext::from_method_arn(arn),
            Err(AuthzError::MalformedInvocationDescriptor(_))
        ));
    }
}
