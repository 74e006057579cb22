//! Policy evaluation.
//!
//! Policies are OR'd: the subject is authorized as soon as one policy's
//! condition holds. A policy that fails to parse or to initialize its
//! environment counts as not passing; the error is logged and remembered so
//! the caller can tell "denied" apart from "denied because of an error".

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;
use warden_types::AuthPolicy;

use crate::condition::{Condition, PartialOutcome};
use crate::context::EvalContext;
use crate::error::{AbacError, Result};
use crate::expression::ExpressionCache;
use crate::time_env::TimeEnvCache;

// ============================================================================
// Results
// ============================================================================

/// Outcome of [`Evaluator::eval_policies`].
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyMatch {
    pub passed: bool,
    /// The first passing policy, in list order.
    pub policy_id: Option<i64>,
    /// The last per-policy error seen while iterating.
    pub error: Option<AbacError>,
}

/// Outcome of [`Evaluator::filter_policies`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PolicyFilter {
    pub policy_ids: Vec<i64>,
    pub error: Option<AbacError>,
}

/// Outcome of [`Evaluator::partial_eval_policies`].
///
/// Both lists empty and no `error` means no policy can ever pass for this
/// request. Both lists empty with an `error` means the answer is unknown.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartialEvaluation {
    /// Conditions left to check once the missing attributes are known.
    pub residuals: Vec<Condition>,
    /// Policies that hold no matter what the missing attributes are.
    pub passed_policy_ids: Vec<i64>,
    /// The last per-policy error seen while iterating.
    pub error: Option<AbacError>,
}

impl PartialEvaluation {
    /// True when neither a pass nor a residual came out of evaluation.
    pub fn is_empty(&self) -> bool {
        self.residuals.is_empty() && self.passed_policy_ids.is_empty()
    }
}

// ============================================================================
// Evaluator
// ============================================================================

/// Evaluates policies against an [`EvalContext`].
///
/// Owns the parsed-expression cache and the time-environment cache; clones
/// share both.
#[derive(Debug, Clone, Default)]
pub struct Evaluator {
    expressions: ExpressionCache,
    time_envs: TimeEnvCache,
}

impl Evaluator {
    pub fn new(expressions: ExpressionCache, time_envs: TimeEnvCache) -> Self {
        Self {
            expressions,
            time_envs,
        }
    }

    pub fn expressions(&self) -> &ExpressionCache {
        &self.expressions
    }

    pub fn time_envs(&self) -> &TimeEnvCache {
        &self.time_envs
    }

    /// Parses a policy's expression through the cache.
    pub fn parse_policy(&self, policy: &AuthPolicy) -> Result<Arc<Condition>> {
        self.expressions
            .get(&policy.expression, &policy.expression_signature)
    }

    /// Evaluates one policy.
    ///
    /// An action bound to no resource type passes unconditionally. Parse
    /// and environment errors are returned to the caller.
    pub fn eval_policy(
        &self,
        ctx: &mut EvalContext,
        policy: &AuthPolicy,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        if ctx.action().without_resource_type() {
            debug!(
                system = %ctx.system(),
                action = %ctx.action().id,
                "action without resource type passes"
            );
            return Ok(true);
        }

        if !ctx.has_resources() {
            return Err(AbacError::MissingResource {
                action: ctx.action().id.clone(),
            });
        }

        let condition = self.parse_policy(policy)?;
        ctx.init_environments(&condition, now, &self.time_envs)?;
        Ok(condition.eval(ctx))
    }

    /// Returns the first passing policy in list order.
    pub fn eval_policies(
        &self,
        ctx: &mut EvalContext,
        policies: &[AuthPolicy],
        now: DateTime<Utc>,
    ) -> PolicyMatch {
        let mut last_error = None;

        for policy in policies {
            match self.eval_policy(ctx, policy, now) {
                Ok(true) => {
                    debug!(policy_id = policy.id, "policy passed");
                    return PolicyMatch {
                        passed: true,
                        policy_id: Some(policy.id),
                        error: last_error,
                    };
                }
                Ok(false) => {}
                Err(error) => {
                    debug!(policy_id = policy.id, error = %error, "policy evaluation failed");
                    last_error = Some(error);
                }
            }
        }

        PolicyMatch {
            passed: false,
            policy_id: None,
            error: last_error,
        }
    }

    /// Returns every passing policy.
    pub fn filter_policies(
        &self,
        ctx: &mut EvalContext,
        policies: &[AuthPolicy],
        now: DateTime<Utc>,
    ) -> PolicyFilter {
        let mut filter = PolicyFilter::default();

        for policy in policies {
            match self.eval_policy(ctx, policy, now) {
                Ok(true) => filter.policy_ids.push(policy.id),
                Ok(false) => {}
                Err(error) => {
                    debug!(policy_id = policy.id, error = %error, "policy evaluation failed");
                    filter.error = Some(error);
                }
            }
        }
        filter
    }

    /// Evaluates policies with only the attributes already in `ctx`.
    ///
    /// A policy lands in `passed_policy_ids` only when it is fully decided
    /// as passing; one whose outcome depends on missing attributes always
    /// contributes its residual instead, even if the known part holds.
    pub fn partial_eval_policies(
        &self,
        ctx: &mut EvalContext,
        policies: &[AuthPolicy],
        now: DateTime<Utc>,
    ) -> PartialEvaluation {
        let mut result = PartialEvaluation::default();

        for policy in policies {
            if ctx.action().without_resource_type() {
                result.passed_policy_ids.push(policy.id);
                continue;
            }

            let condition = match self.parse_policy(policy) {
                Ok(condition) => condition,
                Err(error) => {
                    debug!(policy_id = policy.id, error = %error, "policy parse failed");
                    result.error = Some(error);
                    continue;
                }
            };

            if let Err(error) = ctx.init_environments(&condition, now, &self.time_envs) {
                debug!(policy_id = policy.id, error = %error, "policy environment failed");
                result.error = Some(error);
                continue;
            }

            if !(ctx.has_resources() || ctx.has_env()) {
                result.residuals.push(condition.as_ref().clone());
                continue;
            }

            match condition.partial_eval(ctx) {
                PartialOutcome::Passed => result.passed_policy_ids.push(policy.id),
                PartialOutcome::Residual(residual) => result.residuals.push(residual),
                PartialOutcome::Denied => {}
            }
        }

        debug!(
            passed = result.passed_policy_ids.len(),
            residuals = result.residuals.len(),
            "partial evaluation done"
        );
        result
    }
}

/// Field names under `{namespace}.` referenced by the conditions.
///
/// Deduplicated, in first-seen order, with the namespace prefix stripped.
/// Used to fetch only the attributes the policies can look at.
pub fn policy_attr_keys<'a>(
    namespace: &str,
    conditions: impl IntoIterator<Item = &'a Condition>,
) -> Vec<String> {
    let prefix = format!("{namespace}.");
    let mut seen = HashSet::new();
    let mut keys = Vec::new();

    for condition in conditions {
        for key in condition.keys() {
            if let Some(field) = key.strip_prefix(&prefix) {
                if seen.insert(field.to_string()) {
                    keys.push(field.to_string());
                }
            }
        }
    }
    keys
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::Leaf;
    use warden_types::{
        Action, ActionAttribute, ActionResourceType, AttrValue, Attribute, AuthType, Request,
        Resource, Subject,
    };

    fn action(resource_types: Vec<ActionResourceType>) -> Action {
        Action::new("edit").with_attribute(ActionAttribute {
            pk: 1,
            auth_type: AuthType::Abac,
            resource_types,
        })
    }

    fn job_request(owner: &str) -> Request {
        Request::new(
            "bk_test",
            Subject::new("user", "admin"),
            action(vec![ActionResourceType::new("bk_test", "job")]),
        )
        .with_resource(
            Resource::new("bk_test", "job", "j1")
                .with_attribute(Attribute::new().with("owner", owner)),
        )
    }

    fn policy(id: i64, expression: &str) -> AuthPolicy {
        AuthPolicy::new(id, expression).with_signature(format!("sig-{id}"))
    }

    fn owner_policy(id: i64, owner: &str) -> AuthPolicy {
        policy(
            id,
            &format!(
                r#"[{{"system":"bk_test","type":"job","expression":{{"StringEquals":{{"owner":["{owner}"]}}}}}}]"#
            ),
        )
    }

    #[test]
    fn test_eval_policies_returns_first_pass() {
        let evaluator = Evaluator::default();
        let mut ctx = EvalContext::new(&job_request("admin"));
        let policies = vec![
            owner_policy(1, "bob"),
            owner_policy(2, "admin"),
            owner_policy(3, "admin"),
        ];

        let result = evaluator.eval_policies(&mut ctx, &policies, Utc::now());
        assert_eq!(
            result,
            PolicyMatch {
                passed: true,
                policy_id: Some(2),
                error: None
            }
        );
    }

    #[test]
    fn test_eval_policies_no_pass_keeps_last_error() {
        let evaluator = Evaluator::default();
        let mut ctx = EvalContext::new(&job_request("admin"));
        let policies = vec![policy(1, "[{broken"), owner_policy(2, "bob")];

        let result = evaluator.eval_policies(&mut ctx, &policies, Utc::now());
        assert!(!result.passed);
        assert_eq!(result.policy_id, None);
        assert!(matches!(result.error, Some(AbacError::Parse { .. })));
    }

    #[test]
    fn test_parse_error_does_not_abort_siblings() {
        let evaluator = Evaluator::default();
        let mut ctx = EvalContext::new(&job_request("admin"));
        let policies = vec![policy(1, "[{broken"), owner_policy(2, "admin")];

        let result = evaluator.eval_policies(&mut ctx, &policies, Utc::now());
        assert!(result.passed);
        assert_eq!(result.policy_id, Some(2));
        assert!(result.error.is_some());
    }

    #[test]
    fn test_eval_policy_without_resource_type_always_passes() {
        let evaluator = Evaluator::default();
        let req = Request::new("bk_test", Subject::new("user", "admin"), action(vec![]));
        let mut ctx = EvalContext::new(&req);

        // even garbage passes: the expression is never looked at
        assert!(evaluator
            .eval_policy(&mut ctx, &policy(1, "[{broken"), Utc::now())
            .unwrap());
    }

    #[test]
    fn test_eval_policy_requires_resources() {
        let evaluator = Evaluator::default();
        let req = Request::new(
            "bk_test",
            Subject::new("user", "admin"),
            action(vec![ActionResourceType::new("bk_test", "job")]),
        );
        let mut ctx = EvalContext::new(&req);

        let err = evaluator
            .eval_policy(&mut ctx, &owner_policy(1, "admin"), Utc::now())
            .unwrap_err();
        assert!(matches!(err, AbacError::MissingResource { .. }));
    }

    #[test]
    fn test_filter_policies_collects_all_passes() {
        let evaluator = Evaluator::default();
        let mut ctx = EvalContext::new(&job_request("admin"));
        let policies = vec![
            owner_policy(1, "admin"),
            owner_policy(2, "bob"),
            owner_policy(3, "admin"),
        ];

        let filter = evaluator.filter_policies(&mut ctx, &policies, Utc::now());
        assert_eq!(filter.policy_ids, vec![1, 3]);
        assert!(filter.error.is_none());
    }

    const MIXED: &str = r#"[
        {"system":"bk_test","type":"job","expression":{"StringEquals":{"owner":["admin"]}}},
        {"system":"bk_cmdb","type":"host","expression":{"StringEquals":{"os":["linux"]}}}
    ]"#;

    #[test]
    fn test_partial_eval_keeps_partly_resolvable_policy_as_residual() {
        let evaluator = Evaluator::default();
        let mut ctx = EvalContext::new(&job_request("admin"));

        let result =
            evaluator.partial_eval_policies(&mut ctx, &[policy(1, MIXED)], Utc::now());
        assert!(result.passed_policy_ids.is_empty(), "local part alone must not pass");
        assert_eq!(
            result.residuals,
            vec![Condition::StringEquals(Leaf::new(
                "bk_cmdb.host.os",
                vec![AttrValue::from("linux")]
            ))]
        );
    }

    #[test]
    fn test_partial_eval_split() {
        let evaluator = Evaluator::default();
        let mut ctx = EvalContext::new(&job_request("admin"));
        let policies = vec![
            owner_policy(1, "admin"),
            owner_policy(2, "bob"),
            policy(3, MIXED),
            policy(4, "[{broken"),
        ];

        let result = evaluator.partial_eval_policies(&mut ctx, &policies, Utc::now());
        assert_eq!(result.passed_policy_ids, vec![1]);
        assert_eq!(result.residuals.len(), 1);
        assert!(matches!(result.error, Some(AbacError::Parse { .. })));
    }

    #[test]
    fn test_partial_eval_only_broken_policies_reports_error() {
        let evaluator = Evaluator::default();
        let mut ctx = EvalContext::new(&job_request("admin"));

        let result = evaluator.partial_eval_policies(&mut ctx, &[policy(1, "[{broken")], Utc::now());
        assert!(result.is_empty());
        assert!(matches!(result.error, Some(AbacError::Parse { .. })));

        let env = r#"[{"system":"bk_test","type":"_bk_iam_env_","expression":{"StringEquals":{"tz":["Nowhere/Zone"]}}}]"#;
        let result = evaluator.partial_eval_policies(&mut ctx, &[policy(2, env)], Utc::now());
        assert!(result.is_empty());
        assert!(matches!(result.error, Some(AbacError::InvalidTimezone { .. })));
    }

    #[test]
    fn test_partial_eval_denied_policies_carry_no_error() {
        let evaluator = Evaluator::default();
        let mut ctx = EvalContext::new(&job_request("admin"));

        let result = evaluator.partial_eval_policies(&mut ctx, &[owner_policy(1, "bob")], Utc::now());
        assert!(result.is_empty());
        assert_eq!(result.error, None);
    }

    #[test]
    fn test_partial_eval_without_any_resource_returns_whole_trees() {
        let evaluator = Evaluator::default();
        let req = Request::new(
            "bk_test",
            Subject::new("user", "admin"),
            action(vec![ActionResourceType::new("bk_test", "job")]),
        );
        let mut ctx = EvalContext::new(&req);

        let result =
            evaluator.partial_eval_policies(&mut ctx, &[owner_policy(1, "admin")], Utc::now());
        assert!(result.passed_policy_ids.is_empty());
        assert_eq!(
            result.residuals,
            vec![Condition::StringEquals(Leaf::new(
                "bk_test.job.owner",
                vec![AttrValue::from("admin")]
            ))]
        );
    }

    #[test]
    fn test_partial_eval_resolves_env_without_resources() {
        let evaluator = Evaluator::default();
        let req = Request::new(
            "bk_test",
            Subject::new("user", "admin"),
            action(vec![ActionResourceType::new("bk_test", "job")]),
        );
        let mut ctx = EvalContext::new(&req);
        // env leaves are decided; the resource leaf stays residual
        let expr = r#"[
            {"system":"bk_test","type":"job","expression":{"StringEquals":{"owner":["admin"]}}},
            {"system":"bk_test","type":"_bk_iam_env_","expression":{"AND":{"content":[
                {"StringEquals":{"tz":["UTC"]}},
                {"NumericGte":{"hms":[0]}}
            ]}}}
        ]"#;

        let result = evaluator.partial_eval_policies(&mut ctx, &[policy(1, expr)], Utc::now());
        assert!(ctx.has_env());
        assert!(result.passed_policy_ids.is_empty());
        assert_eq!(
            result.residuals,
            vec![Condition::StringEquals(Leaf::new(
                "bk_test.job.owner",
                vec![AttrValue::from("admin")]
            ))]
        );
    }

    #[test]
    fn test_policy_attr_keys_filters_and_dedupes() {
        let conditions = vec![
            Condition::from_policy_expression(MIXED).unwrap(),
            Condition::Or(vec![
                Condition::StringEquals(Leaf::new("bk_cmdb.host.os", vec![])),
                Condition::NumericGt(Leaf::new("bk_cmdb.host.cpu", vec![])),
            ]),
        ];

        assert_eq!(
            policy_attr_keys("bk_cmdb.host", &conditions),
            vec!["os".to_string(), "cpu".to_string()]
        );
        assert_eq!(policy_attr_keys("bk_test.job", &conditions), vec!["owner"]);
        assert!(policy_attr_keys("bk_x.y", &conditions).is_empty());
    }
}
