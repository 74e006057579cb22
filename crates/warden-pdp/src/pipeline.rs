//! The decision pipeline.
//!
//! Every entry point follows the same steps: fill the action detail,
//! validate the request resources against it, fill the subject detail,
//! resolve the subject's groups, list the candidate policies, then evaluate.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{debug, info, warn};
use warden_abac::{
    Condition, EvalContext, Evaluator, ExpressionCache, PartialEvaluation, TimeEnvCache,
    any_expression, conditions_to_expression, empty_expression,
};
use warden_config::PdpConfig;
use warden_rbac::{
    GroupAuthorizationCache, GroupAuthorizationService, RbacEvaluator, ResourceTypePkCache,
    ResourceTypeResolver,
};
use warden_types::{
    AuthPolicy, AuthType, ExtResource, ExtResourceWithAttribute, Request, SourceError,
};

use crate::decision::{Decision, DenyReason};
use crate::error::{PdpError, Result, upstream};
use crate::remote::{fill_remote_resource_attrs, query_ext_resource_attrs};
use crate::source::{
    ActionDetailSource, PolicySource, RemoteResourceSource, SubjectDetailSource,
};

/// The collaborators a [`Pdp`] fetches from.
#[derive(Clone)]
pub struct Sources {
    pub actions: Arc<dyn ActionDetailSource>,
    pub subjects: Arc<dyn SubjectDetailSource>,
    pub policies: Arc<dyn PolicySource>,
    pub remote: Arc<dyn RemoteResourceSource>,
}

/// Policy decision point.
///
/// Cheap to share: all state is behind `Arc` or in concurrent caches.
#[derive(Clone)]
pub struct Pdp {
    sources: Sources,
    evaluator: Evaluator,
    rbac: Option<RbacEvaluator>,
    config: PdpConfig,
    clock: fn() -> DateTime<Utc>,
}

impl Pdp {
    pub fn new(config: &PdpConfig, sources: Sources) -> Self {
        let cache = &config.cache;
        let evaluator = Evaluator::new(
            ExpressionCache::new(cache.expression_ttl(), cache.expression_capacity),
            TimeEnvCache::new(cache.time_env_ttl(), cache.time_env_capacity),
        );

        Self {
            sources,
            evaluator,
            rbac: None,
            config: config.clone(),
            clock: Utc::now,
        }
    }

    /// Enables RBAC evaluation for actions whose auth type is RBAC.
    ///
    /// Ignored when `rbac.enabled` is false in the configuration.
    pub fn with_rbac(
        mut self,
        resolver: Arc<dyn ResourceTypeResolver>,
        cache: Arc<dyn GroupAuthorizationCache>,
        service: Arc<dyn GroupAuthorizationService>,
    ) -> Self {
        if !self.config.rbac.enabled {
            info!("rbac disabled by configuration");
            return self;
        }

        let type_pks = ResourceTypePkCache::new(
            resolver,
            self.config.cache.resource_type_pk_ttl(),
            self.config.cache.resource_type_pk_capacity,
        );
        self.rbac = Some(RbacEvaluator::new(type_pks, cache, service));
        self
    }

    /// Replaces the wall clock, e.g. to evaluate time windows deterministically.
    pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }

    pub fn evaluator(&self) -> &Evaluator {
        &self.evaluator
    }

    // ========================================================================
    // Entry points
    // ========================================================================

    /// Decides whether the subject may perform the action on the resources.
    pub fn eval(&self, request: &mut Request, without_cache: bool) -> Result<Decision> {
        let now = (self.clock)();

        self.fill_action_detail(request)?;

        if !request.validate_action_resource() {
            warn!(
                system = %request.system,
                action = %request.action.id,
                resources = request.resources.len(),
                "request resources do not match action"
            );
            return Err(PdpError::InvalidActionResource {
                system: request.system.clone(),
                action: request.action.id.clone(),
            });
        }

        if !self.fill_subject_detail(request)? {
            return Ok(decided(request, Decision::denied(DenyReason::SubjectNotFound)));
        }

        let (abac_group_pks, rbac_group_pks) = self.effect_auth_type_group_pks(request, now)?;

        if let Some(rbac) = &self.rbac
            && request.action.auth_type() == AuthType::Rbac
            && !rbac_group_pks.is_empty()
        {
            let passed = rbac.eval(
                &request.system,
                &request.action,
                &request.resources,
                &rbac_group_pks,
                without_cache,
            )?;
            if passed {
                return Ok(decided(request, Decision::Allowed { policy_id: None }));
            }
        }

        let policies = self.list_policies(request, &abac_group_pks, without_cache)?;
        if policies.is_empty() {
            return Ok(decided(request, Decision::denied(DenyReason::NoPolicies)));
        }

        let mut ctx = EvalContext::new(request);
        self.log_environment(now);
        let result = self.evaluator.eval_policies(&mut ctx, &policies, now);

        let decision = match (result.passed, result.error) {
            (true, _) => Decision::Allowed {
                policy_id: result.policy_id,
            },
            (false, Some(source)) => {
                warn!(
                    system = %request.system,
                    action = %request.action.id,
                    error = %source,
                    "no policy passed and evaluation failed"
                );
                return Err(PdpError::Evaluation { source });
            }
            (false, None) => Decision::denied(DenyReason::NoPolicyMatched),
        };
        Ok(decided(request, decision))
    }

    /// Returns the filter expression describing the resources the subject
    /// may act on.
    ///
    /// `{}` when nothing can ever pass, the `any` filter when some policy
    /// passes unconditionally.
    pub fn query(
        &self,
        request: &mut Request,
        check_remote_resource: bool,
        without_cache: bool,
    ) -> Result<Value> {
        let partial = self.query_and_partial_eval(request, check_remote_resource, without_cache)?;
        let expression = render(&partial)?;
        debug!(system = %request.system, action = %request.action.id, expression = %expression, "query");
        Ok(expression)
    }

    /// Like [`Pdp::query`], and also fetches the attributes of the given
    /// external instances that the resulting expression refers to.
    pub fn query_by_ext_resources(
        &self,
        request: &mut Request,
        ext_resources: &[ExtResource],
        without_cache: bool,
    ) -> Result<(Value, Vec<ExtResourceWithAttribute>)> {
        let partial = self.query_and_partial_eval(request, false, without_cache)?;

        if partial.residuals.is_empty() {
            let resources = ext_resources
                .iter()
                .map(ExtResourceWithAttribute::without_attributes)
                .collect();
            let expression = if partial.passed_policy_ids.is_empty() {
                empty_expression()
            } else {
                any_expression()
            };
            return Ok((expression, resources));
        }

        let mut resources = Vec::with_capacity(ext_resources.len());
        for ext in ext_resources {
            let instances =
                query_ext_resource_attrs(ext, &partial.residuals, self.sources.remote.as_ref())?;
            resources.push(ExtResourceWithAttribute {
                system: ext.system.clone(),
                kind: ext.kind.clone(),
                instances,
            });
        }

        Ok((render(&partial)?, resources))
    }

    /// Lists the policies the subject holds for the action.
    pub fn query_auth_policies(
        &self,
        request: &mut Request,
        without_cache: bool,
    ) -> Result<Vec<AuthPolicy>> {
        let now = (self.clock)();

        self.fill_action_detail(request)?;

        if !self.fill_subject_detail(request)? {
            return Err(PdpError::SubjectNotFound {
                subject_type: request.subject.kind.clone(),
                subject_id: request.subject.id.clone(),
            });
        }

        let (abac_group_pks, _) = self.effect_auth_type_group_pks(request, now)?;
        self.list_policies(request, &abac_group_pks, without_cache)
    }

    // ========================================================================
    // Steps
    // ========================================================================

    fn query_and_partial_eval(
        &self,
        request: &mut Request,
        check_remote_resource: bool,
        without_cache: bool,
    ) -> Result<PartialEvaluation> {
        let now = (self.clock)();

        self.fill_action_detail(request)?;

        if check_remote_resource && !request.validate_action_remote_resource() {
            warn!(
                system = %request.system,
                action = %request.action.id,
                "request remote resources do not match action"
            );
            return Err(PdpError::InvalidActionResource {
                system: request.system.clone(),
                action: request.action.id.clone(),
            });
        }

        if !self.fill_subject_detail(request)? {
            return Ok(PartialEvaluation::default());
        }

        let (abac_group_pks, _) = self.effect_auth_type_group_pks(request, now)?;

        let policies = self.list_policies(request, &abac_group_pks, without_cache)?;
        if policies.is_empty() {
            return Ok(PartialEvaluation::default());
        }

        if request.has_remote_resources() {
            // unparsable policies are reported by the partial evaluation below
            let conditions: Vec<Arc<Condition>> = policies
                .iter()
                .filter_map(|policy| self.evaluator.parse_policy(policy).ok())
                .collect();
            fill_remote_resource_attrs(
                request,
                conditions.iter().map(|c| &**c),
                self.sources.remote.as_ref(),
            )?;
        }

        let mut ctx = EvalContext::new(request);
        self.log_environment(now);
        let partial = self.evaluator.partial_eval_policies(&mut ctx, &policies, now);

        if partial.is_empty()
            && let Some(source) = &partial.error
        {
            warn!(
                system = %request.system,
                action = %request.action.id,
                error = %source,
                "no policy resolved and evaluation failed"
            );
            return Err(PdpError::Evaluation {
                source: source.clone(),
            });
        }
        Ok(partial)
    }

    fn fill_action_detail(&self, request: &mut Request) -> Result<()> {
        match self
            .sources
            .actions
            .action_detail(&request.system, &request.action.id)
        {
            Ok(attribute) => {
                request.action.attribute = Some(attribute);
                Ok(())
            }
            Err(SourceError::NotFound { .. }) => Err(PdpError::InvalidAction {
                system: request.system.clone(),
                action: request.action.id.clone(),
            }),
            Err(source) => Err(upstream("fill_action_detail")(source)),
        }
    }

    /// Returns false if the subject does not exist.
    fn fill_subject_detail(&self, request: &mut Request) -> Result<bool> {
        match self
            .sources
            .subjects
            .subject_detail(&request.subject.kind, &request.subject.id)
        {
            Ok(attribute) => {
                request.subject.attribute = Some(attribute);
                Ok(true)
            }
            Err(SourceError::NotFound { .. }) => {
                debug!(
                    subject_type = %request.subject.kind,
                    subject_id = %request.subject.id,
                    "subject not found"
                );
                Ok(false)
            }
            Err(source) => Err(upstream("fill_subject_detail")(source)),
        }
    }

    /// Effective groups as `(abac, rbac)`. Groups are split only for RBAC
    /// actions when RBAC is enabled; otherwise every group is an ABAC group.
    fn effect_auth_type_group_pks(
        &self,
        request: &Request,
        now: DateTime<Utc>,
    ) -> Result<(Vec<i64>, Vec<i64>)> {
        let policies = &self.sources.policies;
        let group_pks = policies
            .effect_group_pks(&request.system, &request.subject, now.timestamp())
            .map_err(upstream("effect_group_pks"))?;

        if self.rbac.is_none() || request.action.auth_type() != AuthType::Rbac {
            return Ok((group_pks, Vec::new()));
        }

        policies
            .split_group_pks(&request.system, &group_pks)
            .map_err(upstream("split_group_pks"))
    }

    fn list_policies(
        &self,
        request: &Request,
        group_pks: &[i64],
        without_cache: bool,
    ) -> Result<Vec<AuthPolicy>> {
        self.sources
            .policies
            .list_policies(
                &request.system,
                &request.subject,
                &request.action,
                group_pks,
                without_cache,
            )
            .map_err(upstream("list_policies"))
    }

    fn log_environment(&self, now: DateTime<Utc>) {
        if !tracing::enabled!(tracing::Level::DEBUG) {
            return;
        }
        let tz = &self.config.evaluation.default_timezone;
        if let Ok(envs) = self.evaluator.time_envs().get(tz, now) {
            debug!(tz = %tz, envs = ?envs, "evaluation environment");
        }
    }
}

impl std::fmt::Debug for Pdp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pdp")
            .field("evaluator", &self.evaluator)
            .field("rbac", &self.rbac)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn render(partial: &PartialEvaluation) -> Result<Value> {
    if !partial.passed_policy_ids.is_empty() {
        return Ok(any_expression());
    }
    Ok(conditions_to_expression(&partial.residuals)?)
}

fn decided(request: &Request, decision: Decision) -> Decision {
    info!(
        system = %request.system,
        subject_type = %request.subject.kind,
        subject_id = %request.subject.id,
        action = %request.action.id,
        decision = ?decision,
        "eval decided"
    );
    decision
}
