//! RBAC evaluation over a resource's ancestor chain.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, warn};
use warden_types::{Action, ActionResourceType, Resource};

use crate::error::{RbacError, Result};
use crate::node::{ResourceNode, parse_resource_nodes};
use crate::pk_cache::{ResourceTypePkCache, ResourceTypeResolver};
use crate::source::{GroupAuthorizationCache, GroupAuthorizationService};

/// Checks whether any of a subject's groups is authorized for an action on
/// a resource or one of its ancestors.
#[derive(Clone)]
pub struct RbacEvaluator {
    type_pks: ResourceTypePkCache,
    cache: Arc<dyn GroupAuthorizationCache>,
    service: Arc<dyn GroupAuthorizationService>,
}

impl RbacEvaluator {
    pub fn new(
        type_pks: ResourceTypePkCache,
        cache: Arc<dyn GroupAuthorizationCache>,
        service: Arc<dyn GroupAuthorizationService>,
    ) -> Self {
        Self {
            type_pks,
            cache,
            service,
        }
    }

    /// Evaluates `action` on the single resource in `resources`.
    ///
    /// With `without_cache` the authorization service is asked directly;
    /// otherwise the precomputed group index is used. Returns `Ok(false)`
    /// when no node grants the action to any of `effect_group_pks`.
    pub fn eval(
        &self,
        system: &str,
        action: &Action,
        resources: &[Resource],
        effect_group_pks: &[i64],
        without_cache: bool,
    ) -> Result<bool> {
        let action_resource_types = action.resource_types().unwrap_or_default();
        let (resource, action_resource_type) =
            match valid_resource_type(resources, action_resource_types) {
                Ok(pair) => pair,
                Err(error) => {
                    warn!(system = %system, action = %action.id, error = %error, "rbac validation failed");
                    return Err(error);
                }
            };

        let nodes = parse_resource_nodes(resource, action_resource_type, &self.type_pks)?;

        let action_pk = action.pk().map_err(|_| RbacError::MissingActionPk {
            action: action.id.clone(),
        })?;
        let action_resource_type_pk = self
            .type_pks
            .resource_type_pk(&action_resource_type.system, &action_resource_type.kind)?;

        let effect: HashSet<i64> = effect_group_pks.iter().copied().collect();

        for node in &nodes {
            let matched = if without_cache {
                self.live_match(system, action_pk, action_resource_type_pk, node, &effect)?
            } else {
                self.cached_match(system, action_pk, action_resource_type_pk, node, &effect)?
            };

            if let Some(group_pk) = matched {
                debug!(
                    system = %system,
                    action = %action.id,
                    resource_type = %node.kind,
                    resource_id = %node.id,
                    group_pk,
                    "rbac passed"
                );
                return Ok(true);
            }
        }

        debug!(system = %system, action = %action.id, nodes = nodes.len(), "rbac no group matched");
        Ok(false)
    }

    fn cached_match(
        &self,
        system: &str,
        action_pk: i64,
        action_resource_type_pk: i64,
        node: &ResourceNode,
        effect: &HashSet<i64>,
    ) -> Result<Option<i64>> {
        let group_pks = self.cache.authorized_group_pks(
            system,
            action_pk,
            action_resource_type_pk,
            node.type_pk,
            &node.id,
        )?;
        Ok(group_pks.into_iter().find(|pk| effect.contains(pk)))
    }

    fn live_match(
        &self,
        system: &str,
        action_pk: i64,
        action_resource_type_pk: i64,
        node: &ResourceNode,
        effect: &HashSet<i64>,
    ) -> Result<Option<i64>> {
        let group_actions = self.service.authorized_group_actions(
            system,
            action_resource_type_pk,
            node.type_pk,
            &node.id,
        )?;
        Ok(group_actions
            .into_iter()
            .filter(|(group_pk, _)| effect.contains(group_pk))
            .find(|(_, action_pks)| action_pks.contains(&action_pk))
            .map(|(group_pk, _)| group_pk))
    }
}

impl std::fmt::Debug for RbacEvaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RbacEvaluator")
            .field("type_pks", &self.type_pks)
            .finish_non_exhaustive()
    }
}

/// Checks the single-resource-type precondition and the type match.
pub fn valid_resource_type<'a>(
    resources: &'a [Resource],
    action_resource_types: &'a [ActionResourceType],
) -> Result<(&'a Resource, &'a ActionResourceType)> {
    let ([resource], [action_resource_type]) = (resources, action_resource_types) else {
        return Err(RbacError::UnsupportedResourceTypes {
            action_types: action_resource_types.len(),
            resources: resources.len(),
        });
    };

    if resource.system != action_resource_type.system || resource.kind != action_resource_type.kind
    {
        return Err(RbacError::TypeMismatch {
            resource: resource.namespace(),
            expected: format!("{}.{}", action_resource_type.system, action_resource_type.kind),
        });
    }

    Ok((resource, action_resource_type))
}
