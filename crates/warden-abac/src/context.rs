//! Per-request evaluation context.
//!
//! [`EvalContext`] registers each resource's attribute bag under
//! `{system}.{type}` after two fix-ups: the resource id is injected as
//! `id`, and three-part iam paths are rewritten to the two-part form the
//! policies are written against.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use warden_types::{
    Action, AttrValue, Attribute, IAM_ENV_SUFFIX, IAM_ENV_TZ_SUFFIX, IAM_PATH, ID_KEY, Request,
    env_namespace,
};

use crate::ObjectSet;
use crate::condition::{AttributeLookup, Condition};
use crate::error::{AbacError, Result};
use crate::time_env::TimeEnvCache;

/// Evaluation context for a single request.
#[derive(Debug, Clone)]
pub struct EvalContext {
    system: String,
    action: Action,
    resource_count: usize,
    objects: ObjectSet,
}

impl EvalContext {
    pub fn new(request: &Request) -> Self {
        let mut objects = ObjectSet::new();

        for resource in &request.resources {
            let mut attrs: Attribute = resource.attribute.clone();
            attrs.set(ID_KEY, resource.id.as_str());

            if let Some(paths) = attrs.get(IAM_PATH) {
                let standardized = standardize_iam_paths(paths);
                attrs.set(IAM_PATH, standardized);
            }

            objects.set(resource.namespace(), attrs);
        }

        Self {
            system: request.system.clone(),
            action: request.action.clone(),
            resource_count: request.resources.len(),
            objects,
        }
    }

    pub fn system(&self) -> &str {
        &self.system
    }

    pub fn action(&self) -> &Action {
        &self.action
    }

    pub fn has_resources(&self) -> bool {
        self.resource_count > 0
    }

    pub fn set_env(&mut self, envs: Arc<Attribute>) {
        self.objects.set(env_namespace(&self.system), envs);
    }

    pub fn unset_env(&mut self) {
        self.objects.del(&env_namespace(&self.system));
    }

    pub fn has_env(&self) -> bool {
        self.objects.has(&env_namespace(&self.system))
    }

    /// Injects the time environment a policy's condition needs.
    ///
    /// The previous environment is always cleared. If the condition reads any
    /// environment key, its `tz` leaf names the timezone; one policy cannot
    /// evaluate under two timezones, so that leaf must carry exactly one
    /// string. A condition with environment keys but no `tz` leaf is
    /// evaluated without an environment.
    pub fn init_environments(
        &mut self,
        condition: &Condition,
        now: DateTime<Utc>,
        time_envs: &TimeEnvCache,
    ) -> Result<()> {
        self.unset_env();

        if !condition.has_key(&|key: &str| key.contains(IAM_ENV_SUFFIX)) {
            return Ok(());
        }

        let Some(tz_values) =
            condition.first_match_key_values(&|key: &str| key.ends_with(IAM_ENV_TZ_SUFFIX))
        else {
            return Ok(());
        };

        let tz = match tz_values {
            [AttrValue::String(tz)] => tz,
            [_] => {
                return Err(AbacError::EnvironmentFormat {
                    reason: "tz is not a string".to_string(),
                });
            }
            _ => {
                return Err(AbacError::EnvironmentFormat {
                    reason: format!("expected exactly one tz, got {}", tz_values.len()),
                });
            }
        };

        let envs = time_envs.get(tz, now)?;
        self.set_env(envs);
        Ok(())
    }
}

impl AttributeLookup for EvalContext {
    fn get_attr(&self, key: &str) -> Option<&AttrValue> {
        self.objects.get_attribute(key)
    }

    fn has_resource(&self, namespace: &str) -> bool {
        self.objects.has(namespace)
    }
}

// ============================================================================
// Iam Path Normalization
// ============================================================================

/// Rewrites `/system,type,id/...` paths to `/type,id/...`.
///
/// Accepts a string or a list of strings and always yields a list. Anything
/// else, or a list holding a non-string, is returned unchanged. A path is
/// rewritten only if every segment has three parts; paths not starting
/// with `/` pass through as-is.
pub fn standardize_iam_paths(paths: &AttrValue) -> AttrValue {
    let raw: Vec<&str> = match paths {
        AttrValue::String(s) => vec![s.as_str()],
        AttrValue::List(_) => match paths.as_str_list() {
            Some(list) => list,
            None => return paths.clone(),
        },
        _ => return paths.clone(),
    };

    AttrValue::List(
        raw.into_iter()
            .map(|path| AttrValue::String(standardize_iam_path(path)))
            .collect(),
    )
}

fn standardize_iam_path(path: &str) -> String {
    if !path.starts_with('/') {
        return path.to_string();
    }

    let mut out = String::with_capacity(path.len());
    out.push('/');
    for node in path.trim_matches('/').split('/') {
        let parts: Vec<&str> = node.split(',').collect();
        let [_system, kind, id] = parts.as_slice() else {
            return path.to_string();
        };
        out.push_str(kind);
        out.push(',');
        out.push_str(id);
        out.push('/');
    }

    if !path.ends_with('/') && out.len() > 1 {
        out.pop();
    }
    out
}
