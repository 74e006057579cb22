//! The authorization request and the entities it names.

use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize};

use crate::{Attribute, TypeError};

// ============================================================================
// Action
// ============================================================================

/// How an action is authorized.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthType {
    /// Not declared; treated as ABAC.
    #[default]
    None,
    /// Attribute-based: policies carry condition expressions.
    Abac,
    /// Group-resource authorization along the instance's ancestor chain.
    Rbac,
}

/// A `(system, type)` pair an action expects resources of.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ActionResourceType {
    pub system: String,
    #[serde(rename = "type")]
    pub kind: String,
}

impl ActionResourceType {
    pub fn new(system: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            kind: kind.into(),
        }
    }
}

/// Action detail filled in by the action source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionAttribute {
    pub pk: i64,
    #[serde(default)]
    pub auth_type: AuthType,
    #[serde(default)]
    pub resource_types: Vec<ActionResourceType>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    pub id: String,
    /// `None` until the action detail has been fetched.
    #[serde(default)]
    pub attribute: Option<ActionAttribute>,
}

impl Action {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            attribute: None,
        }
    }

    pub fn with_attribute(mut self, attribute: ActionAttribute) -> Self {
        self.attribute = Some(attribute);
        self
    }

    fn filled(&self) -> Result<&ActionAttribute, TypeError> {
        self.attribute
            .as_ref()
            .ok_or_else(|| TypeError::ActionNotFilled {
                action: self.id.clone(),
            })
    }

    pub fn pk(&self) -> Result<i64, TypeError> {
        self.filled().map(|a| a.pk)
    }

    pub fn auth_type(&self) -> AuthType {
        self.attribute.as_ref().map_or(AuthType::None, |a| a.auth_type)
    }

    pub fn resource_types(&self) -> Result<&[ActionResourceType], TypeError> {
        self.filled().map(|a| a.resource_types.as_slice())
    }

    /// True when the action is filled and binds to no resource type at all.
    pub fn without_resource_type(&self) -> bool {
        self.attribute
            .as_ref()
            .is_some_and(|a| a.resource_types.is_empty())
    }
}

// ============================================================================
// Subject
// ============================================================================

/// A group membership with its expiry (unix seconds).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectGroup {
    pub pk: i64,
    pub expired_at: i64,
}

/// Subject detail filled in by the subject source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectAttribute {
    pub pk: i64,
    #[serde(default)]
    pub groups: Vec<SubjectGroup>,
    #[serde(default)]
    pub departments: Vec<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    #[serde(rename = "type")]
    pub kind: String,
    pub id: String,
    #[serde(default)]
    pub attribute: Option<SubjectAttribute>,
}

impl Subject {
    pub fn new(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            id: id.into(),
            attribute: None,
        }
    }

    pub fn pk(&self) -> Result<i64, TypeError> {
        self.attribute
            .as_ref()
            .map(|a| a.pk)
            .ok_or_else(|| TypeError::SubjectNotFilled {
                subject: format!("{}:{}", self.kind, self.id),
            })
    }

    /// Group PKs whose membership has not expired at `now`.
    pub fn effect_group_pks(&self, now: i64) -> Vec<i64> {
        self.attribute.as_ref().map_or_else(Vec::new, |a| {
            a.groups
                .iter()
                .filter(|g| g.expired_at > now)
                .map(|g| g.pk)
                .collect()
        })
    }
}

// ============================================================================
// Resource
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub system: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub id: String,
    #[serde(default)]
    pub attribute: Attribute,
}

impl Resource {
    pub fn new(system: impl Into<String>, kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            kind: kind.into(),
            id: id.into(),
            attribute: Attribute::new(),
        }
    }

    pub fn with_attribute(mut self, attribute: Attribute) -> Self {
        self.attribute = attribute;
        self
    }

    /// The attribute namespace, `{system}.{type}`.
    pub fn namespace(&self) -> String {
        format!("{}.{}", self.system, self.kind)
    }
}

// ============================================================================
// Request
// ============================================================================

/// A single authorization request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub system: String,
    pub subject: Subject,
    pub action: Action,
    #[serde(default)]
    pub resources: Vec<Resource>,
}

impl Request {
    pub fn new(system: impl Into<String>, subject: Subject, action: Action) -> Self {
        Self {
            system: system.into(),
            subject,
            action,
            resources: Vec::new(),
        }
    }

    pub fn with_resource(mut self, resource: Resource) -> Self {
        self.resources.push(resource);
        self
    }

    pub fn has_resources(&self) -> bool {
        !self.resources.is_empty()
    }

    /// Resources owned by a system other than the requesting one.
    pub fn has_remote_resources(&self) -> bool {
        self.resources.iter().any(|r| r.system != self.system)
    }

    pub fn remote_resources_mut(&mut self) -> impl Iterator<Item = &mut Resource> {
        let system = self.system.as_str();
        self.resources.iter_mut().filter(move |r| r.system != system)
    }

    /// Checks that the supplied resources cover the action's resource types
    /// exactly: one resource per distinct type, no strangers.
    pub fn validate_action_resource(&self) -> bool {
        let Ok(resource_types) = self.action.resource_types() else {
            return false;
        };
        let type_set: HashSet<(&str, &str)> = resource_types
            .iter()
            .map(|rt| (rt.system.as_str(), rt.kind.as_str()))
            .collect();

        type_set.len() == self.resources.len()
            && self
                .resources
                .iter()
                .all(|r| type_set.contains(&(r.system.as_str(), r.kind.as_str())))
    }

    /// Checks supplied resources for query mode: every remote resource type
    /// must be present, local ones may be left out.
    pub fn validate_action_remote_resource(&self) -> bool {
        let Ok(resource_types) = self.action.resource_types() else {
            return false;
        };

        let mut local = BTreeSet::new();
        let mut remote = BTreeSet::new();
        for rt in resource_types {
            if rt.system == self.system {
                local.insert(rt.kind.as_str());
            } else {
                remote.insert(rt.kind.as_str());
            }
        }

        let mut remote_count = 0;
        for resource in &self.resources {
            if resource.system == self.system {
                if !local.contains(resource.kind.as_str()) {
                    return false;
                }
            } else {
                if !remote.contains(resource.kind.as_str()) {
                    return false;
                }
                remote_count += 1;
            }
        }
        remote.len() == remote_count
    }
}
