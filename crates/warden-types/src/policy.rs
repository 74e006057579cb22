//! Stored policies and external-resource query shapes.

use serde::{Deserialize, Serialize};

use crate::Attribute;

/// A policy as returned by the policy source.
///
/// `expression` is the JSON-encoded condition list; `expression_signature`
/// is a content hash of it used as the parse-cache key. Expired policies are
/// filtered out by the source before they reach the evaluator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthPolicy {
    #[serde(default)]
    pub version: String,
    pub id: i64,
    pub expression: String,
    #[serde(default)]
    pub expression_signature: String,
    pub expired_at: i64,
}

impl AuthPolicy {
    pub fn new(id: i64, expression: impl Into<String>) -> Self {
        Self {
            version: String::new(),
            id,
            expression: expression.into(),
            expression_signature: String::new(),
            expired_at: i64::MAX,
        }
    }

    pub fn with_signature(mut self, signature: impl Into<String>) -> Self {
        self.expression_signature = signature.into();
        self
    }
}

/// A batch of instance IDs of one external resource type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtResource {
    pub system: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub ids: Vec<String>,
}

/// One external instance with the attributes the policies need.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Instance {
    pub id: String,
    pub attribute: Attribute,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtResourceWithAttribute {
    pub system: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub instances: Vec<Instance>,
}

impl ExtResourceWithAttribute {
    /// Every ID mapped to an empty attribute bag.
    pub fn without_attributes(resource: &ExtResource) -> Self {
        Self {
            system: resource.system.clone(),
            kind: resource.kind.clone(),
            instances: resource
                .ids
                .iter()
                .map(|id| Instance {
                    id: id.clone(),
                    attribute: Attribute::new(),
                })
                .collect(),
        }
    }
}
