//! Resource-node chains built from iam paths.
//!
//! Unlike ABAC context construction, which rewrites three-part path
//! segments to the two-part form, RBAC keeps each segment's own system:
//! ancestors may live in another system than the resource.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use warden_types::{ActionResourceType, AttrValue, IAM_PATH, Resource};

use crate::error::{RbacError, Result};
use crate::pk_cache::ResourceTypeResolver;

/// One link of a resource's ancestor chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceNode {
    pub system: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub id: String,
    pub type_pk: i64,
}

impl ResourceNode {
    fn unique_id(&self) -> String {
        format!("{}:{}:{}", self.system, self.kind, self.id)
    }
}

/// Builds the node chain for `resource`: its iam-path nodes in path order,
/// then the resource itself. Duplicates are dropped.
pub fn parse_resource_nodes(
    resource: &Resource,
    action_resource_type: &ActionResourceType,
    resolver: &dyn ResourceTypeResolver,
) -> Result<Vec<ResourceNode>> {
    let mut nodes = match resource.attribute.get(IAM_PATH) {
        Some(paths) => parse_iam_path(paths, action_resource_type, resolver)?,
        None => Vec::new(),
    };

    let type_pk = resolver.resource_type_pk(&action_resource_type.system, &resource.kind)?;
    nodes.push(ResourceNode {
        system: action_resource_type.system.clone(),
        kind: resource.kind.clone(),
        id: resource.id.clone(),
        type_pk,
    });

    let mut seen = HashSet::with_capacity(nodes.len());
    let mut unique = Vec::with_capacity(nodes.len());
    for node in nodes {
        if seen.insert(node.unique_id()) {
            unique.push(node);
        }
    }
    Ok(unique)
}

/// Parses `_bk_iam_path_` into nodes, resolving each type pk.
///
/// Segments are `type,id`, taking the system of the action resource type,
/// or `system,type,id`. Empty paths are skipped.
pub fn parse_iam_path(
    paths: &AttrValue,
    action_resource_type: &ActionResourceType,
    resolver: &dyn ResourceTypeResolver,
) -> Result<Vec<ResourceNode>> {
    let paths: Vec<&str> = match paths {
        AttrValue::String(path) => vec![path.as_str()],
        AttrValue::List(items) => items
            .iter()
            .map(|item| item.as_str().ok_or(RbacError::IamPathNotString))
            .collect::<Result<_>>()?,
        other => {
            return Err(RbacError::IamPathNotStringOrArray {
                found: other.kind().to_string(),
            });
        }
    };

    let mut nodes = Vec::new();
    for path in paths.into_iter().filter(|p| !p.is_empty()) {
        for segment in path.trim_matches('/').split('/') {
            if segment.is_empty() {
                continue;
            }
            let parts: Vec<&str> = segment.split(',').collect();
            let (system, kind, id) = match parts.as_slice() {
                [kind, id] => (action_resource_type.system.as_str(), *kind, *id),
                [system, kind, id] => (*system, *kind, *id),
                _ => {
                    return Err(RbacError::InvalidIamPath {
                        path: path.to_string(),
                    });
                }
            };

            let type_pk = resolver.resource_type_pk(system, kind)?;
            nodes.push(ResourceNode {
                system: system.to_string(),
                kind: kind.to_string(),
                id: id.to_string(),
                type_pk,
            });
        }
    }
    Ok(nodes)
}
