//! # warden-rbac: Role-Based Access Control over resource paths
//!
//! A subject passes RBAC if one of its effective groups has been granted the
//! action on the resource itself or on any ancestor named in the
//! resource's `_bk_iam_path_`. Only actions bound to a single resource type
//! are supported.
//!
//! The grant data comes from two collaborators: a precomputed
//! [`GroupAuthorizationCache`] and the authoritative
//! [`GroupAuthorizationService`]. Callers pick one per evaluation.

mod error;
pub mod evaluator;
pub mod node;
pub mod pk_cache;
pub mod source;

pub use error::{RbacError, Result};
pub use evaluator::{RbacEvaluator, valid_resource_type};
pub use node::{ResourceNode, parse_iam_path, parse_resource_nodes};
pub use pk_cache::{ResourceTypePkCache, ResourceTypeResolver};
pub use source::{GroupAuthorizationCache, GroupAuthorizationService};
