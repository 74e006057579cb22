//! Errors raised by RBAC evaluation.

use thiserror::Error;
use warden_types::SourceError;

/// Error type for RBAC evaluation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RbacError {
    /// RBAC only handles actions bound to one resource type, checked
    /// against exactly one resource.
    #[error(
        "rbac eval only supports one resource type, got {action_types} action types and {resources} resources"
    )]
    UnsupportedResourceTypes { action_types: usize, resources: usize },

    /// The resource is not of the action's resource type.
    #[error("resource type {resource} does not match action resource type {expected}")]
    TypeMismatch { resource: String, expected: String },

    /// An iam-path segment is neither `type,id` nor `system,type,id`.
    #[error("iam path {path} is not valid, example: /system_id,resource_type_id,resource_id/")]
    InvalidIamPath { path: String },

    /// An iam-path list holds a non-string element.
    #[error("iam path is not string")]
    IamPathNotString,

    /// The iam path is neither a string nor a list.
    #[error("iam path is not string or array, got {found}")]
    IamPathNotStringOrArray { found: String },

    /// The action detail carries no pk.
    #[error("action {action} has no pk")]
    MissingActionPk { action: String },

    /// A resource-type or authorization lookup failed.
    #[error("rbac lookup failed: {0}")]
    Lookup(#[from] SourceError),
}

/// Result type for RBAC operations.
pub type Result<T> = std::result::Result<T, RbacError>;
