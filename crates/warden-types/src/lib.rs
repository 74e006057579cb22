//! # warden-types: Core types for the Warden policy decision point
//!
//! This crate holds the data model shared by the evaluation crates:
//! - [`Request`] with its [`Subject`], [`Action`] and [`Resource`]s
//! - [`AttrValue`] and [`Attribute`], the closed attribute value space
//! - [`AuthPolicy`] and the external-resource query shapes
//! - Reserved attribute keys
//! - [`SourceError`], the failure type of every external collaborator

mod policy;
mod request;
mod value;

pub use policy::{AuthPolicy, ExtResource, ExtResourceWithAttribute, Instance};
pub use request::{
    Action, ActionAttribute, ActionResourceType, AuthType, Request, Resource, Subject,
    SubjectAttribute, SubjectGroup,
};
pub use value::{AttrValue, Attribute};

use thiserror::Error;

// ============================================================================
// Reserved Keys
// ============================================================================

/// Attribute key carrying a resource's ancestor chain, e.g. `/biz,1/set,2/`.
pub const IAM_PATH: &str = "_bk_iam_path_";

/// Suffix of a fully qualified iam-path key, `{system}.{type}._bk_iam_path_`.
pub const IAM_PATH_SUFFIX: &str = "._bk_iam_path_";

/// Namespace suffix for injected environment attributes, `{system}._bk_iam_env_`.
pub const IAM_ENV_SUFFIX: &str = "._bk_iam_env_";

/// Suffix of the environment timezone key.
pub const IAM_ENV_TZ_SUFFIX: &str = "._bk_iam_env_.tz";

/// Field name of the resource id injected into every attribute bag.
pub const ID_KEY: &str = "id";

/// Environment namespace for a system.
pub fn env_namespace(system: &str) -> String {
    format!("{system}{IAM_ENV_SUFFIX}")
}

// ============================================================================
// Errors
// ============================================================================

/// Errors raised while converting or reading typed values.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TypeError {
    /// The value has a shape outside the attribute value space.
    #[error("unsupported attribute value: {found}")]
    Unsupported { found: String },

    /// An attribute bag was expected to be a JSON object.
    #[error("attribute bag must be an object, got {found}")]
    NotAnObject { found: String },

    /// The action detail has not been filled in yet.
    #[error("action {action} has no attribute filled")]
    ActionNotFilled { action: String },

    /// The subject detail has not been filled in yet.
    #[error("subject {subject} has no attribute filled")]
    SubjectNotFilled { subject: String },
}

/// Failure reported by an external collaborator (detail, policy or
/// attribute source).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// The looked-up entity does not exist.
    #[error("{what} not found")]
    NotFound { what: String },

    /// The source itself failed.
    #[error("upstream failure: {reason}")]
    Upstream { reason: String },
}

impl SourceError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    pub fn upstream(reason: impl Into<String>) -> Self {
        Self::Upstream {
            reason: reason.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_error_kinds() {
        assert!(SourceError::not_found("subject user/admin").is_not_found());
        assert!(!SourceError::upstream("timeout").is_not_found());
        assert_eq!(
            SourceError::not_found("action edit").to_string(),
            "action edit not found"
        );
    }

    #[test]
    fn test_env_namespace() {
        assert_eq!(env_namespace("bk_test"), "bk_test._bk_iam_env_");
        assert!(format!("{}.tz", env_namespace("bk_test")).ends_with(IAM_ENV_TZ_SUFFIX));
    }

    #[test]
    fn test_request_deserializes_from_wire_shape() {
        let req: Request = serde_json::from_str(
            r#"{
                "system": "bk_test",
                "subject": {"type": "user", "id": "admin"},
                "action": {"id": "edit"},
                "resources": [
                    {"system": "bk_test", "type": "job", "id": "1",
                     "attribute": {"_bk_iam_path_": "/biz,1/", "level": 2}}
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(req.subject.kind, "user");
        assert!(req.action.attribute.is_none());
        assert_eq!(req.resources[0].namespace(), "bk_test.job");
        assert_eq!(
            req.resources[0].attribute.get(IAM_PATH),
            Some(&AttrValue::from("/biz,1/"))
        );
    }
}
