//! Pipeline errors.
//!
//! A denial is not an error: "subject not found" and "no policy matched"
//! come back as [`Decision::Denied`](crate::Decision). Errors mean the
//! decision could not be made and must not be read as "allowed".

use thiserror::Error;
use warden_abac::AbacError;
use warden_rbac::RbacError;
use warden_types::SourceError;

/// Error type for the decision pipeline.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PdpError {
    /// The action does not exist in the system.
    #[error("action {action} is invalid for system {system}")]
    InvalidAction { system: String, action: String },

    /// The request resources do not match the action's resource types.
    #[error("request resources do not match action {action} of system {system}")]
    InvalidActionResource { system: String, action: String },

    /// The subject does not exist.
    #[error("subject {subject_type}:{subject_id} does not exist")]
    SubjectNotFound {
        subject_type: String,
        subject_id: String,
    },

    /// A collaborator failed.
    #[error("{layer}:{function} {source}")]
    Upstream {
        layer: &'static str,
        function: &'static str,
        #[source]
        source: SourceError,
    },

    /// No policy passed and at least one failed to evaluate.
    #[error("policy evaluation failed: {source}")]
    Evaluation {
        #[source]
        source: AbacError,
    },

    #[error(transparent)]
    Abac(#[from] AbacError),

    #[error(transparent)]
    Rbac(#[from] RbacError),
}

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, PdpError>;

pub(crate) const PDP: &str = "PDP";

pub(crate) fn upstream(function: &'static str) -> impl FnOnce(SourceError) -> PdpError {
    move |source| PdpError::Upstream {
        layer: PDP,
        function,
        source,
    }
}
