//! Errors raised while parsing and evaluating policy conditions.

use thiserror::Error;

/// Error type for ABAC evaluation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AbacError {
    /// The policy expression is not valid JSON or has the wrong shape.
    #[error("policy expression parse failed: {reason}")]
    Parse { reason: String },

    /// The expression names an operator the evaluator does not implement.
    #[error("unsupported operator {operator}")]
    UnknownOperator { operator: String },

    /// The action binds resource types but the request carries no resource.
    #[error("action {action} requires resources but none were supplied")]
    MissingResource { action: String },

    /// An environment timezone could not be loaded.
    #[error("invalid timezone {tz}")]
    InvalidTimezone { tz: String },

    /// The environment leaves of a policy are malformed.
    #[error("environment format error: {reason}")]
    EnvironmentFormat { reason: String },

    /// A residual condition could not be rendered as a filter expression.
    #[error("translate failed: {reason}")]
    Translate { reason: String },
}

impl AbacError {
    pub(crate) fn parse(reason: impl Into<String>) -> Self {
        Self::Parse {
            reason: reason.into(),
        }
    }

    pub(crate) fn translate(reason: impl Into<String>) -> Self {
        Self::Translate {
            reason: reason.into(),
        }
    }
}

/// Result type for ABAC operations.
pub type Result<T> = std::result::Result<T, AbacError>;
