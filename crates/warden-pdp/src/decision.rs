//! Decision outcome.

use serde::{Deserialize, Serialize};

/// Why a request was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    /// The subject is unknown; treated as having no permissions.
    SubjectNotFound,
    /// The subject holds no policy for the action.
    NoPolicies,
    /// Policies exist but none holds for these resources.
    NoPolicyMatched,
}

/// The outcome of [`Pdp::eval`](crate::Pdp::eval).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum Decision {
    /// `policy_id` is the ABAC policy that passed; `None` for an RBAC grant.
    Allowed { policy_id: Option<i64> },
    Denied { reason: DenyReason },
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed { .. })
    }

    pub(crate) fn denied(reason: DenyReason) -> Self {
        Self::Denied { reason }
    }
}
