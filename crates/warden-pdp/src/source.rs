//! Collaborator seams: where the pipeline gets actions, subjects, policies
//! and remote attributes from.
//!
//! Implementations own their own caching; the pipeline passes
//! `without_cache` through where a source supports bypassing it.

use warden_types::{
    Action, ActionAttribute, Attribute, AuthPolicy, SourceError, Subject, SubjectAttribute,
};

/// Policy information point for actions.
pub trait ActionDetailSource: Send + Sync {
    /// Returns `SourceError::NotFound` for an unknown action.
    fn action_detail(&self, system: &str, action_id: &str) -> Result<ActionAttribute, SourceError>;
}

/// Policy information point for subjects.
pub trait SubjectDetailSource: Send + Sync {
    /// Returns `SourceError::NotFound` for an unknown subject.
    fn subject_detail(
        &self,
        subject_type: &str,
        subject_id: &str,
    ) -> Result<SubjectAttribute, SourceError>;
}

/// Policy retrieval point.
pub trait PolicySource: Send + Sync {
    /// Groups whose membership is still valid at `now` (unix seconds).
    fn effect_group_pks(
        &self,
        _system: &str,
        subject: &Subject,
        now: i64,
    ) -> Result<Vec<i64>, SourceError> {
        Ok(subject.effect_group_pks(now))
    }

    /// Splits `group_pks` into `(abac, rbac)` by how each group was granted
    /// in `system`.
    fn split_group_pks(
        &self,
        system: &str,
        group_pks: &[i64],
    ) -> Result<(Vec<i64>, Vec<i64>), SourceError>;

    /// Unexpired policies of the subject, its departments and `group_pks`
    /// for the action.
    fn list_policies(
        &self,
        system: &str,
        subject: &Subject,
        action: &Action,
        group_pks: &[i64],
        without_cache: bool,
    ) -> Result<Vec<AuthPolicy>, SourceError>;
}

/// Attribute lookups for resources owned by other systems.
pub trait RemoteResourceSource: Send + Sync {
    /// Attributes of one instance, restricted to `keys`.
    fn query_attributes(
        &self,
        system: &str,
        kind: &str,
        id: &str,
        keys: &[String],
    ) -> Result<Attribute, SourceError>;

    /// Attributes of many instances; each bag carries its own `id`.
    fn batch_query_attributes(
        &self,
        system: &str,
        kind: &str,
        ids: &[String],
        keys: &[String],
    ) -> Result<Vec<Attribute>, SourceError>;
}
