//! Group authorization lookups.

use std::collections::HashMap;

use warden_types::SourceError;

/// Precomputed index of the groups authorized for an action on a resource
/// instance. May be stale.
pub trait GroupAuthorizationCache: Send + Sync {
    fn authorized_group_pks(
        &self,
        system: &str,
        action_pk: i64,
        action_resource_type_pk: i64,
        resource_type_pk: i64,
        resource_id: &str,
    ) -> Result<Vec<i64>, SourceError>;
}

/// Source of truth for group authorizations on a resource instance.
pub trait GroupAuthorizationService: Send + Sync {
    /// Maps each authorized group pk to the action pks it is granted.
    fn authorized_group_actions(
        &self,
        system: &str,
        action_resource_type_pk: i64,
        resource_type_pk: i64,
        resource_id: &str,
    ) -> Result<HashMap<i64, Vec<i64>>, SourceError>;
}
