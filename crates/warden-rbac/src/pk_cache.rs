//! Resource-type pk resolution.

use std::sync::Arc;
use std::time::Duration;

use moka::sync::Cache;
use tracing::debug;
use warden_types::SourceError;

/// Resolves a `(system, type)` pair to its stable integer key.
pub trait ResourceTypeResolver: Send + Sync {
    fn resource_type_pk(&self, system: &str, kind: &str) -> Result<i64, SourceError>;
}

/// TTL cache in front of a [`ResourceTypeResolver`].
///
/// Only successful lookups are cached; a `NotFound` is asked again on the
/// next call.
#[derive(Clone)]
pub struct ResourceTypePkCache {
    resolver: Arc<dyn ResourceTypeResolver>,
    cache: Cache<(String, String), i64>,
}

impl ResourceTypePkCache {
    pub fn new(resolver: Arc<dyn ResourceTypeResolver>, ttl: Duration, capacity: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(capacity)
            .time_to_live(ttl)
            .build();
        Self { resolver, cache }
    }

    /// Creates a cache with the default 30 minute TTL.
    pub fn with_defaults(resolver: Arc<dyn ResourceTypeResolver>) -> Self {
        Self::new(resolver, Duration::from_secs(1800), 1000)
    }
}

impl ResourceTypeResolver for ResourceTypePkCache {
    fn resource_type_pk(&self, system: &str, kind: &str) -> Result<i64, SourceError> {
        let key = (system.to_string(), kind.to_string());
        if let Some(pk) = self.cache.get(&key) {
            return Ok(pk);
        }

        let pk = self.resolver.resource_type_pk(system, kind)?;
        debug!(system = %system, resource_type = %kind, pk, "resource type pk resolved");
        self.cache.insert(key, pk);
        Ok(pk)
    }
}

impl std::fmt::Debug for ResourceTypePkCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceTypePkCache")
            .field("entries", &self.cache.entry_count())
            .finish_non_exhaustive()
    }
}
