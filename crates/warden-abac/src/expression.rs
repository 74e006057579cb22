//! Process-wide cache of parsed policy expressions.

use std::sync::Arc;
use std::time::Duration;

use moka::sync::Cache;

use crate::condition::Condition;
use crate::error::Result;

/// Parsed condition trees keyed by expression signature.
///
/// The signature is a content hash supplied with the policy. An empty
/// signature falls back to a BLAKE3 hash of the expression text so distinct
/// unsigned expressions never share an entry. Parse failures are not cached.
#[derive(Clone)]
pub struct ExpressionCache {
    cache: Cache<String, Arc<Condition>>,
}

impl ExpressionCache {
    pub fn new(ttl: Duration, capacity: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(capacity)
            .time_to_live(ttl)
            .build();
        Self { cache }
    }

    /// Returns the parsed tree for `expression`, parsing it on a miss.
    pub fn get(&self, expression: &str, signature: &str) -> Result<Arc<Condition>> {
        let key = if signature.is_empty() {
            blake3::hash(expression.as_bytes()).to_hex().to_string()
        } else {
            signature.to_string()
        };

        if let Some(condition) = self.cache.get(&key) {
            return Ok(condition);
        }

        let condition = Arc::new(Condition::from_policy_expression(expression)?);
        self.cache.insert(key, Arc::clone(&condition));
        Ok(condition)
    }

    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }
}

impl Default for ExpressionCache {
    fn default() -> Self {
        Self::new(Duration::from_secs(600), 10_000)
    }
}

impl std::fmt::Debug for ExpressionCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExpressionCache")
            .field("entries", &self.cache.entry_count())
            .finish()
    }
}
