//! Time-derived environment attributes.
//!
//! Policies may constrain the wall-clock time of a request through keys in
//! the `{system}._bk_iam_env_` namespace. The values only depend on the
//! timezone and the unix second, so they are computed once per second and
//! shared between the requests evaluated in it.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Timelike, Utc};
use chrono_tz::Tz;
use moka::sync::Cache;
use tracing::debug;
use warden_types::Attribute;

use crate::error::{AbacError, Result};

/// Default lifetime of a cached entry.
pub const DEFAULT_TIME_ENV_TTL: Duration = Duration::from_secs(10);

const DEFAULT_CAPACITY: u64 = 1024;

/// Short-lived cache of `{tz, hms}` attribute bags keyed by timezone and second.
#[derive(Clone)]
pub struct TimeEnvCache {
    cache: Cache<String, Arc<Attribute>>,
}

impl TimeEnvCache {
    pub fn new(ttl: Duration, capacity: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(capacity)
            .time_to_live(ttl)
            .build();
        Self { cache }
    }

    /// Returns the environment bag for `tz` at `now`, computing it on a miss.
    pub fn get(&self, tz: &str, now: DateTime<Utc>) -> Result<Arc<Attribute>> {
        let key = format!("{tz}{}", now.timestamp());

        if let Some(envs) = self.cache.get(&key) {
            return Ok(envs);
        }

        let envs = Arc::new(time_envs(tz, now)?);
        debug!(tz = %tz, key = %key, "time envs computed");
        self.cache.insert(key, Arc::clone(&envs));
        Ok(envs)
    }
}

impl Default for TimeEnvCache {
    fn default() -> Self {
        Self::new(DEFAULT_TIME_ENV_TTL, DEFAULT_CAPACITY)
    }
}

impl std::fmt::Debug for TimeEnvCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimeEnvCache")
            .field("entries", &self.cache.entry_count())
            .finish()
    }
}

/// Computes `{tz, hms}` where `hms = 10000*hour + 100*minute + second` in `tz`.
///
/// 08:30:20 becomes `83020`; 10:41:21 becomes `104121`.
pub fn time_envs(tz: &str, now: DateTime<Utc>) -> Result<Attribute> {
    let zone: Tz = tz
        .parse()
        .map_err(|_| AbacError::InvalidTimezone { tz: tz.to_string() })?;
    let local = now.with_timezone(&zone);
    let hms = i64::from(10_000 * local.hour() + 100 * local.minute() + local.second());

    Ok(Attribute::new().with("tz", tz).with("hms", hms))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use warden_types::AttrValue;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, h, m, s).unwrap()
    }

    #[test]
    fn test_hms_is_computed_in_the_timezone() {
        // 00:30:20 UTC is 08:30:20 in Shanghai
        let envs = time_envs("Asia/Shanghai", at(0, 30, 20)).unwrap();
        assert_eq!(envs.get("hms"), Some(&AttrValue::Int(83_020)));
        assert_eq!(envs.get("tz"), Some(&AttrValue::from("Asia/Shanghai")));

        let envs = time_envs("UTC", at(10, 41, 21)).unwrap();
        assert_eq!(envs.get("hms"), Some(&AttrValue::Int(104_121)));
    }

    #[test]
    fn test_unknown_timezone() {
        let err = time_envs("Mars/Olympus", at(0, 0, 0)).unwrap_err();
        assert_eq!(
            err,
            AbacError::InvalidTimezone {
                tz: "Mars/Olympus".to_string()
            }
        );
    }

    #[test]
    fn test_same_second_hits_the_cache() {
        let cache = TimeEnvCache::default();
        let now = at(1, 2, 3);

        let first = cache.get("Asia/Shanghai", now).unwrap();
        let second = cache.get("Asia/Shanghai", now).unwrap();
        assert!(Arc::ptr_eq(&first, &second), "second call must be served from cache");

        let later = cache.get("Asia/Shanghai", at(1, 2, 4)).unwrap();
        assert!(!Arc::ptr_eq(&first, &later));
        assert_ne!(first.get("hms"), later.get("hms"));
    }

    #[test]
    fn test_errors_are_not_cached() {
        let cache = TimeEnvCache::default();
        assert!(cache.get("Nowhere/Zone", at(0, 0, 0)).is_err());
        assert!(cache.get("Nowhere/Zone", at(0, 0, 0)).is_err());
    }
}
