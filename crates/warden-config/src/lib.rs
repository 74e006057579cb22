//! # warden-config: settings for the Warden decision point
//!
//! [`PdpConfig`] holds the evaluation defaults, cache sizing and the RBAC
//! switch. [`ConfigLoader`] merges, lowest precedence first:
//!
//! 1. built-in defaults
//! 2. the user file, `~/.config/warden/config.toml`
//! 3. `warden.toml` in the project directory
//! 4. `warden.local.toml` next to it
//! 5. `WARDEN_*` environment variables

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

mod error;
mod loader;
mod paths;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use paths::{LOCAL_CONFIG_FILE, PROJECT_CONFIG_FILE, Paths};

/// Main Warden configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PdpConfig {
    pub evaluation: EvaluationConfig,
    pub cache: CacheConfig,
    pub rbac: RbacConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationConfig {
    /// IANA name used only when logging the time environment of a decision.
    ///
    /// Decisions never read it: a policy's `tz` leaf names the zone its
    /// time conditions are evaluated in, and a policy without one sees no
    /// time attributes.
    pub default_timezone: String,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            default_timezone: "Asia/Shanghai".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub expression_capacity: u64,
    pub expression_ttl_secs: u64,
    pub time_env_capacity: u64,
    pub time_env_ttl_secs: u64,
    pub resource_type_pk_capacity: u64,
    pub resource_type_pk_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            expression_capacity: 10_000,
            expression_ttl_secs: 600,
            time_env_capacity: 1024,
            time_env_ttl_secs: 10,
            resource_type_pk_capacity: 1000,
            resource_type_pk_ttl_secs: 1800,
        }
    }
}

impl CacheConfig {
    pub fn expression_ttl(&self) -> Duration {
        Duration::from_secs(self.expression_ttl_secs)
    }

    pub fn time_env_ttl(&self) -> Duration {
        Duration::from_secs(self.time_env_ttl_secs)
    }

    pub fn resource_type_pk_ttl(&self) -> Duration {
        Duration::from_secs(self.resource_type_pk_ttl_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RbacConfig {
    /// When false, RBAC actions are decided by their ABAC policies only.
    pub enabled: bool,
}

impl Default for RbacConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl PdpConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self> {
        ConfigLoader::new().load()
    }

    /// Load configuration from specific project directory
    pub fn load_from_dir(project_dir: impl AsRef<Path>) -> Result<Self> {
        ConfigLoader::new().with_project_dir(project_dir).load()
    }

    /// Parse a single TOML document; missing keys take their defaults.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Render as TOML, e.g. to write a starter `warden.toml`.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Check invariants the type system cannot express
    pub fn validate(&self) -> Result<(), ConfigError> {
        let tz = &self.evaluation.default_timezone;
        if tz.parse::<chrono_tz::Tz>().is_err() {
            return Err(ConfigError::UnknownTimezone { tz: tz.clone() });
        }

        let cache = &self.cache;
        let sizes = [
            ("cache.expression_capacity", cache.expression_capacity),
            ("cache.expression_ttl_secs", cache.expression_ttl_secs),
            ("cache.time_env_capacity", cache.time_env_capacity),
            ("cache.time_env_ttl_secs", cache.time_env_ttl_secs),
            ("cache.resource_type_pk_capacity", cache.resource_type_pk_capacity),
            ("cache.resource_type_pk_ttl_secs", cache.resource_type_pk_ttl_secs),
        ];
        match sizes.into_iter().find(|(_, value)| *value == 0) {
            Some((key, _)) => Err(ConfigError::Zero { key }),
            None => Ok(()),
        }
    }
}
