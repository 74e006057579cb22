//! Layered loading with the `config` crate.

use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat, Map};

use crate::{Paths, PdpConfig};

const ENV_PREFIX: &str = "WARDEN";

/// Builds a [`PdpConfig`] from defaults, files and environment variables.
///
/// Environment variables win over files; nested keys are joined with a
/// double underscore, e.g. `WARDEN_CACHE__EXPRESSION_TTL_SECS=60`.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    project_dir: PathBuf,
    env_prefix: String,
    env_vars: Option<Map<String, String>>,
    user_config: bool,
}

impl ConfigLoader {
    /// Loader rooted at the current directory.
    pub fn new() -> Self {
        Self {
            project_dir: env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            env_prefix: ENV_PREFIX.to_string(),
            env_vars: None,
            user_config: true,
        }
    }

    pub fn with_project_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.project_dir = dir.as_ref().to_path_buf();
        self
    }

    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Reads overrides from `vars` instead of the process environment.
    pub fn with_env_vars(mut self, vars: impl IntoIterator<Item = (String, String)>) -> Self {
        self.env_vars = Some(vars.into_iter().collect());
        self
    }

    pub fn without_user_config(mut self) -> Self {
        self.user_config = false;
        self
    }

    pub fn load(self) -> Result<PdpConfig> {
        let mut builder = Config::builder()
            .add_source(Config::try_from(&PdpConfig::default()).context("encoding defaults")?);

        for path in Paths::new(&self.project_dir).layers(self.user_config) {
            builder = builder.add_source(File::from(path).required(false).format(FileFormat::Toml));
        }

        builder = builder.add_source(
            Environment::with_prefix(&self.env_prefix)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
                .source(self.env_vars),
        );

        let pdp_config: PdpConfig = builder
            .build()
            .and_then(Config::try_deserialize)
            .with_context(|| format!("loading config for {}", self.project_dir.display()))?;

        pdp_config.validate().context("invalid configuration")?;
        Ok(pdp_config)
    }

    /// Like [`ConfigLoader::load`], falling back to defaults on any error.
    pub fn load_or_default(self) -> PdpConfig {
        self.load().unwrap_or_default()
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn loader(dir: &Path) -> ConfigLoader {
        ConfigLoader::new()
            .with_project_dir(dir)
            .without_user_config()
            .with_env_vars(Vec::new())
    }

    #[test]
    fn test_no_files_yields_defaults() {
        let dir = tempdir().unwrap();
        assert_eq!(loader(dir.path()).load().unwrap(), PdpConfig::default());
    }

    #[test]
    fn test_project_file_is_merged_over_defaults() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("warden.toml"),
            r#"
[evaluation]
default_timezone = "UTC"

[cache]
expression_capacity = 500
time_env_ttl_secs = 30
"#,
        )
        .unwrap();

        let config = loader(dir.path()).load().unwrap();
        assert_eq!(config.evaluation.default_timezone, "UTC");
        assert_eq!(config.cache.expression_capacity, 500);
        assert_eq!(config.cache.time_env_ttl_secs, 30);
        assert_eq!(config.cache.expression_ttl_secs, 600);
    }

    #[test]
    fn test_local_file_wins_over_project_file() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("warden.toml"), "[cache]\nexpression_ttl_secs = 120\n").unwrap();
        fs::write(dir.path().join("warden.local.toml"), "[cache]\nexpression_ttl_secs = 5\n")
            .unwrap();

        let config = loader(dir.path()).load().unwrap();
        assert_eq!(config.cache.expression_ttl_secs, 5);
    }

    #[test]
    fn test_env_wins_over_files() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("warden.local.toml"), "[rbac]\nenabled = true\n").unwrap();

        let config = loader(dir.path())
            .with_env_vars([
                ("WARDEN_RBAC__ENABLED".to_string(), "false".to_string()),
                ("WARDEN_CACHE__RESOURCE_TYPE_PK_TTL_SECS".to_string(), "90".to_string()),
                ("OTHER_CACHE__EXPRESSION_TTL_SECS".to_string(), "1".to_string()),
            ])
            .load()
            .unwrap();

        assert!(!config.rbac.enabled);
        assert_eq!(config.cache.resource_type_pk_ttl_secs, 90);
        assert_eq!(config.cache.expression_ttl_secs, 600);
    }

    #[test]
    fn test_custom_env_prefix() {
        let dir = tempdir().unwrap();
        let config = loader(dir.path())
            .with_env_prefix("PDP")
            .with_env_vars([("PDP_CACHE__TIME_ENV_CAPACITY".to_string(), "8".to_string())])
            .load()
            .unwrap();
        assert_eq!(config.cache.time_env_capacity, 8);
    }

    #[test]
    fn test_invalid_values_fail_the_load() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("warden.toml"),
            "[evaluation]\ndefault_timezone = \"Nowhere/Zone\"\n",
        )
        .unwrap();

        let err = loader(dir.path()).load().unwrap_err();
        assert!(format!("{err:#}").contains("Nowhere/Zone"));
        assert_eq!(loader(dir.path()).load_or_default(), PdpConfig::default());
    }
}
