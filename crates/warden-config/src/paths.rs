//! Where configuration files live.
//!
//! Three files are read, lowest precedence first: the per-user file under the
//! XDG config dir, then `warden.toml` and `warden.local.toml` in the project
//! directory. Missing files are skipped.

use std::path::{Path, PathBuf};

use directories::ProjectDirs;

use crate::ConfigError;

pub const PROJECT_CONFIG_FILE: &str = "warden.toml";

/// Untracked overrides next to [`PROJECT_CONFIG_FILE`].
pub const LOCAL_CONFIG_FILE: &str = "warden.local.toml";

const USER_CONFIG_FILE: &str = "config.toml";

/// Resolved config file locations for one project directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paths {
    user: Option<PathBuf>,
    project_dir: PathBuf,
}

impl Paths {
    pub fn new(project_dir: impl AsRef<Path>) -> Self {
        let user = ProjectDirs::from("com", "Warden", "warden")
            .map(|dirs| dirs.config_dir().join(USER_CONFIG_FILE));
        Self {
            user,
            project_dir: project_dir.as_ref().to_path_buf(),
        }
    }

    /// `~/.config/warden/config.toml` on Linux.
    pub fn user_config_file(&self) -> Result<&Path, ConfigError> {
        self.user.as_deref().ok_or(ConfigError::NoUserConfigDir)
    }

    pub fn project_config_file(&self) -> PathBuf {
        self.project_dir.join(PROJECT_CONFIG_FILE)
    }

    pub fn local_config_file(&self) -> PathBuf {
        self.project_dir.join(LOCAL_CONFIG_FILE)
    }

    /// Files to layer, lowest precedence first.
    pub fn layers(&self, with_user: bool) -> Vec<PathBuf> {
        let user = self.user.iter().filter(|_| with_user).cloned();
        user.chain([self.project_config_file(), self.local_config_file()])
            .collect()
    }
}
