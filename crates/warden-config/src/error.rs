//! Errors raised while reading or checking a [`PdpConfig`](crate::PdpConfig).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid TOML: {source}")]
    Parse {
        #[from]
        source: toml::de::Error,
    },

    #[error("cannot render config as TOML: {0}")]
    Render(#[from] toml::ser::Error),

    /// `evaluation.default_timezone` is not an IANA zone name.
    #[error("evaluation.default_timezone: unknown timezone `{tz}`")]
    UnknownTimezone { tz: String },

    /// A cache capacity or TTL is zero.
    #[error("{key} must be greater than zero")]
    Zero { key: &'static str },

    /// No home directory to place the user config under.
    #[error("cannot determine the user config directory")]
    NoUserConfigDir,
}
