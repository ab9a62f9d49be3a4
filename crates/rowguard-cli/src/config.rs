//! CLI configuration file.
//!
//! ```toml
//! [access]
//! super_user_id = -1
//! anonymous_user_id = -2
//!
//! [logging]
//! level = "info"
//! ```
//!
//! Read from `--config` when given, otherwise from
//! `<config_dir>/rowguard/config.toml`; a missing default file means defaults.
//! `ROWGUARD_*` environment variables override the `[access]` table.

use rowguard_core::AccessConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Logging section.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive; `RUST_LOG` takes precedence.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}

/// Everything the `rowguard` binary reads from its config file.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Identity markers.
    pub access: AccessConfig,
    /// Log output.
    pub logging: LoggingConfig,
}

impl CliConfig {
    /// `<config_dir>/rowguard/config.toml`, if the platform has a config dir.
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("rowguard").join("config.toml"))
    }

    /// The explicit path, or the default one.
    pub fn resolve_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
        explicit
            .map(Path::to_path_buf)
            .or_else(Self::default_config_path)
    }

    /// Parses a TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(s).map_err(|e| Error::Config(format!("invalid config: {e}")))?;
        config.access.validate()?;
        Ok(config)
    }

    /// Pretty TOML rendering.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))
    }

    /// Loads the configuration without environment overrides.
    ///
    /// An explicit path must exist; a missing default file yields defaults.
    pub fn load_file(explicit: Option<&Path>) -> Result<Self> {
        let Some(path) = Self::resolve_config_path(explicit) else {
            return Ok(Self::default());
        };
        if !path.exists() {
            if explicit.is_some() {
                return Err(Error::Config(format!(
                    "config file not found: {}",
                    path.display()
                )));
            }
            log::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&path)
            .map_err(|e| rowguard_core::Error::io_with_path(e, &path))?;
        Self::from_toml_str(&content)
    }

    /// Loads the configuration and applies `ROWGUARD_*` overrides.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut config = Self::load_file(explicit)?;
        config.access = config.access.with_env_overrides()?;
        Ok(config)
    }
}
