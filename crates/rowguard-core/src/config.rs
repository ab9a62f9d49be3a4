//! Process-wide identity markers.
//!
//! Three raw user ids carry special meaning: the super-user marker, the
//! anonymous marker, and the default marker used when no identity has been
//! resolved (the anonymous marker unless overridden). They are configured once
//! at process start with [`install`] and are immutable afterwards.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::OnceLock;

use crate::error::{Error, Result};
use crate::identity::Identity;
use crate::ids::UserId;

/// Environment variable overriding [`AccessConfig::super_user_id`].
pub const ENV_SUPER_USER_ID: &str = "ROWGUARD_SUPER_USER_ID";
/// Environment variable overriding [`AccessConfig::anonymous_user_id`].
pub const ENV_ANONYMOUS_USER_ID: &str = "ROWGUARD_ANONYMOUS_USER_ID";
/// Environment variable overriding [`AccessConfig::default_user_id`].
pub const ENV_DEFAULT_USER_ID: &str = "ROWGUARD_DEFAULT_USER_ID";

static CONFIG: OnceLock<AccessConfig> = OnceLock::new();

/// Identity marker configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessConfig {
    /// Raw id standing for the super identity.
    pub super_user_id: i64,
    /// Raw id standing for the anonymous identity.
    pub anonymous_user_id: i64,
    /// Raw id used when nothing else was resolved. `None` means the anonymous marker.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_user_id: Option<i64>,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            super_user_id: -1,
            anonymous_user_id: -2,
            default_user_id: None,
        }
    }
}

impl AccessConfig {
    /// Parses a TOML document holding the three markers at top level.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(s).map_err(|e| Error::config(format!("invalid access config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| Error::io_with_path(e, path))?;
        Self::from_toml_str(&content)
    }

    /// Applies `ROWGUARD_*` overrides from the process environment.
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Applies overrides from an arbitrary lookup (the environment in production).
    pub fn with_overrides_from<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let parse = |key: &str, value: String| {
            value
                .trim()
                .parse::<i64>()
                .map_err(|_| Error::config(format!("{key} must be an integer, got '{value}'")))
        };
        if let Some(value) = lookup(ENV_SUPER_USER_ID) {
            self.super_user_id = parse(ENV_SUPER_USER_ID, value)?;
        }
        if let Some(value) = lookup(ENV_ANONYMOUS_USER_ID) {
            self.anonymous_user_id = parse(ENV_ANONYMOUS_USER_ID, value)?;
        }
        if let Some(value) = lookup(ENV_DEFAULT_USER_ID) {
            self.default_user_id = Some(parse(ENV_DEFAULT_USER_ID, value)?);
        }
        self.validate()?;
        Ok(self)
    }

    /// Checks that the markers can be told apart.
    pub fn validate(&self) -> Result<()> {
        if self.super_user_id == self.anonymous_user_id {
            return Err(Error::config(format!(
                "super_user_id and anonymous_user_id must differ (both are {})",
                self.super_user_id
            )));
        }
        Ok(())
    }

    /// Raw default marker.
    pub fn default_user_id(&self) -> i64 {
        self.default_user_id.unwrap_or(self.anonymous_user_id)
    }

    /// Maps a raw id to an identity using the markers.
    ///
    /// # Examples
    ///
    /// ```
    /// use rowguard_core::{AccessConfig, Identity};
    ///
    /// let config = AccessConfig::default();
    /// assert_eq!(config.identity_for(-1), Identity::Super);
    /// assert_eq!(config.identity_for(-2), Identity::Anonymous);
    /// assert_eq!(config.identity_for(7), Identity::user(7));
    /// ```
    pub fn identity_for(&self, raw: i64) -> Identity {
        if raw == self.super_user_id {
            Identity::Super
        } else if raw == self.anonymous_user_id {
            Identity::Anonymous
        } else {
            Identity::User(UserId::new(raw))
        }
    }

    /// Maps an identity back to its raw id.
    pub fn raw_id(&self, identity: &Identity) -> i64 {
        match identity {
            Identity::Super => self.super_user_id,
            Identity::Anonymous => self.anonymous_user_id,
            Identity::User(id) => id.get(),
        }
    }

    /// Identity used when none has been resolved.
    pub fn default_identity(&self) -> Identity {
        self.identity_for(self.default_user_id())
    }
}

/// Installs the process-wide configuration.
///
/// Fails when a configuration is already in place, including the implicit
/// defaults fixed by an earlier call to [`config`].
pub fn install(config: AccessConfig) -> Result<()> {
    config.validate()?;
    CONFIG
        .set(config)
        .map_err(|_| Error::config("access configuration is already installed"))?;
    log::debug!("Access configuration installed: {:?}", CONFIG.get());
    Ok(())
}

/// Returns the installed configuration, fixing the defaults on first use.
pub fn config() -> &'static AccessConfig {
    CONFIG.get_or_init(AccessConfig::default)
}
