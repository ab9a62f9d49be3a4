//! The acting identity a query or write is evaluated for.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};
use crate::ids::UserId;

/// Who is acting.
///
/// Resolved once per logical operation and installed through
/// [`with_identity`](crate::context::with_identity).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "id")]
pub enum Identity {
    /// Bypasses all filtering.
    Super,
    /// Sees PUBLIC records only.
    Anonymous,
    /// A concrete user.
    User(UserId),
}

impl Identity {
    /// Shorthand for a concrete user identity.
    pub fn user(id: impl Into<UserId>) -> Self {
        Self::User(id.into())
    }

    /// Returns `true` for [`Identity::Super`].
    pub fn is_super(&self) -> bool {
        matches!(self, Self::Super)
    }

    /// Returns `true` for [`Identity::Anonymous`].
    pub fn is_anonymous(&self) -> bool {
        matches!(self, Self::Anonymous)
    }

    /// Returns the concrete user id, if any.
    pub fn user_id(&self) -> Option<UserId> {
        match self {
            Self::User(id) => Some(*id),
            _ => None,
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Super => write!(f, "super"),
            Self::Anonymous => write!(f, "anonymous"),
            Self::User(id) => write!(f, "user:{id}"),
        }
    }
}

impl std::str::FromStr for Identity {
    type Err = Error;

    /// Parses `super`, `anonymous`, or `user:<id>`.
    ///
    /// Raw marker ids are resolved against configuration by
    /// [`AccessConfig::identity_for`](crate::config::AccessConfig::identity_for), not here.
    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "super" => Ok(Self::Super),
            "anonymous" => Ok(Self::Anonymous),
            other => other
                .strip_prefix("user:")
                .and_then(|id| id.parse::<UserId>().ok())
                .map(Self::User)
                .ok_or_else(|| Error::config(format!("unrecognised identity '{other}'"))),
        }
    }
}
