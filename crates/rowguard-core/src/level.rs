//! Visibility levels a controlled record can be cached at.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};

/// Visibility level of a controlled record.
///
/// Stored in the `access_level_cache` column using the lowercase names
/// returned by [`AccessLevel::as_str`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessLevel {
    /// Anyone, including anonymous callers.
    Public,
    /// Any authenticated user.
    #[default]
    Authorized,
    /// Only the users in the record's allow-list.
    Restricted,
}

impl AccessLevel {
    /// All levels, in increasing order of restriction.
    pub const ALL: [AccessLevel; 3] = [Self::Public, Self::Authorized, Self::Restricted];

    /// Stored column value.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Authorized => "authorized",
            Self::Restricted => "restricted",
        }
    }

    /// Human-readable label, suitable for choice lists.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Public => "Public access",
            Self::Authorized => "Authorized users only",
            Self::Restricted => "Selected users only (restricted)",
        }
    }
}

impl fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AccessLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "public" => Ok(Self::Public),
            "authorized" => Ok(Self::Authorized),
            "restricted" => Ok(Self::Restricted),
            other => Err(Error::schema(format!("unknown access level '{other}'"))),
        }
    }
}
