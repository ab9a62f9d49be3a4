//! Authenticated user placed in request extensions by an upstream authenticator.

use serde::{Deserialize, Serialize};

/// The user an upstream authentication layer resolved for a request.
///
/// Rowguard does not authenticate anyone; it only reads this value from the
/// request extensions to decide which identity the request acts as.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    /// Raw user id.
    pub user_id: i64,
    /// The user's email address.
    #[serde(default)]
    pub email: String,
    /// Whether the user bypasses row-level filtering.
    #[serde(default)]
    pub is_superuser: bool,
}

impl AuthenticatedUser {
    /// A regular user.
    pub fn new(user_id: i64, email: impl Into<String>) -> Self {
        Self {
            user_id,
            email: email.into(),
            is_superuser: false,
        }
    }

    /// Marks the user as a superuser.
    pub fn superuser(mut self) -> Self {
        self.is_superuser = true;
        self
    }
}

/// Extract the `AuthenticatedUser` from HTTP request `Parts`, if present.
pub fn user_from_parts(parts: &http::request::Parts) -> Option<&AuthenticatedUser> {
    parts.extensions.get::<AuthenticatedUser>()
}
