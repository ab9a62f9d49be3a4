//! Request-scoped identity for Rowguard.
//!
//! Provides:
//! - [`AuthenticatedUser`]: the user an upstream authenticator placed in request extensions
//! - [`IdentityResolver`] / [`ExtensionIdentityResolver`]: request → acting identity
//! - [`AccessContextLayer`] / [`AccessContextService`]: Tower middleware scoping each request
//! - [`error_response`]: JSON rendering of access-control errors

#![doc = include_str!("../README.md")]

mod middleware;
mod resolver;
mod response;
mod user;

pub use middleware::{AccessContextLayer, AccessContextService};
pub use resolver::{ExtensionIdentityResolver, IdentityResolver};
pub use response::{error_response, status_for};
pub use user::{AuthenticatedUser, user_from_parts};
