//! Acting-identity context.
//!
//! The acting identity lives in a task-local slot. It is visible only to the
//! task (or, for synchronous code, the thread) that installed it; spawned
//! tasks and threads start without one. Scopes nest: leaving an inner scope
//! restores the immediately enclosing identity, on normal return, on an
//! `Err` result, and on unwind alike.
//!
//! # Example
//!
//! ```rust
//! use rowguard_core::context::{current_identity, with_identity};
//! use rowguard_core::Identity;
//!
//! with_identity(Identity::user(1), || {
//!     with_identity(Identity::user(2), || {
//!         assert_eq!(current_identity(), Identity::user(2));
//!     });
//!     assert_eq!(current_identity(), Identity::user(1));
//! });
//! ```

use std::future::Future;

use crate::config::config;
use crate::identity::Identity;

tokio::task_local! {
    static ACTING_IDENTITY: Identity;
}

/// Identity installed by the innermost enclosing scope, if any.
pub fn established_identity() -> Option<Identity> {
    ACTING_IDENTITY.try_with(|identity| *identity).ok()
}

/// The acting identity, falling back to the configured default outside any scope.
pub fn current_identity() -> Identity {
    established_identity().unwrap_or_else(|| config().default_identity())
}

/// Runs `f` with `identity` installed, restoring the previous identity afterwards.
pub fn with_identity<F, R>(identity: Identity, f: F) -> R
where
    F: FnOnce() -> R,
{
    ACTING_IDENTITY.sync_scope(identity, f)
}

/// Runs `f` with full visibility.
pub fn with_super_identity<F, R>(f: F) -> R
where
    F: FnOnce() -> R,
{
    with_identity(Identity::Super, f)
}

/// Drives `future` to completion with `identity` installed on every poll.
pub async fn scope_identity<F>(identity: Identity, future: F) -> F::Output
where
    F: Future,
{
    ACTING_IDENTITY.scope(identity, future).await
}

/// Wraps `f` so that every call runs under `identity`.
///
/// # Example
///
/// ```rust
/// use rowguard_core::context::{acting_as, current_identity};
/// use rowguard_core::Identity;
///
/// let wrapped = acting_as(Identity::Super, current_identity);
/// assert_eq!(wrapped(), Identity::Super);
/// ```
pub fn acting_as<F, R>(identity: Identity, f: F) -> impl Fn() -> R
where
    F: Fn() -> R,
{
    move || with_identity(identity, &f)
}
