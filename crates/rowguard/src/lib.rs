//! Rowguard row-level access control, umbrella crate.
//!
//! This crate re-exports all Rowguard components for convenience.
//! Use feature flags to enable specific functionality.

#![doc = include_str!("../README.md")]

pub use rowguard_core as core;
pub use rowguard_storage as storage;

#[cfg(feature = "acl")]
pub use rowguard_acl as acl;

#[cfg(feature = "auth")]
pub use rowguard_auth as auth;

#[cfg(feature = "cli")]
pub use rowguard_cli as cli;

/// The types most applications need.
pub mod prelude {
    pub use rowguard_core::context::{current_identity, scope_identity, with_identity};
    pub use rowguard_core::{AccessLevel, Error, Identity, RecordId, Result, UserId};
    pub use rowguard_storage::{EntitySchema, InMemoryStore, Predicate, Record, Schema, Store};

    #[cfg(feature = "acl")]
    pub use rowguard_acl::{AccessControl, AccessManager, ResetOptions};

    #[cfg(feature = "auth")]
    pub use rowguard_auth::{AccessContextLayer, AuthenticatedUser};
}
