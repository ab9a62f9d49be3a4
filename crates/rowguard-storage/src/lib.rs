//! # rowguard-storage
//!
//! Records, schemas and the store abstraction used by Rowguard.
//!
//! This crate provides:
//! - Entity declarations with the access-control opt-in ([`schema`])
//! - Records carrying cached access fields ([`record`])
//! - Predicate trees that evaluate in memory or render to SQL ([`query`])
//! - The [`Store`] trait and its change events
//! - An in-memory store with JSON snapshots (for tests and tooling)

#![warn(missing_docs)]
#![warn(clippy::all)]
#![forbid(unsafe_code)]

pub mod events;
pub mod memory;
pub mod query;
pub mod record;
pub mod schema;
pub mod snapshot;
pub mod traits;
pub mod value;

pub use events::{ChangeEvent, MembersAction};
pub use memory::InMemoryStore;
pub use query::{Column, Predicate, Query, SqlFragment};
pub use record::{AccessFields, CacheField, Record};
pub use schema::{AccessDeclaration, EntitySchema, FieldDef, FieldKind, LevelSource, Schema, Through};
pub use snapshot::{MemberRow, Snapshot};
pub use traits::{ChangeListener, Store};
pub use value::Value;

#[cfg(test)]
mod proptests;
