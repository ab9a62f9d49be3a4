//! # rowguard-acl
//!
//! The access-control engine: per-type visibility policies, cache
//! reconciliation, the read-side query filter, and the propagation rules
//! that keep cached access fields consistent as related data changes.
//!
//! The usual entry point is [`AccessControl`], which wires a
//! [`Store`](rowguard_storage::Store) to an [`AccessRegistry`] and hands out
//! an [`AccessManager`] per controlled type.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![forbid(unsafe_code)]

pub mod choices;
pub mod control;
pub mod filter;
pub mod maintenance;
pub mod manager;
pub mod policy;
pub mod propagation;
pub mod registry;

pub use choices::{CandidateSource, ChoiceTable};
pub use control::AccessControl;
pub use filter::{access_predicate, apply_access_filter};
pub use maintenance::{ResetOptions, ResetReport};
pub use manager::AccessManager;
pub use policy::{SchemaPolicy, VisibilityPolicy};
pub use propagation::Propagator;
pub use registry::{AccessRegistry, AccessRegistryBuilder, LinkHook};
