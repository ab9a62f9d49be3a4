//! Rowguard Core: identities, the acting-identity context, access levels,
//! allow-list encoding, configuration, and the shared error type.
//!
//! This crate has no internal Rowguard dependencies (dependency level 0).
//!
//! # Modules
//!
//! - [`context`]: Task-local acting identity with nested scopes
//! - [`config`]: Identity marker configuration
//! - [`allow_list`]: `:id:`-delimited allow-list encoding
//! - [`error`]: Error types and Result alias

#![doc = include_str!("../README.md")]
#![forbid(unsafe_code)]

pub mod allow_list;
pub mod config;
pub mod context;
pub mod error;
pub mod identity;
pub mod ids;
pub mod level;

mod proptests;

// Re-export key types at crate root for convenience
pub use allow_list::AllowList;
pub use config::AccessConfig;
pub use error::{Error, Result};
pub use identity::Identity;
pub use ids::{RecordId, UserId};
pub use level::AccessLevel;
