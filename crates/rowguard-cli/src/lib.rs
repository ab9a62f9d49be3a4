//! # rowguard-cli
//!
//! Admin CLI for Rowguard:
//! - `reset`: recompute cached access fields over a JSON snapshot
//! - `list`: show what a given identity can see
//! - `config`: inspect the resolved configuration

#![warn(missing_docs)]
#![warn(clippy::all)]
#![forbid(unsafe_code)]

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;

pub use config::CliConfig;
pub use error::{Error, Result};
