//! Command-line surface.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Rowguard - row-level access control administration
#[derive(Parser, Debug)]
#[command(name = "rowguard")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Configuration file path
    #[arg(short, long, global = true, env = "ROWGUARD_CONFIG")]
    pub config: Option<PathBuf>,

    /// Subcommand
    #[command(subcommand)]
    pub command: Command,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Recompute the cached access fields of stored records
    Reset {
        /// JSON snapshot holding schema, records and members
        #[arg(long)]
        data: PathBuf,
        /// Only types with this application label
        #[arg(long)]
        app_label: Option<String>,
        /// Only these entity types (repeatable)
        #[arg(long = "entity-type")]
        entity_types: Vec<String>,
        /// Report changes without writing the snapshot back
        #[arg(long)]
        dry_run: bool,
    },
    /// List the records an identity can see
    List {
        /// JSON snapshot holding schema, records and members
        #[arg(long)]
        data: PathBuf,
        /// Entity type to list
        #[arg(long = "entity-type")]
        entity_type: String,
        /// Identity: super, anonymous, user:<id>, or a raw id
        #[arg(long = "as", default_value = "super", allow_hyphen_values = true)]
        identity: String,
    },
    /// Configuration helpers
    Config {
        /// Action
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// `config` subcommands.
#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigAction {
    /// Print the resolved config file path
    Path,
    /// Print the effective configuration
    Show,
}
