//! Error types for rowguard-cli

use thiserror::Error;

/// Result type alias for rowguard-cli operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in rowguard-cli
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Error from the Rowguard libraries
    #[error(transparent)]
    Core(#[from] rowguard_core::Error),

    /// Writing command output failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration file could not be used
    #[error("Configuration error: {0}")]
    Config(String),

    /// An `--as` value that names no identity
    #[error("unrecognised identity '{0}' (expected super, anonymous, user:<id> or a raw id)")]
    Identity(String),
}
