//! Error types for rowguard-core.
//!
//! A single error enum is shared by every Rowguard library crate. The
//! access-control faults (`BadManager`, `AccessData`, `AccessDenied`,
//! `FormFieldPolicy`) are never retried: they signal a wiring mistake, a
//! corrupted cache, or a genuine denial, and surface straight to the caller.

use std::path::{Path, PathBuf};

use crate::identity::Identity;
use crate::ids::RecordId;

/// Result type alias for Rowguard operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in Rowguard.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// A controlled entity was written through a path that is not wired to
    /// the query filter and reconciliation.
    #[error("entity type '{entity_type}' is not wired to an access-control manager")]
    BadManager {
        /// Entity type that was written.
        entity_type: String,
    },

    /// A record is cached as RESTRICTED but carries no allow-list.
    #[error("restricted record {entity_type}#{id} has no permitted users cached")]
    AccessData {
        /// Entity type of the broken record.
        entity_type: String,
        /// Record id.
        id: RecordId,
    },

    /// The acting identity failed the access check for a mutating operation.
    #[error("access denied to {entity_type}#{id} for {identity}")]
    AccessDenied {
        /// Entity type of the protected record.
        entity_type: String,
        /// Record id.
        id: RecordId,
        /// Identity that was refused.
        identity: Identity,
    },

    /// A form field has no declared way to rebuild its candidate set.
    #[error("form '{form}' field '{field}' has no declared candidate source")]
    FormFieldPolicy {
        /// Form name.
        form: String,
        /// Field name.
        field: String,
    },

    /// The schema does not declare this entity type.
    #[error("unknown entity type: {0}")]
    UnknownEntityType(String),

    /// The entity type does not declare this field.
    #[error("unknown field '{field}' on {entity_type}")]
    UnknownField {
        /// Entity type.
        entity_type: String,
        /// Field name.
        field: String,
    },

    /// Attempt to set a derived, read-only field through a general update path.
    #[error("field '{0}' is read-only and can only change through reconciliation")]
    ReadOnlyField(String),

    /// Record does not exist in the store.
    #[error("record not found: {entity_type}#{id}")]
    NotFound {
        /// Entity type.
        entity_type: String,
        /// Record id.
        id: RecordId,
    },

    /// Operation requires the super identity to be established.
    #[error("operation '{0}' requires the super identity")]
    PrivilegeRequired(&'static str),

    /// Members of a custom-through relation are managed through its association records.
    #[error("field '{field}' on {entity_type} uses a custom association; save association records instead")]
    CustomThrough {
        /// Owning entity type.
        entity_type: String,
        /// Relation field.
        field: String,
    },

    /// Schema declaration is inconsistent.
    #[error("Schema error: {message}")]
    Schema {
        /// What is wrong with the declaration.
        message: String,
    },

    /// Configuration error.
    #[error("Configuration error: {message}")]
    Config {
        /// What configuration is problematic.
        message: String,
    },

    /// Encoded allow-list is malformed.
    #[error("invalid allow-list encoding: {0:?}")]
    InvalidAllowList(String),

    /// I/O error, optionally tied to a path.
    #[error("I/O error{}: {source}", .path.as_ref().map(|p| format!(" at {}", p.display())).unwrap_or_default())]
    Io {
        /// Underlying error.
        #[source]
        source: std::io::Error,
        /// Path being accessed, if known.
        path: Option<PathBuf>,
    },

    /// JSON serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<std::io::Error> for Error {
    fn from(source: std::io::Error) -> Self {
        Error::Io { source, path: None }
    }
}

impl Error {
    /// Returns whether this error signals a programming or configuration fault
    /// rather than a genuine access decision.
    pub fn is_fault(&self) -> bool {
        !matches!(self, Error::AccessDenied { .. } | Error::NotFound { .. })
    }

    /// Creates a new bad-manager fault.
    pub fn bad_manager<S: Into<String>>(entity_type: S) -> Self {
        Error::BadManager {
            entity_type: entity_type.into(),
        }
    }

    /// Creates a new schema error.
    pub fn schema<S: Into<String>>(message: S) -> Self {
        Error::Schema {
            message: message.into(),
        }
    }

    /// Creates a new configuration error.
    pub fn config<S: Into<String>>(message: S) -> Self {
        Error::Config {
            message: message.into(),
        }
    }

    /// Creates an I/O error carrying the path that failed.
    pub fn io_with_path(source: std::io::Error, path: impl AsRef<Path>) -> Self {
        Error::Io {
            source,
            path: Some(path.as_ref().to_path_buf()),
        }
    }

    /// Creates an unknown-field error.
    pub fn unknown_field(entity_type: impl Into<String>, field: impl Into<String>) -> Self {
        Error::UnknownField {
            entity_type: entity_type.into(),
            field: field.into(),
        }
    }

    /// Creates a not-found error.
    pub fn not_found(entity_type: impl Into<String>, id: RecordId) -> Self {
        Error::NotFound {
            entity_type: entity_type.into(),
            id,
        }
    }
}
