//! Change notifications emitted by stores.

use rowguard_core::{RecordId, UserId};
use serde::{Deserialize, Serialize};

use crate::record::Record;

/// What happened to a user collection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MembersAction {
    /// Users were added.
    Add,
    /// Users were removed.
    Remove,
    /// The collection was emptied.
    Clear,
}

/// A completed write, reported to every subscribed listener.
#[derive(Clone, Debug, PartialEq)]
pub enum ChangeEvent {
    /// A record was inserted or fully saved.
    Saved {
        /// Entity type.
        entity_type: String,
        /// Record id.
        id: RecordId,
        /// `true` for inserts.
        created: bool,
        /// The row as it was before a save; `None` for inserts.
        previous: Option<Record>,
    },
    /// A record was deleted. Carries the row as it was before deletion.
    Deleted {
        /// The deleted record.
        record: Record,
    },
    /// Association rows of an auto-through user collection changed.
    MembersChanged {
        /// Owning entity type.
        entity_type: String,
        /// Owning record id.
        id: RecordId,
        /// Collection field.
        field: String,
        /// Kind of change.
        action: MembersAction,
        /// Users named by the change (empty for `Clear`).
        users: Vec<UserId>,
    },
}

impl ChangeEvent {
    /// Entity type the event concerns.
    pub fn entity_type(&self) -> &str {
        match self {
            Self::Saved { entity_type, .. } | Self::MembersChanged { entity_type, .. } => {
                entity_type
            }
            Self::Deleted { record } => record.entity_type(),
        }
    }

    /// Id of the record the event concerns.
    pub fn id(&self) -> RecordId {
        match self {
            Self::Saved { id, .. } | Self::MembersChanged { id, .. } => *id,
            Self::Deleted { record } => record.id(),
        }
    }
}
