//! JSON snapshots of a whole store.
//!
//! A snapshot carries the schema, every record with its persisted cache
//! fields, and the rows of auto-through user collections. Custom-through
//! collections need no rows of their own: they are derived from their
//! association records.

use rowguard_core::{Error, RecordId, Result, UserId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

use crate::memory::{InMemoryStore, State, check_values};
use crate::record::Record;
use crate::schema::{Schema, Through};
use crate::traits::Store;

/// Members of one auto-through collection.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberRow {
    /// Owning entity type.
    pub entity_type: String,
    /// Owning record id.
    pub id: RecordId,
    /// Collection field.
    pub field: String,
    /// Member users.
    pub users: BTreeSet<UserId>,
}

/// Serializable store contents.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Entity declarations.
    pub schema: Schema,
    /// Records in any order.
    #[serde(default)]
    pub records: Vec<Record>,
    /// Auto-through collection rows.
    #[serde(default)]
    pub members: Vec<MemberRow>,
}

impl Snapshot {
    /// Parses a JSON snapshot.
    pub fn from_json_str(s: &str) -> Result<Self> {
        Ok(serde_json::from_str(s)?)
    }

    /// Reads a JSON snapshot file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| Error::io_with_path(e, path))?;
        Self::from_json_str(&content)
    }

    /// Pretty-printed JSON.
    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Writes the snapshot as pretty-printed JSON.
    pub fn write_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        std::fs::write(path, self.to_json_string()?).map_err(|e| Error::io_with_path(e, path))
    }
}

impl InMemoryStore {
    /// Loads a store from a snapshot, keeping persisted cache fields as-is.
    ///
    /// # Errors
    ///
    /// Schema errors for invalid declarations, records of unknown types or
    /// with undeclared fields, duplicate ids, and member rows that do not
    /// name an existing owner's auto-through collection.
    pub fn from_snapshot(snapshot: Snapshot) -> Result<Self> {
        let Snapshot {
            schema,
            records,
            members,
        } = snapshot;
        schema.validate()?;

        let mut state = State::default();
        for record in records {
            let entity = schema.require(record.entity_type())?;
            check_values(entity, &record)?;
            let table = state.tables.entry(entity.name.clone()).or_default();
            let id = record.id();
            if table.rows.insert(id, record).is_some() {
                return Err(Error::schema(format!(
                    "duplicate record {}#{id} in snapshot",
                    entity.name
                )));
            }
            table.next_id = table.next_id.max(id.next());
        }

        for row in members {
            let entity = schema.require(&row.entity_type)?;
            if *entity.require_collection(&row.field)? != Through::Auto {
                return Err(Error::CustomThrough {
                    entity_type: row.entity_type,
                    field: row.field,
                });
            }
            let owner_exists = state
                .tables
                .get(&row.entity_type)
                .is_some_and(|table| table.rows.contains_key(&row.id));
            if !owner_exists {
                return Err(Error::not_found(row.entity_type, row.id));
            }
            state
                .members
                .entry((row.entity_type, row.field, row.id))
                .or_default()
                .extend(row.users);
        }

        log::debug!(
            "Loaded snapshot with {} entity type(s)",
            schema.entities().count()
        );
        Ok(Self::from_parts(schema, state))
    }

    /// Captures the current contents.
    pub fn snapshot(&self) -> Snapshot {
        let state = self.read();
        let records = state
            .tables
            .values()
            .flat_map(|table| table.rows.values().cloned())
            .collect();
        let members = state
            .members
            .iter()
            .filter(|(_, users)| !users.is_empty())
            .map(|((entity_type, field, id), users)| MemberRow {
                entity_type: entity_type.clone(),
                id: *id,
                field: field.clone(),
                users: users.clone(),
            })
            .collect();
        Snapshot {
            schema: self.schema().clone(),
            records,
            members,
        }
    }
}
