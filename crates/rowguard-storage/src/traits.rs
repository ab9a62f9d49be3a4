//! The persistence collaborator.
//!
//! [`Store`] is everything the access-control layer needs from a backend:
//! filtered reads, writes that report [`ChangeEvent`]s, direct partial
//! updates that bypass those events, and a refresh primitive. Calls are
//! synchronous and run on the caller's thread.

use rowguard_core::{Error, RecordId, Result, UserId};
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::events::ChangeEvent;
use crate::query::Query;
use crate::record::{AccessFields, CacheField, Record};
use crate::schema::Schema;
use crate::value::Value;

/// Receives change notifications after a write has been applied.
///
/// An error returned here aborts the write call that triggered it.
pub trait ChangeListener: Send + Sync {
    /// Handles one event. `store` is the store that emitted it.
    fn on_change(&self, store: &dyn Store, event: &ChangeEvent) -> Result<()>;
}

/// A relational store holding records of the entity types in its schema.
///
/// Stores do not filter reads; the access filter is applied by the caller.
pub trait Store: Send + Sync {
    /// Declarations of every stored entity type.
    fn schema(&self) -> &Schema;

    /// Records of `query.entity_type` matching `query.predicate`, in id order.
    fn fetch(&self, query: &Query) -> Result<Vec<Record>>;

    /// One record by id.
    fn get(&self, entity_type: &str, id: RecordId) -> Result<Option<Record>>;

    /// Inserts a record together with the initial members of its
    /// auto-through collections, assigning its id. Cache fields start at
    /// their defaults. Emits a single [`ChangeEvent::Saved`] with
    /// `created = true` and returns the record as stored after listeners ran.
    fn insert_with_members(&self, record: Record, members: &[(String, Vec<UserId>)])
    -> Result<Record>;

    /// Inserts a record without collection members.
    fn insert(&self, record: Record) -> Result<Record> {
        self.insert_with_members(record, &[])
    }

    /// Saves every attribute of an existing record. Cache fields are not
    /// written. Emits [`ChangeEvent::Saved`].
    fn save(&self, record: &Record) -> Result<()>;

    /// Deletes a record, returning it. Emits [`ChangeEvent::Deleted`].
    fn delete(&self, entity_type: &str, id: RecordId) -> Result<Option<Record>>;

    /// Direct partial update of named attributes. No events; cache columns
    /// are refused.
    fn update_fields(&self, entity_type: &str, id: RecordId, changes: &[(String, Value)])
    -> Result<()>;

    /// Direct partial update of cache columns. No events. Requires the
    /// super identity to be established.
    fn update_access_fields(
        &self,
        entity_type: &str,
        id: RecordId,
        access: &AccessFields,
        fields: &[CacheField],
    ) -> Result<()>;

    /// Current members of a user collection.
    fn members(&self, entity_type: &str, id: RecordId, field: &str) -> Result<BTreeSet<UserId>>;

    /// Adds users to an auto-through collection. Emits
    /// [`ChangeEvent::MembersChanged`].
    fn add_members(
        &self,
        entity_type: &str,
        id: RecordId,
        field: &str,
        users: &[UserId],
    ) -> Result<()>;

    /// Removes users from an auto-through collection. Emits
    /// [`ChangeEvent::MembersChanged`].
    fn remove_members(
        &self,
        entity_type: &str,
        id: RecordId,
        field: &str,
        users: &[UserId],
    ) -> Result<()>;

    /// Empties an auto-through collection. Emits
    /// [`ChangeEvent::MembersChanged`].
    fn clear_members(&self, entity_type: &str, id: RecordId, field: &str) -> Result<()>;

    /// Registers a listener for every subsequent write.
    fn subscribe(&self, listener: Arc<dyn ChangeListener>);

    /// Number of registered listeners.
    fn listener_count(&self) -> usize;

    /// Reloads `record` from the store.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] when the record no longer exists.
    fn refresh(&self, record: &mut Record) -> Result<()> {
        *record = self.require(record.entity_type(), record.id())?;
        Ok(())
    }

    /// One record by id, failing with [`Error::NotFound`].
    fn require(&self, entity_type: &str, id: RecordId) -> Result<Record> {
        self.get(entity_type, id)?
            .ok_or_else(|| Error::not_found(entity_type, id))
    }
}
