//! The default read/write path for one controlled type.

use rowguard_core::{Error, Identity, RecordId, Result, UserId};
use rowguard_storage::{Predicate, Query, Record, Store};
use std::collections::BTreeSet;

use crate::control::AccessControl;
use crate::filter::{access_predicate, apply_access_filter, resolve_identity};

/// Access-filtered reads and cache-aware writes for one entity type.
///
/// Reads are filtered for the override identity when one was set with
/// [`AccessManager::as_identity`], otherwise for the acting identity.
#[derive(Debug, Clone)]
pub struct AccessManager<'a> {
    control: &'a AccessControl,
    entity_type: String,
    identity: Option<Identity>,
}

impl<'a> AccessManager<'a> {
    pub(crate) fn new(control: &'a AccessControl, entity_type: impl Into<String>) -> Self {
        Self {
            control,
            entity_type: entity_type.into(),
            identity: None,
        }
    }

    /// Entity type this manager serves.
    pub fn entity_type(&self) -> &str {
        &self.entity_type
    }

    /// Filters reads for `identity` instead of the acting identity.
    pub fn as_identity(mut self, identity: Identity) -> Self {
        self.identity = Some(identity);
        self
    }

    fn store(&self) -> &dyn Store {
        self.control.store()
    }

    fn ensure_type(&self, entity_type: &str) -> Result<()> {
        if entity_type == self.entity_type {
            Ok(())
        } else {
            Err(Error::schema(format!(
                "{entity_type} passed to the manager for {}",
                self.entity_type
            )))
        }
    }

    /// Runs `query` through the access filter.
    pub fn fetch(&self, query: Query) -> Result<Vec<Record>> {
        self.ensure_type(&query.entity_type)?;
        self.store()
            .fetch(&apply_access_filter(query, self.identity))
    }

    /// Every visible record.
    pub fn all(&self) -> Result<Vec<Record>> {
        self.fetch(Query::all(&self.entity_type))
    }

    /// Visible records matching `predicate`.
    pub fn filter(&self, predicate: Predicate) -> Result<Vec<Record>> {
        self.fetch(Query::all(&self.entity_type).filter(predicate))
    }

    /// One record, if it exists and is visible.
    pub fn get(&self, id: RecordId) -> Result<Option<Record>> {
        let identity = resolve_identity(self.identity);
        let record = self.store().get(&self.entity_type, id)?;
        Ok(record.filter(|r| access_predicate(&identity).is_none_or(|p| p.matches(r))))
    }

    /// Number of visible records.
    pub fn count(&self) -> Result<usize> {
        Ok(self.all()?.len())
    }

    /// Inserts a record and returns it with fresh cache values.
    pub fn create(&self, record: Record) -> Result<Record> {
        self.create_with_members(record, &[])
    }

    /// Inserts a record with initial collection members.
    pub fn create_with_members(
        &self,
        record: Record,
        members: &[(String, Vec<UserId>)],
    ) -> Result<Record> {
        self.ensure_type(record.entity_type())?;
        self.store().insert_with_members(record, members)
    }

    /// Saves a record and reloads its cache values.
    pub fn save(&self, record: &mut Record) -> Result<()> {
        self.ensure_type(record.entity_type())?;
        self.store().save(record)?;
        self.store().refresh(record)
    }

    /// Deletes a record the acting (or override) identity has access to.
    ///
    /// # Errors
    ///
    /// [`Error::AccessDenied`] when the access check fails, and
    /// [`Error::AccessData`] when the record's cache is broken.
    pub fn delete(&self, id: RecordId) -> Result<Record> {
        let record = self.store().require(&self.entity_type, id)?;
        let identity = resolve_identity(self.identity);
        if !record.check_access(&identity)? {
            return Err(Error::AccessDenied {
                entity_type: self.entity_type.clone(),
                id,
                identity,
            });
        }
        self.store()
            .delete(&self.entity_type, id)?
            .ok_or_else(|| Error::not_found(&self.entity_type, id))
    }

    /// Current members of a collection.
    pub fn members(&self, id: RecordId, field: &str) -> Result<BTreeSet<UserId>> {
        self.store().members(&self.entity_type, id, field)
    }

    /// Adds users to a collection.
    pub fn add_members(&self, id: RecordId, field: &str, users: &[UserId]) -> Result<()> {
        self.store().add_members(&self.entity_type, id, field, users)
    }

    /// Removes users from a collection.
    pub fn remove_members(&self, id: RecordId, field: &str, users: &[UserId]) -> Result<()> {
        self.store().remove_members(&self.entity_type, id, field, users)
    }

    /// Replaces the members of a collection, adding before removing so that
    /// the set is never empty when `users` is not.
    pub fn set_members(&self, id: RecordId, field: &str, users: &[UserId]) -> Result<()> {
        let current = self.members(id, field)?;
        let wanted: BTreeSet<UserId> = users.iter().copied().collect();
        let to_add: Vec<UserId> = wanted.difference(&current).copied().collect();
        let to_remove: Vec<UserId> = current.difference(&wanted).copied().collect();
        if !to_add.is_empty() {
            self.add_members(id, field, &to_add)?;
        }
        if !to_remove.is_empty() {
            self.remove_members(id, field, &to_remove)?;
        }
        Ok(())
    }
}
