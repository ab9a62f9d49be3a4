//! In-memory [`Store`] implementation.
//!
//! Tables are ordered maps keyed by record id, so reads come back in id order.
//! Change events are dispatched after the state lock is released, which lets
//! listeners read and write the store re-entrantly.

use log::{debug, trace};
use rowguard_core::context::established_identity;
use rowguard_core::{Error, Identity, RecordId, Result, UserId};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::thread::{self, ThreadId};

use crate::events::{ChangeEvent, MembersAction};
use crate::query::Query;
use crate::record::{AccessFields, CacheField, Record};
use crate::schema::{EntitySchema, FieldKind, Schema, Through};
use crate::traits::{ChangeListener, Store};
use crate::value::Value;

/// Owner type, collection field, owner id.
pub(crate) type MemberKey = (String, String, RecordId);

#[derive(Debug)]
pub(crate) struct Table {
    pub(crate) next_id: RecordId,
    pub(crate) rows: BTreeMap<RecordId, Record>,
}

impl Default for Table {
    fn default() -> Self {
        Self {
            next_id: RecordId::new(1),
            rows: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct State {
    pub(crate) tables: BTreeMap<String, Table>,
    pub(crate) members: BTreeMap<MemberKey, BTreeSet<UserId>>,
}

/// How to revert a write whose listeners failed.
enum Undo {
    Insert(String, RecordId),
    Values(String, RecordId, BTreeMap<String, Value>),
    Delete(Record, Vec<(MemberKey, BTreeSet<UserId>)>),
    Members(MemberKey, BTreeSet<UserId>),
}

/// Cache values overwritten while one dispatch ran, oldest first.
type CacheJournal = Vec<(String, RecordId, AccessFields)>;

/// A thread-safe store keeping everything in memory.
///
/// A write whose listeners fail is rolled back before the error is returned,
/// together with every cache update those listeners made.
pub struct InMemoryStore {
    schema: Schema,
    state: RwLock<State>,
    listeners: RwLock<Vec<Arc<dyn ChangeListener>>>,
    /// Open dispatches per thread, innermost last.
    journals: Mutex<HashMap<ThreadId, Vec<CacheJournal>>>,
}

impl std::fmt::Debug for InMemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryStore")
            .field("entity_types", &self.schema.entities().count())
            .field("listeners", &self.listener_count())
            .finish()
    }
}

impl InMemoryStore {
    /// Creates an empty store for a validated schema.
    pub fn new(schema: Schema) -> Result<Self> {
        schema.validate()?;
        Ok(Self::from_parts(schema, State::default()))
    }

    pub(crate) fn from_parts(schema: Schema, mut state: State) -> Self {
        for entity in schema.entities() {
            state.tables.entry(entity.name.clone()).or_default();
        }
        Self {
            schema,
            state: RwLock::new(state),
            listeners: RwLock::new(Vec::new()),
            journals: Mutex::new(HashMap::new()),
        }
    }

    /// Number of stored records of `entity_type`.
    pub fn len(&self, entity_type: &str) -> usize {
        self.read()
            .tables
            .get(entity_type)
            .map_or(0, |table| table.rows.len())
    }

    /// Whether the store holds no records of `entity_type`.
    pub fn is_empty(&self, entity_type: &str) -> bool {
        self.len(entity_type) == 0
    }

    pub(crate) fn read(&self) -> RwLockReadGuard<'_, State> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, State> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn journals(&self) -> MutexGuard<'_, HashMap<ThreadId, Vec<CacheJournal>>> {
        self.journals.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn open_journal(&self) {
        self.journals()
            .entry(thread::current().id())
            .or_default()
            .push(Vec::new());
    }

    /// Closes the innermost journal on this thread. A successful nested
    /// dispatch hands its entries to the enclosing one.
    fn close_journal(&self, keep: bool) -> CacheJournal {
        let mut journals = self.journals();
        let thread = thread::current().id();
        let Some(stack) = journals.get_mut(&thread) else {
            return Vec::new();
        };
        let journal = stack.pop().unwrap_or_default();
        match stack.last_mut() {
            Some(outer) if keep => {
                outer.extend(journal);
                Vec::new()
            }
            Some(_) => journal,
            None => {
                journals.remove(&thread);
                journal
            }
        }
    }

    fn note_cache_write(&self, entity_type: &str, id: RecordId, previous: &AccessFields) {
        if let Some(journal) = self
            .journals()
            .get_mut(&thread::current().id())
            .and_then(|stack| stack.last_mut())
        {
            journal.push((entity_type.to_string(), id, previous.clone()));
        }
    }

    fn dispatch(&self, event: ChangeEvent) -> Result<()> {
        let listeners: Vec<Arc<dyn ChangeListener>> = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        trace!("Dispatching {event:?} to {} listener(s)", listeners.len());
        for listener in listeners {
            listener.on_change(self, &event)?;
        }
        Ok(())
    }

    fn dispatch_or_rollback(&self, event: ChangeEvent, undo: Undo) -> Result<()> {
        self.open_journal();
        let result = self.dispatch(event);
        let journal = self.close_journal(result.is_ok());
        if let Err(e) = &result {
            debug!(
                "Rolling back write and {} cache update(s) after listener error: {e}",
                journal.len()
            );
            let mut state = self.write();
            for (entity_type, id, access) in journal.into_iter().rev() {
                if let Some(stored) = state
                    .tables
                    .get_mut(&entity_type)
                    .and_then(|table| table.rows.get_mut(&id))
                {
                    *stored.access_mut() = access;
                }
            }
            match undo {
                Undo::Insert(entity_type, id) => {
                    if let Some(table) = state.tables.get_mut(&entity_type) {
                        table.rows.remove(&id);
                    }
                    state
                        .members
                        .retain(|(owner, _, owner_id), _| !(*owner == entity_type && *owner_id == id));
                }
                Undo::Values(entity_type, id, values) => {
                    if let Some(stored) = state
                        .tables
                        .get_mut(&entity_type)
                        .and_then(|table| table.rows.get_mut(&id))
                    {
                        stored.replace_values(values);
                    }
                }
                Undo::Delete(record, members) => {
                    state
                        .tables
                        .entry(record.entity_type().to_string())
                        .or_default()
                        .rows
                        .insert(record.id(), record);
                    state.members.extend(members);
                }
                Undo::Members(key, previous) => {
                    state.members.insert(key, previous);
                }
            }
        }
        result
    }

    /// Controlled types may only be written while a listener keeps their
    /// caches in step.
    fn guard_managed(&self, entity: &EntitySchema) -> Result<()> {
        if entity.is_access_controlled() && self.listener_count() == 0 {
            return Err(Error::bad_manager(&entity.name));
        }
        Ok(())
    }

    fn auto_collection<'a>(&'a self, entity_type: &str, field: &str) -> Result<&'a EntitySchema> {
        let entity = self.schema.require(entity_type)?;
        match entity.require_collection(field)? {
            Through::Auto => Ok(entity),
            Through::Custom { .. } => Err(Error::CustomThrough {
                entity_type: entity_type.to_string(),
                field: field.to_string(),
            }),
        }
    }

    fn change_members(
        &self,
        entity_type: &str,
        id: RecordId,
        field: &str,
        action: MembersAction,
        users: &[UserId],
    ) -> Result<()> {
        self.auto_collection(entity_type, field)?;
        let (key, previous) = {
            let mut state = self.write();
            let exists = state
                .tables
                .get(entity_type)
                .is_some_and(|table| table.rows.contains_key(&id));
            if !exists {
                return Err(Error::not_found(entity_type, id));
            }
            let key = (entity_type.to_string(), field.to_string(), id);
            let set = state.members.entry(key.clone()).or_default();
            let previous = set.clone();
            match action {
                MembersAction::Add => set.extend(users.iter().copied()),
                MembersAction::Remove => {
                    for user in users {
                        set.remove(user);
                    }
                }
                MembersAction::Clear => set.clear(),
            }
            (key, previous)
        };
        debug!("{entity_type}#{id}.{field}: {action:?} {users:?}");
        self.dispatch_or_rollback(
            ChangeEvent::MembersChanged {
                entity_type: entity_type.to_string(),
                id,
                field: field.to_string(),
                action,
                users: users.to_vec(),
            },
            Undo::Members(key, previous),
        )
    }
}

fn check_value(entity: &EntitySchema, name: &str, value: &Value) -> Result<()> {
    let field = entity.require_field(name)?;
    let fits = match &field.kind {
        FieldKind::Scalar => !matches!(value, Value::User(_) | Value::Ref(_)),
        FieldKind::User => matches!(value, Value::Null | Value::User(_)),
        FieldKind::Entity { .. } => matches!(value, Value::Null | Value::Ref(_)),
        FieldKind::Users { .. } => false,
    };
    if fits {
        Ok(())
    } else {
        Err(Error::schema(format!(
            "value {value} does not fit field '{name}' on {}",
            entity.name
        )))
    }
}

pub(crate) fn check_values(entity: &EntitySchema, record: &Record) -> Result<()> {
    record
        .values()
        .iter()
        .try_for_each(|(name, value)| check_value(entity, name, value))
}

impl Store for InMemoryStore {
    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn fetch(&self, query: &Query) -> Result<Vec<Record>> {
        self.schema.require(&query.entity_type)?;
        let state = self.read();
        let Some(table) = state.tables.get(&query.entity_type) else {
            return Ok(Vec::new());
        };
        let matching = table
            .rows
            .values()
            .filter(|record| query.predicate.matches(record))
            .take(query.limit.unwrap_or(usize::MAX))
            .cloned()
            .collect();
        Ok(matching)
    }

    fn get(&self, entity_type: &str, id: RecordId) -> Result<Option<Record>> {
        self.schema.require(entity_type)?;
        Ok(self
            .read()
            .tables
            .get(entity_type)
            .and_then(|table| table.rows.get(&id))
            .cloned())
    }

    fn insert_with_members(
        &self,
        mut record: Record,
        members: &[(String, Vec<UserId>)],
    ) -> Result<Record> {
        let entity = self.schema.require(record.entity_type())?;
        check_values(entity, &record)?;
        for (field, _) in members {
            self.auto_collection(&entity.name, field)?;
        }
        self.guard_managed(entity)?;

        let entity_type = record.entity_type().to_string();
        let id = {
            let mut state = self.write();
            let table = state.tables.entry(entity_type.clone()).or_default();
            let id = table.next_id;
            table.next_id = id.next();
            record.assign_id(id);
            record.store_access_cache(AccessFields::default());
            table.rows.insert(id, record.clone());
            for (field, users) in members {
                state
                    .members
                    .entry((entity_type.clone(), field.clone(), id))
                    .or_default()
                    .extend(users.iter().copied());
            }
            id
        };
        debug!("Inserted {entity_type}#{id}");

        self.dispatch_or_rollback(
            ChangeEvent::Saved {
                entity_type: entity_type.clone(),
                id,
                created: true,
                previous: None,
            },
            Undo::Insert(entity_type.clone(), id),
        )?;
        Ok(self.get(&entity_type, id)?.unwrap_or(record))
    }

    fn save(&self, record: &Record) -> Result<()> {
        let entity = self.schema.require(record.entity_type())?;
        check_values(entity, record)?;
        self.guard_managed(entity)?;
        let previous = {
            let mut state = self.write();
            let stored = state
                .tables
                .get_mut(record.entity_type())
                .and_then(|table| table.rows.get_mut(&record.id()))
                .ok_or_else(|| Error::not_found(record.entity_type(), record.id()))?;
            let previous = stored.clone();
            stored.replace_values(record.values().clone());
            previous
        };
        debug!("Saved {record}");
        self.dispatch_or_rollback(
            ChangeEvent::Saved {
                entity_type: record.entity_type().to_string(),
                id: record.id(),
                created: false,
                previous: Some(previous.clone()),
            },
            Undo::Values(
                record.entity_type().to_string(),
                record.id(),
                previous.values().clone(),
            ),
        )
    }

    fn delete(&self, entity_type: &str, id: RecordId) -> Result<Option<Record>> {
        self.schema.require(entity_type)?;
        let removed = {
            let mut state = self.write();
            let removed = state
                .tables
                .get_mut(entity_type)
                .and_then(|table| table.rows.remove(&id));
            let mut members = Vec::new();
            if removed.is_some() {
                let keys: Vec<MemberKey> = state
                    .members
                    .keys()
                    .filter(|(owner, _, owner_id)| owner == entity_type && *owner_id == id)
                    .cloned()
                    .collect();
                for key in keys {
                    if let Some(users) = state.members.remove(&key) {
                        members.push((key, users));
                    }
                }
            }
            removed.map(|record| (record, members))
        };
        let Some((record, members)) = removed else {
            return Ok(None);
        };
        debug!("Deleted {record}");
        self.dispatch_or_rollback(
            ChangeEvent::Deleted {
                record: record.clone(),
            },
            Undo::Delete(record.clone(), members),
        )?;
        Ok(Some(record))
    }

    fn update_fields(
        &self,
        entity_type: &str,
        id: RecordId,
        changes: &[(String, Value)],
    ) -> Result<()> {
        let entity = self.schema.require(entity_type)?;
        for (name, value) in changes {
            if CacheField::is_cache_column(name) {
                return Err(Error::ReadOnlyField(name.clone()));
            }
            check_value(entity, name, value)?;
        }
        let mut state = self.write();
        let stored = state
            .tables
            .get_mut(entity_type)
            .and_then(|table| table.rows.get_mut(&id))
            .ok_or_else(|| Error::not_found(entity_type, id))?;
        for (name, value) in changes {
            stored.set(name.clone(), value.clone())?;
        }
        trace!("Updated {entity_type}#{id} fields {changes:?}");
        Ok(())
    }

    fn update_access_fields(
        &self,
        entity_type: &str,
        id: RecordId,
        access: &AccessFields,
        fields: &[CacheField],
    ) -> Result<()> {
        if established_identity() != Some(Identity::Super) {
            return Err(Error::PrivilegeRequired("update_access_fields"));
        }
        if !self.schema.require(entity_type)?.is_access_controlled() {
            return Err(Error::bad_manager(entity_type));
        }
        let mut state = self.write();
        let stored = state
            .tables
            .get_mut(entity_type)
            .and_then(|table| table.rows.get_mut(&id))
            .ok_or_else(|| Error::not_found(entity_type, id))?;
        self.note_cache_write(entity_type, id, stored.access());
        stored.access_mut().apply(access, fields);
        trace!("Updated {entity_type}#{id} cache {fields:?}");
        Ok(())
    }

    fn members(&self, entity_type: &str, id: RecordId, field: &str) -> Result<BTreeSet<UserId>> {
        let entity = self.schema.require(entity_type)?;
        let state = self.read();
        match entity.require_collection(field)? {
            Through::Auto => Ok(state
                .members
                .get(&(entity_type.to_string(), field.to_string(), id))
                .cloned()
                .unwrap_or_default()),
            Through::Custom {
                association,
                owner_field,
                user_field,
            } => Ok(state
                .tables
                .get(association)
                .map(|table| {
                    table
                        .rows
                        .values()
                        .filter(|row| row.get(owner_field).as_ref_id() == Some(id))
                        .filter_map(|row| row.user(user_field))
                        .collect()
                })
                .unwrap_or_default()),
        }
    }

    fn add_members(
        &self,
        entity_type: &str,
        id: RecordId,
        field: &str,
        users: &[UserId],
    ) -> Result<()> {
        self.change_members(entity_type, id, field, MembersAction::Add, users)
    }

    fn remove_members(
        &self,
        entity_type: &str,
        id: RecordId,
        field: &str,
        users: &[UserId],
    ) -> Result<()> {
        self.change_members(entity_type, id, field, MembersAction::Remove, users)
    }

    fn clear_members(&self, entity_type: &str, id: RecordId, field: &str) -> Result<()> {
        self.change_members(entity_type, id, field, MembersAction::Clear, &[])
    }

    fn subscribe(&self, listener: Arc<dyn ChangeListener>) {
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(listener);
    }

    fn listener_count(&self) -> usize {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
