//! Per-type visibility rules.
//!
//! A [`VisibilityPolicy`] computes the intended access level and the set of
//! users reachable through the type's restricted-to fields. Every method has a
//! default; types with custom rules override what they need.

use log::debug;
use rowguard_core::{AccessLevel, AllowList, Result, UserId};
use rowguard_storage::{AccessFields, CacheField, EntitySchema, FieldKind, LevelSource, Record, Store};
use std::collections::BTreeSet;

/// Visibility rules for one controlled entity type.
pub trait VisibilityPolicy: Send + Sync {
    /// Intended access level of `record`.
    fn access_level(&self, record: &Record, entity: &EntitySchema) -> AccessLevel {
        let _ = (record, entity);
        AccessLevel::default()
    }

    /// Users reachable through the restricted-to fields.
    fn allowed_users(
        &self,
        record: &Record,
        entity: &EntitySchema,
        store: &dyn Store,
    ) -> Result<BTreeSet<UserId>> {
        restricted_users(record, entity, store)
    }

    /// Runs after new cache values are staged on `record` and before they
    /// are persisted. An error aborts the persist.
    fn before_access_save(&self, record: &mut Record, changed: &[CacheField]) -> Result<()> {
        let _ = (record, changed);
        Ok(())
    }
}

/// Union of the users referenced by `entity`'s restricted-to fields.
///
/// Single references contribute their user when set; collections contribute
/// every current member.
pub fn restricted_users(
    record: &Record,
    entity: &EntitySchema,
    store: &dyn Store,
) -> Result<BTreeSet<UserId>> {
    let mut users = BTreeSet::new();
    for name in entity.restricted_to() {
        match &entity.require_field(name)?.kind {
            FieldKind::User => users.extend(record.user(name)),
            FieldKind::Users { .. } => {
                users.extend(store.members(record.entity_type(), record.id(), name)?)
            }
            _ => {}
        }
    }
    Ok(users)
}

/// Cache values `policy` intends for `record`.
///
/// An empty user set encodes as no allow-list.
pub fn intended_access(
    policy: &dyn VisibilityPolicy,
    record: &Record,
    entity: &EntitySchema,
    store: &dyn Store,
) -> Result<AccessFields> {
    let level = policy.access_level(record, entity);
    let users = policy.allowed_users(record, entity, store)?;
    Ok(AccessFields::new(level, AllowList::encode(users)))
}

/// The policy used for every controlled type without a custom one.
///
/// The level comes from the type's declaration: either fixed, or read from
/// a text attribute that falls back to the default level when unset or
/// unparsable.
#[derive(Clone, Copy, Debug, Default)]
pub struct SchemaPolicy;

impl VisibilityPolicy for SchemaPolicy {
    fn access_level(&self, record: &Record, entity: &EntitySchema) -> AccessLevel {
        let Some(declaration) = &entity.access else {
            return AccessLevel::default();
        };
        match &declaration.level {
            LevelSource::Fixed { level } => *level,
            LevelSource::Field { field } => match record.get(field).as_text() {
                Some(text) => text.parse().unwrap_or_else(|_| {
                    debug!("{record}: unrecognised level {text:?} in '{field}', using default");
                    AccessLevel::default()
                }),
                None => AccessLevel::default(),
            },
        }
    }
}
