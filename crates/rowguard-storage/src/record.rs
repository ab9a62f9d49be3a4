//! Persisted records and their cached access fields.

use rowguard_core::{AccessLevel, AllowList, Error, Identity, RecordId, Result, UserId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::value::Value;

// ============================================================================
// CacheField
// ============================================================================

/// The two derived columns every controlled record carries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheField {
    /// `access_level_cache`
    AccessLevel,
    /// `access_permitted_users_cache`
    PermittedUsers,
}

impl CacheField {
    /// Both cache fields.
    pub const ALL: [CacheField; 2] = [Self::AccessLevel, Self::PermittedUsers];

    /// Column name.
    pub fn column(&self) -> &'static str {
        match self {
            Self::AccessLevel => "access_level_cache",
            Self::PermittedUsers => "access_permitted_users_cache",
        }
    }

    /// Whether `name` is one of the cache columns.
    pub fn is_cache_column(name: &str) -> bool {
        Self::ALL.iter().any(|f| f.column() == name)
    }
}

impl fmt::Display for CacheField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

// ============================================================================
// AccessFields
// ============================================================================

/// Cached access level and encoded allow-list.
///
/// Derived data: only reconciliation (or a store loading persisted state)
/// produces new values.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessFields {
    #[serde(default)]
    level: AccessLevel,
    #[serde(default)]
    permitted_users: Option<AllowList>,
}

impl AccessFields {
    /// Creates cache values. No invariant is enforced here: a RESTRICTED
    /// level without an allow-list is representable so that corrupted
    /// persisted state can be detected by [`AccessFields::permits`].
    pub fn new(level: AccessLevel, permitted_users: Option<AllowList>) -> Self {
        Self {
            level,
            permitted_users,
        }
    }

    /// Cached level.
    pub fn level(&self) -> AccessLevel {
        self.level
    }

    /// Cached allow-list.
    pub fn permitted_users(&self) -> Option<&AllowList> {
        self.permitted_users.as_ref()
    }

    /// Whether the RESTRICTED-implies-allow-list invariant holds.
    pub fn is_consistent(&self) -> bool {
        self.level != AccessLevel::Restricted || self.permitted_users.is_some()
    }

    /// Fields whose values differ from `other`.
    pub fn diff(&self, other: &AccessFields) -> Vec<CacheField> {
        let mut changed = Vec::new();
        if self.level != other.level {
            changed.push(CacheField::AccessLevel);
        }
        if self.permitted_users != other.permitted_users {
            changed.push(CacheField::PermittedUsers);
        }
        changed
    }

    /// Copies the listed fields from `other`.
    pub fn apply(&mut self, other: &AccessFields, fields: &[CacheField]) {
        for field in fields {
            match field {
                CacheField::AccessLevel => self.level = other.level,
                CacheField::PermittedUsers => {
                    self.permitted_users.clone_from(&other.permitted_users)
                }
            }
        }
    }

    /// Access decision for `identity`.
    ///
    /// Returns `None` when the record is RESTRICTED but has no allow-list.
    pub fn permits(&self, identity: &Identity) -> Option<bool> {
        // Anyone can see PUBLIC entries.
        if self.level == AccessLevel::Public {
            return Some(true);
        }
        match identity {
            Identity::Super => Some(true),
            Identity::Anonymous => Some(false),
            Identity::User(user) => match self.level {
                AccessLevel::Public | AccessLevel::Authorized => Some(true),
                AccessLevel::Restricted => self
                    .permitted_users
                    .as_ref()
                    .map(|list| list.contains(*user)),
            },
        }
    }

    /// Value of a cache column as a plain [`Value`].
    pub fn column_value(&self, field: CacheField) -> Value {
        match field {
            CacheField::AccessLevel => Value::Text(self.level.as_str().to_string()),
            CacheField::PermittedUsers => self
                .permitted_users
                .as_ref()
                .map(|list| Value::Text(list.as_str().to_string()))
                .unwrap_or(Value::Null),
        }
    }
}

// ============================================================================
// Record
// ============================================================================

/// A persisted instance of an entity type.
///
/// User collections are not stored on the record; they live in the store's
/// association tables.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Record {
    entity_type: String,
    id: RecordId,
    #[serde(default)]
    values: BTreeMap<String, Value>,
    #[serde(default)]
    access: AccessFields,
}

impl Record {
    /// Creates a record with default cache values.
    pub fn new(entity_type: impl Into<String>, id: RecordId) -> Self {
        Self {
            entity_type: entity_type.into(),
            id,
            values: BTreeMap::new(),
            access: AccessFields::default(),
        }
    }

    /// Starts a record that has not been stored yet; the store assigns its
    /// id on insert.
    pub fn draft(entity_type: impl Into<String>) -> Self {
        Self::new(entity_type, RecordId::new(0))
    }

    pub(crate) fn assign_id(&mut self, id: RecordId) {
        self.id = id;
    }

    pub(crate) fn replace_values(&mut self, values: BTreeMap<String, Value>) {
        self.values = values;
    }

    pub(crate) fn access_mut(&mut self) -> &mut AccessFields {
        &mut self.access
    }

    /// Entity type name.
    pub fn entity_type(&self) -> &str {
        &self.entity_type
    }

    /// Record id.
    pub fn id(&self) -> RecordId {
        self.id
    }

    /// Attribute value, [`Value::Null`] when unset.
    pub fn get(&self, field: &str) -> &Value {
        static NULL: Value = Value::Null;
        self.values.get(field).unwrap_or(&NULL)
    }

    /// All attribute values.
    pub fn values(&self) -> &BTreeMap<String, Value> {
        &self.values
    }

    /// User referenced by `field`, if any.
    pub fn user(&self, field: &str) -> Option<UserId> {
        self.get(field).as_user()
    }

    /// Sets an attribute. Cache columns are refused.
    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) -> Result<()> {
        let field = field.into();
        if CacheField::is_cache_column(&field) {
            return Err(Error::ReadOnlyField(field));
        }
        self.values.insert(field, value.into());
        Ok(())
    }

    /// Builder form of [`Record::set`].
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Result<Self> {
        self.set(field, value)?;
        Ok(self)
    }

    /// Cached access fields.
    pub fn access(&self) -> &AccessFields {
        &self.access
    }

    /// Replaces the cached access fields.
    ///
    /// Reserved for reconciliation and for stores materialising persisted
    /// rows; application code must not call it.
    pub fn store_access_cache(&mut self, access: AccessFields) {
        self.access = access;
    }

    /// Checks whether `identity` may access this record.
    ///
    /// # Errors
    ///
    /// [`Error::AccessData`] when the record is cached as RESTRICTED without
    /// an allow-list.
    pub fn check_access(&self, identity: &Identity) -> Result<bool> {
        self.access
            .permits(identity)
            .ok_or_else(|| Error::AccessData {
                entity_type: self.entity_type.clone(),
                id: self.id,
            })
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.entity_type, self.id)
    }
}
