//! Type-level declarations for entities and their relations.
//!
//! An entity type opts into access control by carrying an
//! [`AccessDeclaration`]: the marker plus the list of "restricted-to" fields
//! whose users form the allow-list. Everything the access-control layer
//! registers at start-up is derived from these declarations; nothing is
//! discovered by inspecting records at trigger time.
//!
//! # Example
//!
//! ```rust
//! use rowguard_storage::schema::{EntitySchema, Schema};
//!
//! let schema = Schema::new(vec![
//!     EntitySchema::new("Project")
//!         .app_label("tracker")
//!         .scalar("title")
//!         .user_ref("owner")
//!         .user_set("members")
//!         .access_controlled(["owner", "members"]),
//! ])
//! .unwrap();
//!
//! assert!(schema.entity("Project").unwrap().is_access_controlled());
//! ```

use rowguard_core::{AccessLevel, Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

// ============================================================================
// Field declarations
// ============================================================================

/// How a user collection is linked to its owner.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Through {
    /// Plain association rows managed by the store.
    #[default]
    Auto,
    /// A declared association entity with its own attributes.
    Custom {
        /// Association entity type.
        association: String,
        /// Field on the association pointing back at the owner.
        owner_field: String,
        /// Field on the association holding the user.
        user_field: String,
    },
}

/// Kind of a declared field.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldKind {
    /// Plain attribute.
    Scalar,
    /// Single reference to a user.
    User,
    /// Collection of user references.
    Users {
        /// Association backing the collection.
        #[serde(default)]
        through: Through,
    },
    /// Reference to a record of another entity type.
    Entity {
        /// Referenced entity type.
        target: String,
    },
}

/// A declared field.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDef {
    /// Field name.
    pub name: String,
    /// Field kind.
    pub kind: FieldKind,
}

impl FieldDef {
    /// Whether the field can contribute users to an allow-list.
    pub fn holds_users(&self) -> bool {
        matches!(self.kind, FieldKind::User | FieldKind::Users { .. })
    }

    /// Whether the field is a user collection (stored outside the record).
    pub fn is_collection(&self) -> bool {
        matches!(self.kind, FieldKind::Users { .. })
    }
}

// ============================================================================
// Access declarations
// ============================================================================

/// Where a controlled type takes its intended access level from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LevelSource {
    /// The same level for every record.
    Fixed {
        /// The level.
        level: AccessLevel,
    },
    /// A text attribute holding the level name. Unset or unparsable values
    /// fall back to the default level.
    Field {
        /// Attribute name.
        field: String,
    },
}

impl Default for LevelSource {
    fn default() -> Self {
        Self::Fixed {
            level: AccessLevel::default(),
        }
    }
}

/// Opt-in marker for access control.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessDeclaration {
    /// Fields whose users form the allow-list.
    #[serde(default)]
    pub restricted_to: Vec<String>,
    /// Source of the intended level.
    #[serde(default)]
    pub level: LevelSource,
}

// ============================================================================
// EntitySchema
// ============================================================================

/// Declaration of one entity type.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitySchema {
    /// Type name.
    pub name: String,
    /// Application grouping, used to scope maintenance runs.
    #[serde(default)]
    pub app_label: String,
    /// Declared fields.
    #[serde(default)]
    pub fields: Vec<FieldDef>,
    /// Access-control opt-in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access: Option<AccessDeclaration>,
}

impl EntitySchema {
    /// Starts a declaration.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            app_label: String::new(),
            fields: Vec::new(),
            access: None,
        }
    }

    /// Sets the application label.
    pub fn app_label(mut self, label: impl Into<String>) -> Self {
        self.app_label = label.into();
        self
    }

    /// Adds a field of any kind.
    pub fn field(mut self, name: impl Into<String>, kind: FieldKind) -> Self {
        self.fields.push(FieldDef {
            name: name.into(),
            kind,
        });
        self
    }

    /// Adds a plain attribute.
    pub fn scalar(self, name: impl Into<String>) -> Self {
        self.field(name, FieldKind::Scalar)
    }

    /// Adds a single user reference.
    pub fn user_ref(self, name: impl Into<String>) -> Self {
        self.field(name, FieldKind::User)
    }

    /// Adds a user collection backed by plain association rows.
    pub fn user_set(self, name: impl Into<String>) -> Self {
        self.field(
            name,
            FieldKind::Users {
                through: Through::Auto,
            },
        )
    }

    /// Adds a user collection backed by a declared association entity.
    pub fn user_set_through(
        self,
        name: impl Into<String>,
        association: impl Into<String>,
        owner_field: impl Into<String>,
        user_field: impl Into<String>,
    ) -> Self {
        self.field(
            name,
            FieldKind::Users {
                through: Through::Custom {
                    association: association.into(),
                    owner_field: owner_field.into(),
                    user_field: user_field.into(),
                },
            },
        )
    }

    /// Adds a reference to another entity type.
    pub fn entity_ref(self, name: impl Into<String>, target: impl Into<String>) -> Self {
        self.field(
            name,
            FieldKind::Entity {
                target: target.into(),
            },
        )
    }

    /// Opts into access control with the given restricted-to fields.
    pub fn access_controlled<I, S>(mut self, restricted_to: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let declaration = self.access.get_or_insert_with(AccessDeclaration::default);
        declaration.restricted_to = restricted_to.into_iter().map(Into::into).collect();
        self
    }

    /// Reads the intended level from a text attribute. Implies opting in.
    pub fn level_from_field(mut self, field: impl Into<String>) -> Self {
        let declaration = self.access.get_or_insert_with(AccessDeclaration::default);
        declaration.level = LevelSource::Field {
            field: field.into(),
        };
        self
    }

    /// Uses a fixed intended level. Implies opting in.
    pub fn fixed_level(mut self, level: AccessLevel) -> Self {
        let declaration = self.access.get_or_insert_with(AccessDeclaration::default);
        declaration.level = LevelSource::Fixed { level };
        self
    }

    /// Whether the type opted into access control.
    pub fn is_access_controlled(&self) -> bool {
        self.access.is_some()
    }

    /// Restricted-to field names (empty for uncontrolled types).
    pub fn restricted_to(&self) -> &[String] {
        self.access
            .as_ref()
            .map(|a| a.restricted_to.as_slice())
            .unwrap_or_default()
    }

    /// Looks up a field.
    pub fn get_field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Looks up a field, failing with [`Error::UnknownField`].
    pub fn require_field(&self, name: &str) -> Result<&FieldDef> {
        self.get_field(name)
            .ok_or_else(|| Error::unknown_field(&self.name, name))
    }

    /// Looks up a user-collection field, returning its association.
    pub fn require_collection(&self, name: &str) -> Result<&Through> {
        match &self.require_field(name)?.kind {
            FieldKind::Users { through } => Ok(through),
            _ => Err(Error::schema(format!(
                "field '{name}' on {} is not a user collection",
                self.name
            ))),
        }
    }
}

// ============================================================================
// Schema
// ============================================================================

/// The full set of entity declarations known to a store.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    entities: Vec<EntitySchema>,
}

impl Schema {
    /// Builds and validates a schema.
    pub fn new(entities: Vec<EntitySchema>) -> Result<Self> {
        let schema = Self { entities };
        schema.validate()?;
        Ok(schema)
    }

    /// Looks up an entity type.
    pub fn entity(&self, name: &str) -> Option<&EntitySchema> {
        self.entities.iter().find(|e| e.name == name)
    }

    /// Looks up an entity type, failing with [`Error::UnknownEntityType`].
    pub fn require(&self, name: &str) -> Result<&EntitySchema> {
        self.entity(name)
            .ok_or_else(|| Error::UnknownEntityType(name.to_string()))
    }

    /// All entity types in declaration order.
    pub fn entities(&self) -> impl Iterator<Item = &EntitySchema> {
        self.entities.iter()
    }

    /// Access-controlled entity types in declaration order.
    pub fn controlled(&self) -> impl Iterator<Item = &EntitySchema> {
        self.entities.iter().filter(|e| e.is_access_controlled())
    }

    /// Whether `name` is a declared, access-controlled type.
    pub fn is_controlled(&self, name: &str) -> bool {
        self.entity(name).is_some_and(EntitySchema::is_access_controlled)
    }

    /// Checks the declarations for consistency.
    pub fn validate(&self) -> Result<()> {
        let mut seen = BTreeSet::new();
        for entity in &self.entities {
            if !seen.insert(entity.name.as_str()) {
                return Err(Error::schema(format!(
                    "entity type '{}' declared twice",
                    entity.name
                )));
            }
        }

        for entity in &self.entities {
            let mut field_names = BTreeSet::new();
            for field in &entity.fields {
                if !field_names.insert(field.name.as_str()) {
                    return Err(Error::schema(format!(
                        "field '{}' declared twice on {}",
                        field.name, entity.name
                    )));
                }
                match &field.kind {
                    FieldKind::Entity { target } => {
                        self.require(target)?;
                    }
                    FieldKind::Users {
                        through:
                            Through::Custom {
                                association,
                                owner_field,
                                user_field,
                            },
                    } => self.validate_custom_through(
                        entity,
                        &field.name,
                        association,
                        owner_field,
                        user_field,
                    )?,
                    _ => {}
                }
            }

            if let Some(access) = &entity.access {
                for name in &access.restricted_to {
                    let field = entity.require_field(name)?;
                    if !field.holds_users() {
                        return Err(Error::schema(format!(
                            "restricted-to field '{name}' on {} must reference users",
                            entity.name
                        )));
                    }
                }
                if let LevelSource::Field { field } = &access.level {
                    if entity.require_field(field)?.kind != FieldKind::Scalar {
                        return Err(Error::schema(format!(
                            "level field '{field}' on {} must be a scalar",
                            entity.name
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    fn validate_custom_through(
        &self,
        owner: &EntitySchema,
        field: &str,
        association: &str,
        owner_field: &str,
        user_field: &str,
    ) -> Result<()> {
        let assoc = self.require(association)?;
        match &assoc.require_field(owner_field)?.kind {
            FieldKind::Entity { target } if *target == owner.name => {}
            _ => {
                return Err(Error::schema(format!(
                    "{association}.{owner_field} must reference {} (used by {}.{field})",
                    owner.name, owner.name
                )));
            }
        }
        if assoc.require_field(user_field)?.kind != FieldKind::User {
            return Err(Error::schema(format!(
                "{association}.{user_field} must be a user reference (used by {}.{field})",
                owner.name
            )));
        }
        Ok(())
    }
}
