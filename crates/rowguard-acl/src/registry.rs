//! The registration table built once at start-up.
//!
//! [`AccessRegistry`] records, for every controlled entity type, the policy
//! that computes its cache values and the change notifications that must
//! trigger a recompute:
//!
//! - saves of the controlled type itself;
//! - member changes of its auto-through restricted-to collections;
//! - saves and deletes of the association types backing its custom-through
//!   restricted-to collections ("link hooks").
//!
//! Everything is derived from the schema's declarations; nothing is looked
//! up on records at trigger time.

use log::debug;
use rowguard_core::context::with_super_identity;
use rowguard_core::{Error, Result};
use rowguard_storage::{AccessFields, CacheField, FieldKind, Record, Schema, Store, Through};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::policy::{SchemaPolicy, VisibilityPolicy, intended_access};

/// A declared reference from an association type to a controlled type.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct LinkHook {
    /// Reference field on the association.
    pub field: String,
    /// Controlled type it points at.
    pub target: String,
}

/// Builder for [`AccessRegistry`].
#[derive(Default)]
pub struct AccessRegistryBuilder {
    policies: BTreeMap<String, Arc<dyn VisibilityPolicy>>,
}

impl AccessRegistryBuilder {
    /// Uses a custom policy for `entity_type` instead of [`SchemaPolicy`].
    pub fn policy(
        mut self,
        entity_type: impl Into<String>,
        policy: Arc<dyn VisibilityPolicy>,
    ) -> Self {
        self.policies.insert(entity_type.into(), policy);
        self
    }

    /// Builds the table for `schema`.
    ///
    /// # Errors
    ///
    /// Schema errors from validation, and a schema error when a custom
    /// policy names a type that is not access-controlled.
    pub fn build(mut self, schema: &Schema) -> Result<AccessRegistry> {
        schema.validate()?;
        if let Some(name) = self.policies.keys().find(|name| !schema.is_controlled(name)) {
            return Err(Error::schema(format!(
                "policy registered for '{name}', which is not access-controlled"
            )));
        }

        let mut registry = AccessRegistry::default();
        for entity in schema.controlled() {
            let policy = self
                .policies
                .remove(&entity.name)
                .unwrap_or_else(|| Arc::new(SchemaPolicy));
            registry.policies.insert(entity.name.clone(), policy);

            for name in entity.restricted_to() {
                let FieldKind::Users { through } = &entity.require_field(name)?.kind else {
                    continue;
                };
                match through {
                    Through::Auto => {
                        registry
                            .member_hooks
                            .insert((entity.name.clone(), name.clone()));
                    }
                    Through::Custom { association, .. } => {
                        registry.link_types.insert(association.clone());
                    }
                }
            }
        }

        for association in &registry.link_types {
            let assoc = schema.require(association)?;
            let hooks: Vec<LinkHook> = assoc
                .fields
                .iter()
                .filter_map(|field| match &field.kind {
                    FieldKind::Entity { target } if schema.is_controlled(target) => {
                        Some(LinkHook {
                            field: field.name.clone(),
                            target: target.clone(),
                        })
                    }
                    _ => None,
                })
                .collect();
            registry.link_hooks.insert(association.clone(), hooks);
        }

        debug!(
            "Access registry: {} controlled type(s), {} member hook(s), {} link type(s)",
            registry.policies.len(),
            registry.member_hooks.len(),
            registry.link_hooks.len()
        );
        Ok(registry)
    }
}

/// Controlled types, their policies, and the hooks that keep caches current.
#[derive(Default)]
pub struct AccessRegistry {
    policies: BTreeMap<String, Arc<dyn VisibilityPolicy>>,
    member_hooks: BTreeSet<(String, String)>,
    link_types: BTreeSet<String>,
    link_hooks: BTreeMap<String, Vec<LinkHook>>,
}

impl std::fmt::Debug for AccessRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessRegistry")
            .field("controlled", &self.policies.keys().collect::<Vec<_>>())
            .field("member_hooks", &self.member_hooks)
            .field("link_hooks", &self.link_hooks)
            .finish()
    }
}

impl AccessRegistry {
    /// Starts a builder.
    pub fn builder() -> AccessRegistryBuilder {
        AccessRegistryBuilder::default()
    }

    /// Registry using [`SchemaPolicy`] for every controlled type.
    pub fn from_schema(schema: &Schema) -> Result<Self> {
        Self::builder().build(schema)
    }

    /// Whether `entity_type` is registered as controlled.
    pub fn is_controlled(&self, entity_type: &str) -> bool {
        self.policies.contains_key(entity_type)
    }

    /// Controlled type names in order.
    pub fn controlled_types(&self) -> impl Iterator<Item = &str> {
        self.policies.keys().map(String::as_str)
    }

    /// Policy for a controlled type.
    pub fn policy(&self, entity_type: &str) -> Option<&Arc<dyn VisibilityPolicy>> {
        self.policies.get(entity_type)
    }

    /// Whether member changes of `entity_type.field` trigger a recompute.
    pub fn watches_members(&self, entity_type: &str, field: &str) -> bool {
        self.member_hooks
            .contains(&(entity_type.to_string(), field.to_string()))
    }

    /// Link hooks registered for an association type.
    pub fn link_hooks(&self, entity_type: &str) -> &[LinkHook] {
        self.link_hooks
            .get(entity_type)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Cache values the registered policy intends for `record`.
    pub fn intended(&self, store: &dyn Store, record: &Record) -> Result<AccessFields> {
        let policy = self
            .policy(record.entity_type())
            .ok_or_else(|| Error::bad_manager(record.entity_type()))?;
        let entity = store.schema().require(record.entity_type())?;
        intended_access(policy.as_ref(), record, entity, store)
    }

    /// Recomputes `record`'s cache and persists the fields that changed.
    ///
    /// Returns the changed fields; an empty list means nothing was written.
    /// The write is a direct partial update made under the super identity.
    ///
    /// # Errors
    ///
    /// - [`Error::BadManager`] if the type has no registered policy
    /// - [`Error::AccessData`] if the policy yields RESTRICTED with no users;
    ///   nothing is written
    /// - errors from the pre-persist hook or the store
    pub fn reconcile(&self, store: &dyn Store, record: &mut Record) -> Result<Vec<CacheField>> {
        let policy = self
            .policy(record.entity_type())
            .ok_or_else(|| Error::bad_manager(record.entity_type()))?;
        let entity = store.schema().require(record.entity_type())?;

        let target = intended_access(policy.as_ref(), record, entity, store)?;
        if !target.is_consistent() {
            return Err(Error::AccessData {
                entity_type: record.entity_type().to_string(),
                id: record.id(),
            });
        }

        let changed = record.access().diff(&target);
        if changed.is_empty() {
            return Ok(changed);
        }

        let previous = record.access().clone();
        record.store_access_cache(target);
        if let Err(e) = policy.before_access_save(record, &changed) {
            record.store_access_cache(previous);
            return Err(e);
        }

        with_super_identity(|| {
            store.update_access_fields(record.entity_type(), record.id(), record.access(), &changed)
        })?;
        debug!("{record}: access cache updated {changed:?}");
        Ok(changed)
    }
}
