//! Wiring of a store to the access-control engine.

use rowguard_core::{Error, Result};
use rowguard_storage::{CacheField, Record, Store};
use std::sync::Arc;

use crate::manager::AccessManager;
use crate::propagation::Propagator;
use crate::registry::AccessRegistry;

/// A store wired to a registry.
///
/// Construction subscribes a [`Propagator`] to the store, which is what
/// makes writes of controlled types legal on it.
///
/// # Example
///
/// ```rust
/// use rowguard_acl::AccessControl;
/// use rowguard_core::{context::with_identity, Identity, UserId};
/// use rowguard_storage::{EntitySchema, InMemoryStore, Record, Schema};
/// use std::sync::Arc;
///
/// let schema = Schema::new(vec![
///     EntitySchema::new("Doc").user_ref("owner").access_controlled(["owner"]),
/// ])?;
/// let control = AccessControl::from_store(Arc::new(InMemoryStore::new(schema)?))?;
///
/// let docs = control.objects("Doc")?;
/// docs.create(Record::draft("Doc").with("owner", UserId::new(1))?)?;
///
/// with_identity(Identity::user(2), || -> rowguard_core::Result<()> {
///     assert_eq!(docs.count()?, 1);
///     Ok(())
/// })?;
/// assert_eq!(docs.as_identity(Identity::Anonymous).count()?, 0);
/// # Ok::<(), rowguard_core::Error>(())
/// ```
#[derive(Clone)]
pub struct AccessControl {
    store: Arc<dyn Store>,
    registry: Arc<AccessRegistry>,
}

impl std::fmt::Debug for AccessControl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessControl")
            .field("listeners", &self.store.listener_count())
            .field("registry", &self.registry)
            .finish()
    }
}

impl AccessControl {
    /// Wires `store` to `registry`.
    pub fn install(store: Arc<dyn Store>, registry: AccessRegistry) -> Self {
        let registry = Arc::new(registry);
        store.subscribe(Arc::new(Propagator::new(registry.clone())));
        log::debug!(
            "Access control installed for {:?}",
            registry.controlled_types().collect::<Vec<_>>()
        );
        Self { store, registry }
    }

    /// Wires `store` using the default policy for every controlled type.
    pub fn from_store(store: Arc<dyn Store>) -> Result<Self> {
        let registry = AccessRegistry::from_schema(store.schema())?;
        Ok(Self::install(store, registry))
    }

    /// The wired store.
    pub fn store(&self) -> &dyn Store {
        self.store.as_ref()
    }

    /// The registration table.
    pub fn registry(&self) -> &AccessRegistry {
        &self.registry
    }

    /// Default read/write path for a controlled type.
    ///
    /// # Errors
    ///
    /// [`Error::UnknownEntityType`] for undeclared types and
    /// [`Error::BadManager`] for types that are not access-controlled.
    pub fn objects(&self, entity_type: &str) -> Result<AccessManager<'_>> {
        self.store.schema().require(entity_type)?;
        if !self.registry.is_controlled(entity_type) {
            return Err(Error::bad_manager(entity_type));
        }
        Ok(AccessManager::new(self, entity_type))
    }

    /// Recomputes and persists `record`'s cache.
    pub fn reconcile(&self, record: &mut Record) -> Result<Vec<CacheField>> {
        self.registry.reconcile(self.store(), record)
    }
}
