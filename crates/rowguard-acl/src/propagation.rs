//! Keeps caches current as related data changes.

use log::debug;
use rowguard_core::context::with_super_identity;
use rowguard_core::{RecordId, Result};
use rowguard_storage::{ChangeEvent, ChangeListener, Record, Store};
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::registry::AccessRegistry;

/// Store listener that reconciles the controlled records a write affects.
///
/// Handlers run under the super identity so that lookups see every record.
#[derive(Debug, Clone)]
pub struct Propagator {
    registry: Arc<AccessRegistry>,
}

impl Propagator {
    /// Creates a propagator for `registry`.
    pub fn new(registry: Arc<AccessRegistry>) -> Self {
        Self { registry }
    }

    fn reconcile_by_id(&self, store: &dyn Store, entity_type: &str, id: RecordId) -> Result<()> {
        match store.get(entity_type, id)? {
            Some(mut record) => {
                self.registry.reconcile(store, &mut record)?;
            }
            None => debug!("{entity_type}#{id} no longer exists; skipping reconcile"),
        }
        Ok(())
    }

    /// Reconciles the controlled records an association record points at,
    /// now or (for `previous`) before the write.
    fn follow_links(
        &self,
        store: &dyn Store,
        record: &Record,
        previous: Option<&Record>,
    ) -> Result<()> {
        let mut targets = BTreeSet::new();
        for hook in self.registry.link_hooks(record.entity_type()) {
            for row in std::iter::once(record).chain(previous) {
                if let Some(target) = row.get(&hook.field).as_ref_id() {
                    if targets.insert((hook.target.as_str(), target)) {
                        debug!("{row}.{} -> {}#{target}", hook.field, hook.target);
                    }
                }
            }
        }
        for (entity_type, id) in targets {
            self.reconcile_by_id(store, entity_type, id)?;
        }
        Ok(())
    }

    fn handle(&self, store: &dyn Store, event: &ChangeEvent) -> Result<()> {
        match event {
            ChangeEvent::Saved {
                entity_type,
                id,
                previous,
                ..
            } => {
                if self.registry.is_controlled(entity_type) {
                    self.reconcile_by_id(store, entity_type, *id)?;
                }
                if !self.registry.link_hooks(entity_type).is_empty() {
                    if let Some(record) = store.get(entity_type, *id)? {
                        self.follow_links(store, &record, previous.as_ref())?;
                    }
                }
                Ok(())
            }
            ChangeEvent::Deleted { record } => self.follow_links(store, record, None),
            ChangeEvent::MembersChanged {
                entity_type,
                id,
                field,
                ..
            } => {
                if self.registry.watches_members(entity_type, field) {
                    self.reconcile_by_id(store, entity_type, *id)?;
                }
                Ok(())
            }
        }
    }
}

impl ChangeListener for Propagator {
    fn on_change(&self, store: &dyn Store, event: &ChangeEvent) -> Result<()> {
        with_super_identity(|| self.handle(store, event))
    }
}
