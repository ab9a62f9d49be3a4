//! Bulk recomputation of access caches.

use log::info;
use rowguard_core::context::with_super_identity;
use rowguard_core::{Error, RecordId, Result};
use rowguard_storage::{CacheField, EntitySchema, Query};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::control::AccessControl;

/// Which controlled types a reset covers. The default covers all of them.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetOptions {
    /// Only types with this application label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_label: Option<String>,
    /// Only these types (empty means all).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entity_types: Vec<String>,
}

impl ResetOptions {
    /// Restricts the reset to one application label.
    pub fn app_label(mut self, label: impl Into<String>) -> Self {
        self.app_label = Some(label.into());
        self
    }

    /// Adds an entity type to the selection.
    pub fn entity_type(mut self, name: impl Into<String>) -> Self {
        self.entity_types.push(name.into());
        self
    }

    fn selects(&self, entity: &EntitySchema) -> bool {
        self.app_label
            .as_ref()
            .is_none_or(|label| *label == entity.app_label)
            && (self.entity_types.is_empty() || self.entity_types.contains(&entity.name))
    }
}

/// One instance whose cache changed during a reset.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetReport {
    /// Entity type.
    pub entity_type: String,
    /// Record id.
    pub id: RecordId,
    /// Cache fields that were rewritten.
    pub changed: Vec<CacheField>,
}

impl fmt::Display for ResetReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields: Vec<&str> = self.changed.iter().map(CacheField::column).collect();
        write!(
            f,
            "{}#{} updated: {}",
            self.entity_type,
            self.id,
            fields.join(", ")
        )
    }
}

impl AccessControl {
    /// Reconciles every instance of the selected controlled types.
    ///
    /// Returns only the instances whose cache actually changed; an empty
    /// report is the normal outcome for consistent data.
    pub fn reset(&self, options: &ResetOptions) -> Result<Vec<ResetReport>> {
        self.reset_with_progress(options, |_| {})
    }

    /// [`AccessControl::reset`], calling `on_type` before each type is processed.
    ///
    /// # Errors
    ///
    /// [`Error::UnknownEntityType`] for undeclared names in
    /// `options.entity_types`, a schema error for names that are not
    /// access-controlled, and the first reconciliation failure.
    pub fn reset_with_progress<F>(
        &self,
        options: &ResetOptions,
        mut on_type: F,
    ) -> Result<Vec<ResetReport>>
    where
        F: FnMut(&str),
    {
        let schema = self.store().schema();
        for name in &options.entity_types {
            if !schema.require(name)?.is_access_controlled() {
                return Err(Error::schema(format!("{name} is not access-controlled")));
            }
        }

        with_super_identity(|| {
            let mut reports = Vec::new();
            for entity in schema.controlled().filter(|e| options.selects(e)) {
                info!("Updating {}", entity.name);
                on_type(&entity.name);
                for mut record in self.store().fetch(&Query::all(&entity.name))? {
                    let changed = self.reconcile(&mut record)?;
                    if !changed.is_empty() {
                        let report = ResetReport {
                            entity_type: entity.name.clone(),
                            id: record.id(),
                            changed,
                        };
                        info!("{report}");
                        reports.push(report);
                    }
                }
            }
            Ok(reports)
        })
    }
}
