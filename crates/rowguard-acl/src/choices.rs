//! Candidate sets for form fields that reference records.
//!
//! A form field offering a choice among records must show only the records
//! the acting identity can see. [`ChoiceTable`] declares, per form and
//! field, how that candidate set is rebuilt; an undeclared field is a
//! [`Error::FormFieldPolicy`] fault rather than a silently unfiltered list.

use rowguard_core::{Error, Result};
use rowguard_storage::{Predicate, Query, Record};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::control::AccessControl;

/// Closure building a candidate set.
pub type CandidateFn = dyn Fn(&AccessControl) -> Result<Vec<Record>> + Send + Sync;

/// How a form field's candidates are produced.
#[derive(Clone)]
pub enum CandidateSource {
    /// Records of a related type, optionally narrowed.
    Related {
        /// Related entity type.
        entity_type: String,
        /// Extra condition applied on top of the access filter.
        limit: Option<Predicate>,
    },
    /// A custom builder.
    Custom(Arc<CandidateFn>),
}

impl fmt::Debug for CandidateSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Related { entity_type, limit } => f
                .debug_struct("Related")
                .field("entity_type", entity_type)
                .field("limit", limit)
                .finish(),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Declared candidate sources keyed by form and field.
#[derive(Clone, Debug, Default)]
pub struct ChoiceTable {
    sources: BTreeMap<(String, String), CandidateSource>,
}

impl ChoiceTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a source for `form.field`.
    pub fn declare(
        mut self,
        form: impl Into<String>,
        field: impl Into<String>,
        source: CandidateSource,
    ) -> Self {
        self.sources.insert((form.into(), field.into()), source);
        self
    }

    /// Declares `form.field` as offering records of `entity_type`.
    pub fn related(
        self,
        form: impl Into<String>,
        field: impl Into<String>,
        entity_type: impl Into<String>,
    ) -> Self {
        self.declare(
            form,
            field,
            CandidateSource::Related {
                entity_type: entity_type.into(),
                limit: None,
            },
        )
    }

    /// Declares `form.field` with a custom builder.
    pub fn custom<F>(self, form: impl Into<String>, field: impl Into<String>, build: F) -> Self
    where
        F: Fn(&AccessControl) -> Result<Vec<Record>> + Send + Sync + 'static,
    {
        self.declare(form, field, CandidateSource::Custom(Arc::new(build)))
    }

    /// Candidates for `form.field`, as seen by the acting identity.
    ///
    /// Related types that are not access-controlled are read unfiltered.
    pub fn candidates(
        &self,
        control: &AccessControl,
        form: &str,
        field: &str,
    ) -> Result<Vec<Record>> {
        let source = self
            .sources
            .get(&(form.to_string(), field.to_string()))
            .ok_or_else(|| Error::FormFieldPolicy {
                form: form.to_string(),
                field: field.to_string(),
            })?;
        match source {
            CandidateSource::Related { entity_type, limit } => {
                let mut query = Query::all(entity_type);
                if let Some(limit) = limit {
                    query = query.filter(limit.clone());
                }
                if control.registry().is_controlled(entity_type) {
                    control.objects(entity_type)?.fetch(query)
                } else {
                    control.store().fetch(&query)
                }
            }
            CandidateSource::Custom(build) => build(control),
        }
    }
}
