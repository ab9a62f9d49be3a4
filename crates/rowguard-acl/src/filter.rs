//! The read-side gate.
//!
//! Every default read of a controlled type passes through
//! [`apply_access_filter`], which narrows the query to the records the acting
//! identity may see.

use log::warn;
use rowguard_core::config::config;
use rowguard_core::context::established_identity;
use rowguard_core::{AccessLevel, AllowList, Identity};
use rowguard_storage::{Column, Predicate, Query};

/// Identity an operation acts as.
///
/// Uses `identity_override` when given, otherwise the established identity.
/// When neither exists a warning is logged and the configured default
/// identity applies, which is anonymous unless configured otherwise.
pub fn resolve_identity(identity_override: Option<Identity>) -> Identity {
    identity_override
        .or_else(established_identity)
        .unwrap_or_else(|| {
            let fallback = config().default_identity();
            if fallback == Identity::Anonymous {
                warn!("No acting identity established for this operation; only PUBLIC records will be returned");
            } else {
                warn!("No acting identity established for this operation; acting as default identity {fallback}");
            }
            fallback
        })
}

/// Predicate restricting reads to what `identity` may see.
///
/// `None` means no restriction.
///
/// # Examples
///
/// ```
/// use rowguard_acl::filter::access_predicate;
/// use rowguard_core::Identity;
///
/// assert!(access_predicate(&Identity::Super).is_none());
/// let sql = access_predicate(&Identity::user(7)).unwrap().to_sql();
/// assert_eq!(sql.params.len(), 3);
/// ```
pub fn access_predicate(identity: &Identity) -> Option<Predicate> {
    match identity {
        Identity::Super => None,
        Identity::Anonymous => Some(Predicate::eq(
            Column::AccessLevel,
            AccessLevel::Public.as_str(),
        )),
        Identity::User(user) => Some(Predicate::Or(vec![
            Predicate::ne(Column::AccessLevel, AccessLevel::Restricted.as_str()),
            Predicate::And(vec![
                Predicate::eq(Column::AccessLevel, AccessLevel::Restricted.as_str()),
                Predicate::Contains(Column::PermittedUsers, AllowList::needle(*user)),
            ]),
        ])),
    }
}

/// Narrows `query` for `identity_override` or the acting identity.
pub fn apply_access_filter(query: Query, identity_override: Option<Identity>) -> Query {
    match access_predicate(&resolve_identity(identity_override)) {
        Some(predicate) => query.filter(predicate),
        None => query,
    }
}
