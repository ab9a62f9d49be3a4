//! Mapping an incoming request to the identity it acts as.

use axum::body::Body;
use http::Request;
use rowguard_core::Identity;
use rowguard_core::config::config;

use crate::user::AuthenticatedUser;

/// Resolves the acting identity of a request.
///
/// Called exactly once per request, before the inner service runs.
pub trait IdentityResolver: Send + Sync + 'static {
    /// Identity the request acts as.
    fn resolve(&self, request: &Request<Body>) -> Identity;
}

impl<F> IdentityResolver for F
where
    F: Fn(&Request<Body>) -> Identity + Send + Sync + 'static,
{
    fn resolve(&self, request: &Request<Body>) -> Identity {
        self(request)
    }
}

/// Reads [`AuthenticatedUser`] from the request extensions.
///
/// - superuser: [`Identity::Super`]
/// - authenticated user: the identity for its raw id (marker ids map to their markers)
/// - no user: the configured default identity
#[derive(Debug, Clone, Copy, Default)]
pub struct ExtensionIdentityResolver;

impl IdentityResolver for ExtensionIdentityResolver {
    fn resolve(&self, request: &Request<Body>) -> Identity {
        let config = config();
        match request.extensions().get::<AuthenticatedUser>() {
            Some(user) if user.is_superuser => Identity::Super,
            Some(user) => config.identity_for(user.user_id),
            None => config.default_identity(),
        }
    }
}
