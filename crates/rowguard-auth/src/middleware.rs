//! Tower middleware that scopes each request in its acting identity.
//!
//! `AccessContextLayer` resolves the identity once per request and drives the
//! inner service's call inside [`scope_identity`], so every query issued by the
//! handler is filtered for that identity. The scope ends with the response
//! future; concurrent requests never observe each other's identity.

use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::response::IntoResponse;
use http::Request;
use rowguard_core::context::scope_identity;
use tower::{Layer, Service};

use crate::resolver::{ExtensionIdentityResolver, IdentityResolver};

/// Tower `Layer` that runs wrapped services under the request's identity.
#[derive(Clone)]
pub struct AccessContextLayer<R: IdentityResolver = ExtensionIdentityResolver> {
    resolver: Arc<R>,
}

impl AccessContextLayer {
    /// Layer using [`ExtensionIdentityResolver`].
    pub fn new() -> Self {
        Self::with_resolver(ExtensionIdentityResolver)
    }
}

impl Default for AccessContextLayer {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: IdentityResolver> AccessContextLayer<R> {
    /// Layer using a custom resolver.
    pub fn with_resolver(resolver: R) -> Self {
        Self {
            resolver: Arc::new(resolver),
        }
    }
}

impl<R: IdentityResolver, S> Layer<S> for AccessContextLayer<R> {
    type Service = AccessContextService<R, S>;

    fn layer(&self, inner: S) -> Self::Service {
        AccessContextService {
            inner,
            resolver: self.resolver.clone(),
        }
    }
}

/// Tower `Service` that forwards requests inside an identity scope.
#[derive(Clone)]
pub struct AccessContextService<R: IdentityResolver, S> {
    inner: S,
    resolver: Arc<R>,
}

impl<R, S> Service<Request<Body>> for AccessContextService<R, S>
where
    R: IdentityResolver,
    S: Service<Request<Body>, Error = Infallible> + Clone + Send + 'static,
    S::Response: IntoResponse,
    S::Future: Send,
{
    type Response = axum::response::Response;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        let identity = self.resolver.resolve(&req);
        log::debug!("{} {} acting as {identity}", req.method(), req.uri().path());

        Box::pin(scope_identity(identity, async move {
            let resp = inner
                .call(req)
                .await
                .unwrap_or_else(|infallible| match infallible {});
            Ok(resp.into_response())
        }))
    }
}
