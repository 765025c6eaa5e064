use super::document::TransportdDocument;
use super::pool::BackendPool;
use crate::config::SmartSettings;
use crate::connector::{ClientFactory, send_pooled};
use crate::error::{ConfigError, HttpError};
use crate::transport::{ResponseBody, TransportFuture, TransportRequest};
use http::{Method, Response};
use std::collections::HashMap;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::Service;

/// Path templates of one HTTP method, resolved to backend indexes
struct RouteMatcher {
    matcher: matchit::Router<usize>,
}

impl RouteMatcher {
    fn new() -> Self {
        Self {
            matcher: matchit::Router::new(),
        }
    }

    fn insert(&mut self, path: &str, backend: usize) -> Result<(), matchit::InsertError> {
        self.matcher.insert(path, backend)
    }

    fn find(&self, path: &str) -> Option<usize> {
        self.matcher.at(path).ok().map(|m| *m.value)
    }
}

/// Immutable method+path routing table over the backend pools
pub struct RouteTable {
    matchers: HashMap<Method, RouteMatcher>,
    pools: Vec<BackendPool>,
    routes: usize,
}

impl RouteTable {
    /// Create one pool per backend and register every binding.
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidRoute`] for path templates the router
    /// rejects (conflicts, malformed parameters) and [`ConfigError::Tls`]
    /// if a backend connector cannot be created.
    pub(crate) fn build(
        document: &TransportdDocument,
        settings: &SmartSettings,
    ) -> Result<Self, ConfigError> {
        let mut pools = Vec::with_capacity(document.backends.len());
        let mut indexes = HashMap::with_capacity(document.backends.len());

        for spec in &document.backends {
            let factory = ClientFactory::new(settings.connector(spec.ttl))?;
            let pool = BackendPool::new(spec, factory);
            tracing::debug!(
                backend = pool.name(),
                host = %spec.host(),
                ttl = ?spec.ttl,
                count = pool.size(),
                "created backend pool"
            );
            indexes.insert(spec.name.as_str(), pools.len());
            pools.push(pool);
        }

        let mut matchers: HashMap<Method, RouteMatcher> = HashMap::new();
        for binding in &document.routes {
            let Some(&index) = indexes.get(binding.backend.as_str()) else {
                return Err(ConfigError::UnknownBackend {
                    method: binding.method.clone(),
                    path: binding.path.clone(),
                    backend: binding.backend.clone(),
                });
            };

            matchers
                .entry(binding.method.clone())
                .or_insert_with(RouteMatcher::new)
                .insert(&binding.path, index)
                .map_err(|source| ConfigError::InvalidRoute {
                    method: binding.method.clone(),
                    path: binding.path.clone(),
                    source,
                })?;
        }

        Ok(Self {
            matchers,
            pools,
            routes: document.routes.len(),
        })
    }

    pub(crate) fn resolve(&self, method: &Method, path: &str) -> Option<&BackendPool> {
        let index = self.matchers.get(method)?.find(path)?;
        self.pools.get(index)
    }

    pub(crate) fn backend_count(&self) -> usize {
        self.pools.len()
    }

    pub(crate) fn route_count(&self) -> usize {
        self.routes
    }
}

/// Dispatches each request to the pool of the backend its operation is bound to
#[derive(Clone)]
pub struct SmartRouter {
    table: Arc<RouteTable>,
}

impl SmartRouter {
    pub(crate) fn new(table: RouteTable) -> Self {
        Self {
            table: Arc::new(table),
        }
    }

    fn route(&self, mut request: TransportRequest) -> TransportFuture {
        let method = request.method().clone();
        let path = request.uri().path().to_owned();

        let Some(pool) = self.table.resolve(&method, &path) else {
            tracing::debug!(%method, %path, "no backend bound to request");
            return Box::pin(std::future::ready(Err(HttpError::NoRoute { method, path })));
        };

        let target = match pool.target_uri(request.uri()) {
            Ok(target) => target,
            Err(err) => return Box::pin(std::future::ready(Err(err))),
        };
        tracing::debug!(%method, %path, backend = pool.name(), %target, "routing request");

        *request.uri_mut() = target;
        send_pooled(&pool.client(), request)
    }
}

impl Service<TransportRequest> for SmartRouter {
    type Response = Response<ResponseBody>;
    type Error = HttpError;
    type Future = TransportFuture;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: TransportRequest) -> Self::Future {
        self.route(request)
    }
}
