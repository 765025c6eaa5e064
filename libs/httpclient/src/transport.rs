use crate::error::HttpError;
use bytes::Bytes;
use http::{Request, Response};
use http_body_util::{BodyExt, Full};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tower::util::BoxCloneSyncService;
use tower::{Service, ServiceExt};

/// Type alias for the boxed response body returned by every transport.
pub type ResponseBody =
    http_body_util::combinators::BoxBody<Bytes, Box<dyn std::error::Error + Send + Sync>>;

/// Request type accepted by every transport
pub type TransportRequest = Request<Full<Bytes>>;

/// Future returned by [`Transport`]'s `Service::call`
pub type TransportFuture =
    Pin<Box<dyn Future<Output = Result<Response<ResponseBody>, HttpError>> + Send>>;

/// Type-erased service stack behind a [`Transport`]
pub type TransportService =
    BoxCloneSyncService<TransportRequest, Response<ResponseBody>, HttpError>;

/// Which component produced a transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum TransportKind {
    /// Single pooled client with `Content-Type` defaulting
    Default,
    /// Per-backend pools routed by OpenAPI path bindings
    Smart,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportKind::Default => f.write_str("default"),
            TransportKind::Smart => f.write_str("smart"),
        }
    }
}

/// Executes outgoing HTTP requests; reusable across many requests.
///
/// `Transport` is `Clone + Send + Sync` and immutable after construction.
/// Clones share the underlying connection pools, so one transport can be
/// handed to any number of concurrent callers without external locking.
///
/// Build one with [`DefaultComponent`](crate::DefaultComponent),
/// [`SmartComponent`](crate::SmartComponent) or [`new_transport`](crate::new_transport).
#[derive(Clone)]
pub struct Transport {
    service: TransportService,
    kind: TransportKind,
}

impl Transport {
    pub(crate) fn new(kind: TransportKind, service: TransportService) -> Self {
        Self { service, kind }
    }

    /// The component that built this transport
    #[must_use]
    pub fn kind(&self) -> TransportKind {
        self.kind
    }

    /// Send a single request.
    ///
    /// Returns `Ok` for every HTTP status; only transport-level failures
    /// (connect, TLS, timeout, unmatched smart route) are errors.
    ///
    /// # Errors
    /// Returns [`HttpError`] when the request could not be executed.
    pub async fn send(&self, request: TransportRequest) -> Result<Response<ResponseBody>, HttpError> {
        self.service.clone().oneshot(request).await
    }
}

impl fmt::Debug for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transport")
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

impl Service<TransportRequest> for Transport {
    type Response = Response<ResponseBody>;
    type Error = HttpError;
    type Future = TransportFuture;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(cx)
    }

    fn call(&mut self, request: TransportRequest) -> Self::Future {
        Box::pin(self.service.call(request))
    }
}

/// Map tower errors to `HttpError` with the configured timeout duration.
///
/// Typed `HttpError`s boxed by tower middleware are passed through as-is.
pub fn map_tower_error(err: tower::BoxError, timeout: Duration) -> HttpError {
    if err.is::<tower::timeout::error::Elapsed>() {
        return HttpError::Timeout(timeout);
    }

    match err.downcast::<HttpError>() {
        Ok(http_err) => *http_err,
        Err(other) => HttpError::Transport(other),
    }
}

/// Wrap the service in a per-request timeout when one is configured.
pub fn with_timeout(service: TransportService, timeout: Option<Duration>) -> TransportService {
    match timeout {
        Some(timeout) => BoxCloneSyncService::new(
            tower::ServiceBuilder::new()
                .layer(tower::timeout::TimeoutLayer::new(timeout))
                .service(service)
                .map_err(move |e: tower::BoxError| map_tower_error(e, timeout)),
        ),
        None => service,
    }
}

/// Box an arbitrary response body into [`ResponseBody`].
pub fn box_response<B>(response: Response<B>) -> Response<ResponseBody>
where
    B: http_body::Body<Data = Bytes> + Send + Sync + 'static,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let (parts, body) = response.into_parts();
    Response::from_parts(parts, body.map_err(Into::into).boxed())
}
