use crate::error::ConfigError;
use http::header::CONTENT_TYPE;
use http::{HeaderValue, Request, Response};
use std::task::{Context, Poll};
use tower::{Layer, Service};

/// Tower layer that supplies a `Content-Type` when a request has none
///
/// A header that is present with an empty value counts as missing. Any
/// non-empty value set by the caller is left untouched.
#[derive(Clone)]
pub struct ContentTypeLayer {
    content_type: HeaderValue,
}

impl ContentTypeLayer {
    /// Create a new `ContentTypeLayer` injecting the given media type
    ///
    /// # Errors
    /// Returns `ConfigError::InvalidHeaderValue` if the value is not a valid header value
    pub fn try_new(content_type: impl AsRef<str>) -> Result<Self, ConfigError> {
        let content_type = HeaderValue::from_str(content_type.as_ref())?;
        Ok(Self { content_type })
    }
}

impl<S> Layer<S> for ContentTypeLayer {
    type Service = ContentTypeService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ContentTypeService {
            inner,
            content_type: self.content_type.clone(),
        }
    }
}

/// Service that fills in a default `Content-Type` header
#[derive(Clone)]
pub struct ContentTypeService<S> {
    inner: S,
    content_type: HeaderValue,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for ContentTypeService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>>,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = S::Future;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<ReqBody>) -> Self::Future {
        let missing = req
            .headers()
            .get(CONTENT_TYPE)
            .is_none_or(|value| value.is_empty());
        if missing {
            req.headers_mut()
                .insert(CONTENT_TYPE, self.content_type.clone());
        }
        self.inner.call(req)
    }
}
