use crate::config::DEFAULT_CONTENT_TYPE;
use crate::error::{HttpError, InvalidUriKind};
use crate::response::HttpResponse;
use crate::transport::{Transport, TransportKind};
use bytes::Bytes;
use http::Request;
use http::header::{CONTENT_TYPE, HeaderName, HeaderValue};
use http_body_util::Full;
use serde::Serialize;

#[derive(Clone, Debug)]
enum BodyKind {
    Empty,
    Bytes(Bytes),
    /// Serialized JSON
    Json(Bytes),
}

/// Fluent request builder created by [`HttpClient`](crate::HttpClient) verbs.
///
/// Invalid header names or values are captured and reported by
/// [`send`](Self::send) (or by [`json`](Self::json), which already returns a
/// `Result`).
///
/// # URLs
///
/// Default transports need an absolute `http://` or `https://` URL. Smart
/// transports also accept a bare path such as `/users/42`: the backend
/// bound to the matching operation supplies scheme and host.
#[must_use = "RequestBuilder does nothing until .send() is called"]
pub struct RequestBuilder {
    transport: Transport,
    max_body_size: usize,
    method: http::Method,
    url: String,
    headers: Vec<(HeaderName, HeaderValue)>,
    body: BodyKind,
    /// Error captured during building (deferred to `send()`)
    error: Option<HttpError>,
}

impl std::fmt::Debug for RequestBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestBuilder")
            .field("transport", &self.transport)
            .field("method", &self.method)
            .field("url", &self.url)
            .field("headers", &self.headers.len())
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}

impl RequestBuilder {
    pub(crate) fn new(
        transport: Transport,
        max_body_size: usize,
        method: http::Method,
        url: String,
    ) -> Self {
        Self {
            transport,
            max_body_size,
            method,
            url,
            headers: Vec::new(),
            body: BodyKind::Empty,
            error: None,
        }
    }

    /// Add a single header
    pub fn header(mut self, name: &str, value: &str) -> Self {
        if self.error.is_none() {
            self.push_header(name, value);
        }
        self
    }

    /// Add several headers; stops at the first invalid one
    pub fn headers<I, K, V>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (name, value) in headers {
            if self.error.is_some() {
                break;
            }
            self.push_header(name.as_ref(), value.as_ref());
        }
        self
    }

    fn push_header(&mut self, name: &str, value: &str) {
        match (HeaderName::try_from(name), HeaderValue::try_from(value)) {
            (Ok(name), Ok(value)) => self.headers.push((name, value)),
            (Err(e), _) => self.error = Some(HttpError::InvalidHeaderName(e)),
            (_, Err(e)) => self.error = Some(HttpError::InvalidHeaderValue(e)),
        }
    }

    /// Serialize `body` as JSON.
    ///
    /// `Content-Type: application/json` is added at send time unless a
    /// content type header was set on this builder.
    ///
    /// # Errors
    /// Returns a previously captured header error, or [`HttpError::Json`]
    /// if serialization fails.
    pub fn json<T: Serialize>(mut self, body: &T) -> Result<Self, HttpError> {
        if let Some(e) = self.error.take() {
            return Err(e);
        }

        self.body = BodyKind::Json(Bytes::from(serde_json::to_vec(body)?));
        Ok(self)
    }

    /// Raw body. With no explicit content type, a default transport labels
    /// it with its configured content type.
    pub fn body_bytes(mut self, body: Bytes) -> Self {
        self.body = BodyKind::Bytes(body);
        self
    }

    pub fn body_string(mut self, body: String) -> Self {
        self.body = BodyKind::Bytes(Bytes::from(body));
        self
    }

    fn parse_url(&self) -> Result<http::Uri, HttpError> {
        let invalid = |kind, reason: String| HttpError::InvalidUri {
            url: self.url.clone(),
            kind,
            reason,
        };

        let uri: http::Uri = self
            .url
            .parse()
            .map_err(|e: http::uri::InvalidUri| invalid(InvalidUriKind::ParseError, e.to_string()))?;

        match uri.scheme_str() {
            Some("http" | "https") => {}
            Some(other) => {
                return Err(invalid(
                    InvalidUriKind::UnsupportedScheme,
                    format!("unsupported scheme '{other}'"),
                ));
            }
            None if self.transport.kind() == TransportKind::Smart && uri.path().starts_with('/') => {
                return Ok(uri);
            }
            None => {}
        }

        if uri.authority().is_none() {
            return Err(invalid(
                InvalidUriKind::MissingAuthority,
                "missing scheme or host".to_owned(),
            ));
        }
        Ok(uri)
    }

    /// Send the request.
    ///
    /// Every HTTP status is a successful send; use
    /// [`HttpResponse::error_for_status`] or the checked body readers to
    /// reject non-2xx.
    ///
    /// # Errors
    /// Returns [`HttpError`] for builder errors, invalid URLs, transport
    /// failures, timeouts and unmatched smart routes.
    pub async fn send(mut self) -> Result<HttpResponse, HttpError> {
        if let Some(e) = self.error.take() {
            return Err(e);
        }

        let uri = self.parse_url()?;
        let mut builder = Request::builder().method(self.method).uri(uri);

        let has_content_type = self.headers.iter().any(|(name, _)| name == CONTENT_TYPE);
        if !has_content_type && matches!(self.body, BodyKind::Json(_)) {
            builder = builder.header(CONTENT_TYPE, HeaderValue::from_static(DEFAULT_CONTENT_TYPE));
        }
        for (name, value) in self.headers {
            builder = builder.header(name, value);
        }

        let body = match self.body {
            BodyKind::Empty => Bytes::new(),
            BodyKind::Bytes(b) | BodyKind::Json(b) => b,
        };
        let request = builder.body(Full::new(body))?;

        let inner = self.transport.send(request).await?;
        Ok(HttpResponse {
            inner,
            max_body_size: self.max_body_size,
        })
    }
}
