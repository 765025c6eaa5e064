use crate::error::HttpError;
use crate::transport::ResponseBody;
use bytes::Bytes;
use http::{HeaderMap, Response, StatusCode};
use http_body::Frame;
use http_body_util::BodyExt;
use pin_project_lite::pin_project;
use serde::de::DeserializeOwned;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Default limit for buffered response bodies
pub const DEFAULT_MAX_BODY_SIZE: usize = 10 * 1024 * 1024;

/// Bytes of a non-2xx body kept in [`HttpError::HttpStatus`]
pub const ERROR_BODY_PREVIEW_LIMIT: usize = 8 * 1024;

pin_project! {
    /// Streaming body that fails with [`HttpError::BodyTooLarge`] once more
    /// than `limit` data bytes have been read.
    ///
    /// Created by [`HttpResponse::into_limited_body()`].
    pub struct LimitedBody {
        #[pin]
        inner: ResponseBody,
        limit: usize,
        read: usize,
    }
}

impl LimitedBody {
    #[must_use]
    pub fn new(inner: ResponseBody, limit: usize) -> Self {
        Self {
            inner,
            limit,
            read: 0,
        }
    }

    /// Data bytes read so far
    #[must_use]
    pub fn bytes_read(&self) -> usize {
        self.read
    }

    #[must_use]
    pub fn limit(&self) -> usize {
        self.limit
    }
}

impl http_body::Body for LimitedBody {
    type Data = Bytes;
    type Error = HttpError;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.project();

        match this.inner.poll_frame(cx) {
            Poll::Ready(Some(Ok(frame))) => {
                if let Some(data) = frame.data_ref() {
                    *this.read += data.len();
                    if *this.read > *this.limit {
                        return Poll::Ready(Some(Err(HttpError::BodyTooLarge {
                            limit: *this.limit,
                            actual: *this.read,
                        })));
                    }
                }
                Poll::Ready(Some(Ok(frame)))
            }
            Poll::Ready(Some(Err(e))) => Poll::Ready(Some(Err(HttpError::Transport(e)))),
            Poll::Ready(None) => Poll::Ready(None),
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Response returned by [`RequestBuilder::send`](crate::RequestBuilder::send).
///
/// Buffered reads (`bytes`, `checked_bytes`, `json`, `text`) enforce
/// `max_body_size`; the `checked_*`, `json` and `text` variants also turn a
/// non-2xx status into [`HttpError::HttpStatus`].
#[derive(Debug)]
pub struct HttpResponse {
    pub(crate) inner: Response<ResponseBody>,
    pub(crate) max_body_size: usize,
}

impl HttpResponse {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.inner.status()
    }

    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        self.inner.headers()
    }

    /// The raw response, body unread
    #[must_use]
    pub fn into_inner(self) -> Response<ResponseBody> {
        self.inner
    }

    /// Fail on non-2xx without reading the body.
    ///
    /// # Errors
    /// Returns [`HttpError::HttpStatus`] with an empty preview.
    pub fn error_for_status(self) -> Result<Self, HttpError> {
        if self.inner.status().is_success() {
            return Ok(self);
        }

        Err(HttpError::HttpStatus {
            status: self.inner.status(),
            body_preview: String::new(),
            content_type: content_type(self.inner.headers()),
        })
    }

    /// Read the whole body regardless of status.
    ///
    /// # Errors
    /// Returns [`HttpError::BodyTooLarge`] past `max_body_size`, or
    /// [`HttpError::Transport`] if the connection fails mid-body.
    pub async fn bytes(self) -> Result<Bytes, HttpError> {
        read_limited(self.inner, self.max_body_size).await
    }

    /// Read the whole body of a 2xx response.
    ///
    /// # Errors
    /// Returns [`HttpError::HttpStatus`] (with up to
    /// [`ERROR_BODY_PREVIEW_LIMIT`] bytes of the body) for non-2xx, and the
    /// errors of [`bytes`](Self::bytes) otherwise.
    pub async fn checked_bytes(self) -> Result<Bytes, HttpError> {
        read_checked(self.inner, self.max_body_size).await
    }

    /// Deserialize a 2xx JSON body.
    ///
    /// # Errors
    /// As [`checked_bytes`](Self::checked_bytes), plus [`HttpError::Json`].
    pub async fn json<T: DeserializeOwned>(self) -> Result<T, HttpError> {
        let body = read_checked(self.inner, self.max_body_size).await?;
        Ok(serde_json::from_slice(&body)?)
    }

    /// Read a 2xx body as UTF-8, replacing invalid sequences.
    ///
    /// # Errors
    /// As [`checked_bytes`](Self::checked_bytes).
    pub async fn text(self) -> Result<String, HttpError> {
        let body = read_checked(self.inner, self.max_body_size).await?;
        Ok(String::from_utf8_lossy(&body).into_owned())
    }

    /// Unlimited body stream; prefer [`into_limited_body`](Self::into_limited_body)
    /// for untrusted peers.
    #[must_use]
    pub fn into_body(self) -> ResponseBody {
        self.inner.into_body()
    }

    /// Body stream capped at `max_body_size`.
    #[must_use]
    pub fn into_limited_body(self) -> LimitedBody {
        LimitedBody::new(self.inner.into_body(), self.max_body_size)
    }

    #[must_use]
    pub fn max_body_size(&self) -> usize {
        self.max_body_size
    }
}

fn content_type(headers: &HeaderMap) -> Option<String> {
    headers
        .get(http::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(String::from)
}

async fn read_checked(
    response: Response<ResponseBody>,
    max_body_size: usize,
) -> Result<Bytes, HttpError> {
    let status = response.status();
    if status.is_success() {
        return read_limited(response, max_body_size).await;
    }

    let content_type = content_type(response.headers());
    let preview_limit = max_body_size.min(ERROR_BODY_PREVIEW_LIMIT);
    // an oversized error body must not hide the status
    let body_preview = match read_limited(response, preview_limit).await {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(HttpError::BodyTooLarge { .. }) => "<body too large for preview>".to_owned(),
        Err(e) => return Err(e),
    };

    Err(HttpError::HttpStatus {
        status,
        body_preview,
        content_type,
    })
}

async fn read_limited(response: Response<ResponseBody>, limit: usize) -> Result<Bytes, HttpError> {
    let mut body = std::pin::pin!(response.into_body());
    let mut collected = Vec::new();

    while let Some(frame) = body.frame().await {
        let frame = frame.map_err(HttpError::Transport)?;
        if let Some(chunk) = frame.data_ref() {
            let actual = collected.len() + chunk.len();
            if actual > limit {
                return Err(HttpError::BodyTooLarge { limit, actual });
            }
            collected.extend_from_slice(chunk);
        }
    }

    Ok(Bytes::from(collected))
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::transport::box_response;
    use http_body_util::Full;

    fn response(status: u16, content_type: &str, body: &'static str) -> HttpResponse {
        let inner = Response::builder()
            .status(status)
            .header(http::header::CONTENT_TYPE, content_type)
            .body(Full::new(Bytes::from_static(body.as_bytes())))
            .unwrap();
        HttpResponse {
            inner: box_response(inner),
            max_body_size: DEFAULT_MAX_BODY_SIZE,
        }
    }

    #[test]
    fn test_error_for_status_passes_success() {
        let resp = response(204, "text/plain", "").error_for_status().unwrap();
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    }

    #[test]
    fn test_error_for_status_reports_content_type() {
        let err = response(503, "application/problem+json", "{}")
            .error_for_status()
            .unwrap_err();
        match err {
            HttpError::HttpStatus {
                status,
                body_preview,
                content_type,
            } => {
                assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
                assert!(body_preview.is_empty());
                assert_eq!(content_type.as_deref(), Some("application/problem+json"));
            }
            other => panic!("expected HttpStatus, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_checked_bytes_includes_preview() {
        let err = response(404, "text/plain", "no such user")
            .checked_bytes()
            .await
            .unwrap_err();
        match err {
            HttpError::HttpStatus { body_preview, .. } => assert_eq!(body_preview, "no such user"),
            other => panic!("expected HttpStatus, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_oversized_error_body_keeps_status() {
        let mut resp = response(500, "text/plain", "0123456789");
        resp.max_body_size = 4;
        match resp.text().await.unwrap_err() {
            HttpError::HttpStatus {
                status,
                body_preview,
                ..
            } => {
                assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
                assert_eq!(body_preview, "<body too large for preview>");
            }
            other => panic!("expected HttpStatus, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_json_and_text() {
        #[derive(serde::Deserialize)]
        struct Health {
            status: String,
        }

        let health: Health = response(200, "application/json", r#"{"status":"ok"}"#)
            .json()
            .await
            .unwrap();
        assert_eq!(health.status, "ok");

        let text = response(200, "text/plain", "pong").text().await.unwrap();
        assert_eq!(text, "pong");
    }

    #[tokio::test]
    async fn test_bytes_enforces_limit() {
        let mut resp = response(200, "text/plain", "0123456789");
        resp.max_body_size = 8;
        assert!(matches!(
            resp.bytes().await,
            Err(HttpError::BodyTooLarge {
                limit: 8,
                actual: 10
            })
        ));
    }

    #[tokio::test]
    async fn test_limited_body_stream() {
        let mut resp = response(200, "text/plain", "0123456789");
        resp.max_body_size = 5;
        let mut body = resp.into_limited_body();

        let frame = body.frame().await.unwrap();
        assert!(matches!(frame, Err(HttpError::BodyTooLarge { limit: 5, .. })));
        assert_eq!(body.bytes_read(), 10);
        assert_eq!(body.limit(), 5);
    }
}
