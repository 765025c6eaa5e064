use thiserror::Error;

/// Classification of URL validation failures.
///
/// Provides programmatic matching for different failure modes without
/// relying on unstable error message strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum InvalidUriKind {
    /// URL could not be parsed (malformed syntax)
    ParseError,
    /// URL is missing required host/authority component
    MissingAuthority,
    /// URL scheme is neither `http` nor `https`
    UnsupportedScheme,
}

/// Errors raised while turning configuration into a [`Transport`](crate::Transport).
///
/// These are fatal: they surface once, at construction, and are never retried.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ConfigError {
    /// The `type` discriminator named no known transport
    #[error("unrecognized transport type '{value}' (expected DEFAULT or SMART)")]
    UnknownType { value: String },

    /// A settings section exists but does not deserialize
    #[error("invalid settings in section '{section}': {source}")]
    InvalidSettings {
        section: String,
        #[source]
        source: serde_json::Error,
    },

    /// The settings provider itself failed (bad YAML file, env parse, ...)
    #[error("failed to load settings: {0}")]
    Source(#[source] Box<figment::Error>),

    /// Smart mode was selected without an OpenAPI document
    #[error("smart transport requires a non-empty `openapi` document")]
    MissingOpenApi,

    /// The OpenAPI text is not a structured API document
    #[error("invalid OpenAPI document: {reason}")]
    InvalidOpenApi { reason: String },

    /// The document carries no top-level `x-transportd` extension
    #[error("OpenAPI document has no top-level `x-transportd` extension")]
    MissingExtension,

    /// A backend is listed in `backends` but never declared
    #[error("backend '{backend}' is listed but has no declaration")]
    UndeclaredBackend { backend: String },

    /// A backend declaration is malformed
    #[error("invalid backend '{backend}': {reason}")]
    InvalidBackend { backend: String, reason: String },

    /// An operation is bound to a backend that was never declared
    #[error("{method} {path} is bound to unknown backend '{backend}'")]
    UnknownBackend {
        method: http::Method,
        path: String,
        backend: String,
    },

    /// A path template could not be registered in the router
    #[error("invalid route {method} {path}: {source}")]
    InvalidRoute {
        method: http::Method,
        path: String,
        #[source]
        source: matchit::InsertError,
    },

    /// The document binds no operation to any backend
    #[error("OpenAPI document binds no operation to a backend")]
    NoRoutes,

    /// A configured header value (e.g. default content type) is invalid
    #[error("invalid header value: {0}")]
    InvalidHeaderValue(#[from] http::header::InvalidHeaderValue),

    /// TLS initialization failed
    #[error("TLS error: {0}")]
    Tls(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        ConfigError::Source(Box::new(err))
    }
}

/// Per-request errors raised while executing a request through a transport
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum HttpError {
    /// Request building failed
    #[error("Failed to build request: {0}")]
    RequestBuild(#[from] http::Error),

    /// Invalid header name
    #[error("Invalid header name: {0}")]
    InvalidHeaderName(#[from] http::header::InvalidHeaderName),

    /// Invalid header value
    #[error("Invalid header value: {0}")]
    InvalidHeaderValue(#[from] http::header::InvalidHeaderValue),

    /// Request attempt timed out
    #[error("Request timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// Transport error (network, connection, TLS handshake, etc)
    #[error("Transport error: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// No smart-transport binding matches the request
    #[error("no backend route for {method} {path}")]
    NoRoute { method: http::Method, path: String },

    /// Response body exceeded size limit
    #[error("Response body too large: limit {limit} bytes, got {actual} bytes")]
    BodyTooLarge { limit: usize, actual: usize },

    /// HTTP non-2xx status
    #[error("HTTP {status}: {body_preview}")]
    HttpStatus {
        status: http::StatusCode,
        body_preview: String,
        content_type: Option<String>,
    },

    /// JSON encoding or parsing error
    #[error("JSON processing failed: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid URL (failed to parse)
    ///
    /// Use the `kind` field for programmatic matching. The `reason` field is
    /// a diagnostic message for logging only.
    #[error("Invalid URL '{url}': {reason}")]
    InvalidUri {
        url: String,
        kind: InvalidUriKind,
        reason: String,
    },
}

impl From<hyper::Error> for HttpError {
    fn from(err: hyper::Error) -> Self {
        HttpError::Transport(Box::new(err))
    }
}

impl From<hyper_util::client::legacy::Error> for HttpError {
    fn from(err: hyper_util::client::legacy::Error) -> Self {
        HttpError::Transport(Box::new(err))
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use std::error::Error;
    use std::fmt;

    #[derive(Debug)]
    struct TestError(&'static str);

    impl fmt::Display for TestError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{}", self.0)
        }
    }

    impl Error for TestError {}

    #[test]
    fn test_transport_error_preserves_source() {
        let err = HttpError::Transport(Box::new(TestError("connection refused")));

        let source = err.source().unwrap();
        let downcast = source.downcast_ref::<TestError>();
        assert_eq!(downcast.unwrap().0, "connection refused");
    }

    #[test]
    fn test_tls_config_error_preserves_source() {
        let err = ConfigError::Tls(Box::new(TestError("no roots")));

        let source = err.source().unwrap();
        assert_eq!(source.downcast_ref::<TestError>().unwrap().0, "no roots");
    }

    #[test]
    fn test_unknown_type_message_names_value() {
        let err = ConfigError::UnknownType {
            value: "MISSING".to_owned(),
        };
        assert!(err.to_string().contains("'MISSING'"));
    }

    #[test]
    fn test_no_route_message() {
        let err = HttpError::NoRoute {
            method: http::Method::GET,
            path: "/nowhere".to_owned(),
        };
        assert_eq!(err.to_string(), "no backend route for GET /nowhere");
    }
}
