//! Backend and route extraction from an OpenAPI document.
//!
//! The document declares its backends under a top-level `x-transportd`
//! extension and binds operations to them with an `x-transportd.backend`
//! field on the operation (or on the path item, as a fallback for every
//! operation of that path):
//!
//! ```yaml
//! openapi: 3.0.0
//! x-transportd:
//!   backends:
//!     - app
//!   app:
//!     host: "http://app:8081"
//!     pool:
//!       ttl: "24h"
//!       count: 1
//! paths:
//!   /healthcheck:
//!     get:
//!       x-transportd:
//!         backend: app
//! ```

use crate::error::ConfigError;
use http::Method;
use http::uri::{Authority, Scheme};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fmt;
use std::time::Duration;

/// Name of the vendor extension carrying transport metadata
pub const EXTENSION: &str = "x-transportd";

/// A named upstream with its own connection pool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendSpec {
    pub name: String,
    pub scheme: Scheme,
    pub authority: Authority,
    /// Path prefix of the declared host, without trailing slash (often empty)
    pub base_path: String,
    /// Lifetime of one pooled client before it is recycled
    pub ttl: Option<Duration>,
    /// Number of independent pooled clients, used round-robin
    pub count: usize,
}

impl BackendSpec {
    /// The declared host, rendered back as a URL
    #[must_use]
    pub fn host(&self) -> String {
        format!("{}://{}{}", self.scheme, self.authority, self.base_path)
    }
}

/// One operation routed to a backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteBinding {
    pub method: Method,
    /// OpenAPI path template, e.g. `/users/{id}`
    pub path: String,
    pub backend: String,
}

impl fmt::Display for RouteBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} -> {}", self.method, self.path, self.backend)
    }
}

/// Backends and bindings extracted from an annotated OpenAPI document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportdDocument {
    pub backends: Vec<BackendSpec>,
    pub routes: Vec<RouteBinding>,
}

#[derive(Deserialize)]
struct ExtensionDecl {
    #[serde(default)]
    backends: Vec<String>,
    #[serde(flatten)]
    declarations: Map<String, Value>,
}

#[derive(Deserialize)]
struct BackendDecl {
    host: String,
    #[serde(default)]
    pool: PoolDecl,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct PoolDecl {
    ttl: Option<String>,
    count: Option<usize>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct BindingDecl {
    backend: Option<String>,
}

impl TransportdDocument {
    /// Parse YAML or JSON OpenAPI text.
    ///
    /// # Errors
    /// Returns a [`ConfigError`] describing the first structural problem:
    /// empty text, unparseable or non-OpenAPI document, missing extension,
    /// malformed or undeclared backends, bindings to unknown backends, or a
    /// document that routes nothing.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        if text.trim().is_empty() {
            return Err(ConfigError::MissingOpenApi);
        }

        let root: Value = serde_saphyr::from_str(text).map_err(|e| invalid(e.to_string()))?;
        let Value::Object(root) = root else {
            return Err(invalid("document root must be a mapping"));
        };
        check_version(&root)?;

        let extension = root.get(EXTENSION).ok_or(ConfigError::MissingExtension)?;
        let extension: ExtensionDecl = serde_json::from_value(extension.clone())
            .map_err(|e| invalid(format!("malformed `{EXTENSION}` extension: {e}")))?;

        let backends = parse_backends(&extension)?;
        let declared: HashSet<&str> = backends.iter().map(|b| b.name.as_str()).collect();
        let routes = parse_routes(&root, &declared)?;

        if routes.is_empty() {
            return Err(ConfigError::NoRoutes);
        }

        Ok(Self { backends, routes })
    }
}

fn check_version(root: &Map<String, Value>) -> Result<(), ConfigError> {
    let version = match root.get("openapi") {
        Some(Value::String(v)) => v.trim().to_owned(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    };
    if version.is_empty() {
        return Err(invalid("missing `openapi` version field"));
    }
    Ok(())
}

fn parse_backends(extension: &ExtensionDecl) -> Result<Vec<BackendSpec>, ConfigError> {
    let mut seen = HashSet::new();
    let mut backends = Vec::with_capacity(extension.backends.len());

    for name in &extension.backends {
        if !seen.insert(name.as_str()) {
            return Err(ConfigError::InvalidBackend {
                backend: name.clone(),
                reason: "listed more than once".to_owned(),
            });
        }

        let raw = extension
            .declarations
            .get(name)
            .ok_or_else(|| ConfigError::UndeclaredBackend {
                backend: name.clone(),
            })?;
        let decl: BackendDecl =
            serde_json::from_value(raw.clone()).map_err(|e| bad_backend(name, e.to_string()))?;

        backends.push(backend_spec(name, decl)?);
    }

    Ok(backends)
}

fn backend_spec(name: &str, decl: BackendDecl) -> Result<BackendSpec, ConfigError> {
    let host: http::Uri = decl
        .host
        .parse()
        .map_err(|e: http::uri::InvalidUri| bad_backend(name, format!("host: {e}")))?;

    let scheme = match host.scheme() {
        Some(s) if *s == Scheme::HTTP || *s == Scheme::HTTPS => s.clone(),
        _ => return Err(bad_backend(name, "host must be an http:// or https:// URL")),
    };
    let authority = host
        .authority()
        .cloned()
        .ok_or_else(|| bad_backend(name, "host has no authority"))?;
    if host.query().is_some() {
        return Err(bad_backend(name, "host must not carry a query"));
    }
    let base_path = host.path().trim_end_matches('/').to_owned();

    let ttl = decl
        .pool
        .ttl
        .as_deref()
        .map(humantime::parse_duration)
        .transpose()
        .map_err(|e| bad_backend(name, format!("pool.ttl: {e}")))?;

    let count = decl.pool.count.unwrap_or(1);
    if count == 0 {
        return Err(bad_backend(name, "pool.count must be at least 1"));
    }

    Ok(BackendSpec {
        name: name.to_owned(),
        scheme,
        authority,
        base_path,
        ttl,
        count,
    })
}

fn parse_routes(
    root: &Map<String, Value>,
    declared: &HashSet<&str>,
) -> Result<Vec<RouteBinding>, ConfigError> {
    let paths = match root.get("paths") {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Object(paths)) => paths,
        Some(_) => return Err(invalid("`paths` must be a mapping")),
    };

    let mut routes = Vec::new();
    for (template, item) in paths {
        let Value::Object(item) = item else {
            return Err(invalid(format!("path item '{template}' must be a mapping")));
        };
        let path_backend = binding_backend(item, template)?;

        for (key, operation) in item {
            let Some(method) = operation_method(key) else {
                continue;
            };
            let Value::Object(operation) = operation else {
                return Err(invalid(format!(
                    "operation {method} {template} must be a mapping"
                )));
            };

            let backend = match binding_backend(operation, template)? {
                Some(backend) => backend,
                None => match &path_backend {
                    Some(backend) => backend.clone(),
                    None => {
                        tracing::warn!(
                            %method,
                            path = %template,
                            "operation has no backend binding; requests to it will not be routed"
                        );
                        continue;
                    }
                },
            };

            if !declared.contains(backend.as_str()) {
                return Err(ConfigError::UnknownBackend {
                    method,
                    path: template.clone(),
                    backend,
                });
            }

            routes.push(RouteBinding {
                method,
                path: template.clone(),
                backend,
            });
        }
    }

    Ok(routes)
}

fn binding_backend(
    object: &Map<String, Value>,
    template: &str,
) -> Result<Option<String>, ConfigError> {
    let Some(raw) = object.get(EXTENSION) else {
        return Ok(None);
    };
    let binding: BindingDecl = serde_json::from_value(raw.clone())
        .map_err(|e| invalid(format!("malformed `{EXTENSION}` under '{template}': {e}")))?;
    Ok(binding.backend)
}

fn operation_method(key: &str) -> Option<Method> {
    match key {
        "get" => Some(Method::GET),
        "put" => Some(Method::PUT),
        "post" => Some(Method::POST),
        "delete" => Some(Method::DELETE),
        "options" => Some(Method::OPTIONS),
        "head" => Some(Method::HEAD),
        "patch" => Some(Method::PATCH),
        "trace" => Some(Method::TRACE),
        _ => None,
    }
}

fn invalid(reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidOpenApi {
        reason: reason.into(),
    }
}

fn bad_backend(name: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidBackend {
        backend: name.to_owned(),
        reason: reason.into(),
    }
}
