#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![warn(warnings)]

//! Configurable HTTP client transports
//!
//! Two transport kinds are built from declarative settings:
//! - **DEFAULT**: one hyper connection pool (rustls TLS, HTTP/1.1 and
//!   HTTP/2) that adds `Content-Type: application/json` to requests carrying
//!   no content type, and never overrides one that is set.
//! - **SMART**: one pool per backend declared in an OpenAPI document's
//!   `x-transportd` extension; each request is routed by method and path
//!   template to the backend its operation is bound to.
//!
//! Configuration errors surface once, at construction, as [`ConfigError`].
//! Per-request failures (connect, TLS, timeout, unmatched route) are
//! [`HttpError`]s. There is no internal retry.
//!
//! # Example
//!
//! ```ignore
//! use httpclient::{FigmentSource, HttpClient};
//! use figment::{Figment, providers::{Format, Yaml}};
//!
//! let figment = Figment::new().merge(Yaml::file("config.yaml"));
//! let client = HttpClient::from_settings(&FigmentSource::new(&figment)?)?;
//!
//! let health = client.get("/healthcheck").send().await?.text().await?;
//! ```

mod client;
mod component;
mod config;
mod connector;
mod default;
mod error;
mod factory;
mod layers;
mod request;
mod response;
pub mod smart;
mod source;
mod tls;
mod transport;

pub use client::HttpClient;
pub use component::TransportComponent;
pub use config::{
    DEFAULT_CONTENT_TYPE, DefaultSettings, HttpClientSettings, SmartSettings, TYPE_DEFAULT,
    TYPE_SMART, TlsRootConfig, TransportConfig, TransportSecurity,
};
pub use default::DefaultComponent;
pub use error::{ConfigError, HttpError, InvalidUriKind};
pub use factory::{HTTPCLIENT_SECTION, build_transport, new_transport, new_transport_from_section};
pub use layers::{ContentTypeLayer, ContentTypeService};
pub use request::RequestBuilder;
pub use response::{DEFAULT_MAX_BODY_SIZE, ERROR_BODY_PREVIEW_LIMIT, HttpResponse, LimitedBody};
pub use smart::SmartComponent;
pub use source::{FigmentSource, MapSource, SettingsSource, load_settings};
pub use transport::{ResponseBody, Transport, TransportFuture, TransportKind, TransportRequest};
