//! Declarative settings for building transports.
//!
//! The on-disk shape is:
//!
//! ```yaml
//! httpclient:
//!   type: SMART            # or DEFAULT
//!   default:
//!     content_type: application/json
//!     pool_idle_timeout: 90s
//!   smart:
//!     openapi: |
//!       openapi: 3.0.0
//!       x-transportd: { ... }
//! ```
//!
//! [`HttpClientSettings`] is the raw, serde-facing form. [`HttpClientSettings::resolve`]
//! turns it into the tagged [`TransportConfig`] that the factory dispatches on.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default `Content-Type` injected by the default transport
pub const DEFAULT_CONTENT_TYPE: &str = "application/json";

/// Discriminator value selecting the default transport
pub const TYPE_DEFAULT: &str = "DEFAULT";

/// Discriminator value selecting the smart transport
pub const TYPE_SMART: &str = "SMART";

/// TLS root certificate configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum TlsRootConfig {
    /// Use Mozilla's root certificates (webpki-roots, no OS dependency)
    #[default]
    Webpki,
    /// Use OS native root certificate store
    Native,
}

/// Transport security configuration
///
/// Controls whether plaintext `http://` targets may be dialed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum TransportSecurity {
    /// Dial both `http://` and `https://` targets
    #[default]
    AllowInsecureHttp,
    /// Refuse to dial anything but `https://`
    TlsOnly,
}

/// Connector and pool parameters shared by both transport kinds
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectorSettings {
    pub connect_timeout: Duration,
    pub pool_idle_timeout: Option<Duration>,
    pub pool_max_idle_per_host: usize,
    pub tls_roots: TlsRootConfig,
    pub transport_security: TransportSecurity,
}

/// Settings for the default transport
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DefaultSettings {
    /// `Content-Type` applied to requests that carry none (default: `application/json`)
    pub content_type: String,

    /// Per-request timeout (default: none)
    #[serde(with = "humantime_serde::option")]
    pub request_timeout: Option<Duration>,

    /// TCP connect timeout (default: 30s)
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,

    /// Idle connection lifetime in the pool (default: 90s, `null` keeps idle connections)
    #[serde(with = "humantime_serde::option")]
    pub pool_idle_timeout: Option<Duration>,

    /// Maximum idle connections kept per host (default: 32)
    pub pool_max_idle_per_host: usize,

    pub tls_roots: TlsRootConfig,

    pub transport_security: TransportSecurity,
}

impl Default for DefaultSettings {
    fn default() -> Self {
        Self {
            content_type: DEFAULT_CONTENT_TYPE.to_owned(),
            request_timeout: None,
            connect_timeout: default_connect_timeout(),
            pool_idle_timeout: Some(Duration::from_secs(90)),
            pool_max_idle_per_host: 32,
            tls_roots: TlsRootConfig::default(),
            transport_security: TransportSecurity::default(),
        }
    }
}

impl DefaultSettings {
    #[must_use]
    pub(crate) fn connector(&self) -> ConnectorSettings {
        ConnectorSettings {
            connect_timeout: self.connect_timeout,
            pool_idle_timeout: self.pool_idle_timeout,
            pool_max_idle_per_host: self.pool_max_idle_per_host,
            tls_roots: self.tls_roots,
            transport_security: self.transport_security,
        }
    }
}

/// Settings for the smart transport
///
/// Backends and their pools come from the `x-transportd` extensions of the
/// OpenAPI document, not from these fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SmartSettings {
    /// Full OpenAPI document (YAML or JSON) with `x-transportd` extensions
    pub openapi: String,

    /// Per-request timeout (default: none)
    #[serde(with = "humantime_serde::option")]
    pub request_timeout: Option<Duration>,

    /// TCP connect timeout for every backend (default: 30s)
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,

    pub tls_roots: TlsRootConfig,

    pub transport_security: TransportSecurity,
}

impl Default for SmartSettings {
    fn default() -> Self {
        Self {
            openapi: String::new(),
            request_timeout: None,
            connect_timeout: default_connect_timeout(),
            tls_roots: TlsRootConfig::default(),
            transport_security: TransportSecurity::default(),
        }
    }
}

impl SmartSettings {
    /// Connector settings for one backend pool.
    ///
    /// The pool TTL doubles as the idle timeout of the backend's connections.
    #[must_use]
    pub(crate) fn connector(&self, ttl: Option<Duration>) -> ConnectorSettings {
        ConnectorSettings {
            connect_timeout: self.connect_timeout,
            pool_idle_timeout: ttl,
            pool_max_idle_per_host: usize::MAX,
            tls_roots: self.tls_roots,
            transport_security: self.transport_security,
        }
    }
}

/// Raw settings section as read from a [`SettingsSource`](crate::SettingsSource)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HttpClientSettings {
    /// `DEFAULT` or `SMART`
    #[serde(rename = "type")]
    pub transport_type: String,
    pub default: DefaultSettings,
    pub smart: SmartSettings,
}

impl Default for HttpClientSettings {
    fn default() -> Self {
        Self {
            transport_type: TYPE_DEFAULT.to_owned(),
            default: DefaultSettings::default(),
            smart: SmartSettings::default(),
        }
    }
}

impl HttpClientSettings {
    /// Resolve the `type` discriminator into the tagged configuration.
    ///
    /// # Errors
    /// Returns [`ConfigError::UnknownType`] for anything but `DEFAULT` or `SMART`.
    pub fn resolve(self) -> Result<TransportConfig, ConfigError> {
        match self.transport_type.as_str() {
            TYPE_DEFAULT => Ok(TransportConfig::Default(self.default)),
            TYPE_SMART => Ok(TransportConfig::Smart(self.smart)),
            _ => Err(ConfigError::UnknownType {
                value: self.transport_type,
            }),
        }
    }
}

/// Tagged transport configuration: exactly one component's settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportConfig {
    Default(DefaultSettings),
    Smart(SmartSettings),
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(30)
}

/// Serde adapters for humantime-formatted durations (`"24h"`, `"1m 30s"`).
///
/// Same shape as `modkit_utils::humantime_serde` (itself based on the
/// `humantime-serde` crate), trimmed to `Duration` and `Option<Duration>`
/// for `#[serde(with = ...)]` on settings fields.
mod humantime_serde {
    use serde::{Deserialize, Deserializer, Serializer, de};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&humantime::format_duration(*d).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(d)?;
        humantime::parse_duration(&raw)
            .map_err(|_| de::Error::invalid_value(de::Unexpected::Str(&raw), &"a duration"))
    }

    pub mod option {
        use serde::{Deserialize, Deserializer, Serializer};
        use std::time::Duration;

        #[allow(clippy::ref_option)]
        pub fn serialize<S: Serializer>(d: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
            match d {
                Some(d) => super::serialize(d, s),
                None => s.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
            #[derive(Deserialize)]
            struct Wrapped(#[serde(with = "super")] Duration);

            let wrapped: Option<Wrapped> = Option::deserialize(d)?;
            Ok(wrapped.map(|Wrapped(d)| d))
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_settings_defaults() {
        let settings = DefaultSettings::default();
        assert_eq!(settings.content_type, "application/json");
        assert_eq!(settings.request_timeout, None);
        assert_eq!(settings.connect_timeout, Duration::from_secs(30));
        assert_eq!(settings.pool_idle_timeout, Some(Duration::from_secs(90)));
        assert_eq!(settings.pool_max_idle_per_host, 32);
        assert_eq!(settings.transport_security, TransportSecurity::AllowInsecureHttp);
    }

    #[test]
    fn test_empty_section_is_default_type() {
        let settings: HttpClientSettings = serde_json::from_value(json!({})).unwrap();
        assert_eq!(settings.transport_type, "DEFAULT");
        assert!(matches!(
            settings.resolve().unwrap(),
            TransportConfig::Default(_)
        ));
    }

    #[test]
    fn test_resolve_smart() {
        let settings: HttpClientSettings = serde_json::from_value(json!({
            "type": "SMART",
            "smart": { "openapi": "openapi: 3.0.0", "request_timeout": "5s" }
        }))
        .unwrap();

        match settings.resolve().unwrap() {
            TransportConfig::Smart(smart) => {
                assert_eq!(smart.openapi, "openapi: 3.0.0");
                assert_eq!(smart.request_timeout, Some(Duration::from_secs(5)));
            }
            TransportConfig::Default(_) => panic!("expected smart config"),
        }
    }

    #[test]
    fn test_resolve_unknown_type() {
        let settings = HttpClientSettings {
            transport_type: "MISSING".to_owned(),
            ..Default::default()
        };
        let err = settings.resolve().unwrap_err();
        assert!(matches!(err, ConfigError::UnknownType { value } if value == "MISSING"));
    }

    #[test]
    fn test_type_is_case_sensitive() {
        let settings = HttpClientSettings {
            transport_type: "smart".to_owned(),
            ..Default::default()
        };
        assert!(settings.resolve().is_err());
    }

    #[test]
    fn test_humantime_durations() {
        let settings: DefaultSettings = serde_json::from_value(json!({
            "request_timeout": "1m 30s",
            "connect_timeout": "250ms",
            "pool_idle_timeout": null,
            "tls_roots": "native",
            "transport_security": "tls_only"
        }))
        .unwrap();

        assert_eq!(settings.request_timeout, Some(Duration::from_secs(90)));
        assert_eq!(settings.connect_timeout, Duration::from_millis(250));
        assert_eq!(settings.pool_idle_timeout, None);
        assert_eq!(settings.tls_roots, TlsRootConfig::Native);
        assert_eq!(settings.transport_security, TransportSecurity::TlsOnly);
    }

    #[test]
    fn test_invalid_duration_rejected() {
        let result: Result<DefaultSettings, _> =
            serde_json::from_value(json!({ "connect_timeout": "soon" }));
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_field_rejected() {
        let result: Result<HttpClientSettings, _> =
            serde_json::from_value(json!({ "type": "DEFAULT", "bogus": 1 }));
        assert!(result.is_err());
    }

    #[test]
    fn test_settings_serialize_roundtrip() {
        let settings = HttpClientSettings::default();
        let value = serde_json::to_value(&settings).unwrap();
        assert_eq!(value["type"], "DEFAULT");
        assert_eq!(value["default"]["pool_idle_timeout"], "1m 30s");

        let back: HttpClientSettings = serde_json::from_value(value).unwrap();
        assert_eq!(back, settings);
    }

    #[test]
    fn test_smart_connector_uses_ttl_as_idle_timeout() {
        let smart = SmartSettings::default();
        let ttl = Duration::from_secs(24 * 3600);
        let connector = smart.connector(Some(ttl));
        assert_eq!(connector.pool_idle_timeout, Some(ttl));
        assert_eq!(connector.connect_timeout, Duration::from_secs(30));
    }
}
