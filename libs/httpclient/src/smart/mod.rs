//! Smart transport: per-backend connection pools selected by OpenAPI routes.

mod document;
mod pool;
mod router;

pub use document::{BackendSpec, EXTENSION, RouteBinding, TransportdDocument};

use crate::component::TransportComponent;
use crate::config::SmartSettings;
use crate::error::ConfigError;
use crate::transport::{Transport, TransportKind, with_timeout};
use router::{RouteTable, SmartRouter};
use tower::util::BoxCloneSyncService;

/// Builds a transport that routes each request to the backend its
/// operation is bound to in the configured OpenAPI document.
#[derive(Debug, Clone, Copy, Default)]
pub struct SmartComponent;

impl TransportComponent for SmartComponent {
    type Settings = SmartSettings;

    /// Baseline settings; `openapi` is empty and must be filled in.
    fn settings(&self) -> SmartSettings {
        SmartSettings::default()
    }

    fn build(&self, settings: SmartSettings) -> Result<Transport, ConfigError> {
        let document = TransportdDocument::parse(&settings.openapi)?;
        let table = RouteTable::build(&document, &settings)?;

        tracing::info!(
            backends = table.backend_count(),
            routes = table.route_count(),
            request_timeout = ?settings.request_timeout,
            "built smart HTTP transport"
        );

        let service = BoxCloneSyncService::new(SmartRouter::new(table));
        let service = with_timeout(service, settings.request_timeout);
        Ok(Transport::new(TransportKind::Smart, service))
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    const EXAMPLE: &str = r#"openapi: 3.0.0
x-transportd:
  backends:
    - app
  app:
    host: "http://app:8081"
    pool:
      ttl: "24h"
      count: 1
info:
  version: 1.0.0
  title: "Example"
paths:
  /healthcheck:
    get:
      x-transportd:
        backend: app
"#;

    #[test]
    fn test_smart_component_fails_on_empty_document() {
        let cmp = SmartComponent;
        let conf = cmp.settings();
        assert!(matches!(cmp.build(conf), Err(ConfigError::MissingOpenApi)));
    }

    #[test]
    fn test_smart_component_builds_from_document() {
        let cmp = SmartComponent;
        let mut conf = cmp.settings();
        conf.openapi = EXAMPLE.to_owned();

        let transport = cmp.build(conf).unwrap();
        assert_eq!(transport.kind(), TransportKind::Smart);
        assert_ne!(transport.kind(), TransportKind::Default);
    }

    #[test]
    fn test_smart_component_propagates_document_errors() {
        let cmp = SmartComponent;
        let mut conf = cmp.settings();
        conf.openapi = "openapi: 3.0.0\npaths: {}\n".to_owned();

        assert!(matches!(cmp.build(conf), Err(ConfigError::MissingExtension)));
    }
}
