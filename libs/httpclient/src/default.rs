use crate::component::TransportComponent;
use crate::config::DefaultSettings;
use crate::connector::{ClientFactory, PooledService};
use crate::error::ConfigError;
use crate::layers::ContentTypeLayer;
use crate::transport::{Transport, TransportKind, with_timeout};
use tower::ServiceBuilder;
use tower::util::BoxCloneSyncService;

/// Builds the default transport: one connection pool with sane defaults
/// and a `Content-Type` fallback for requests that carry none.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultComponent;

impl TransportComponent for DefaultComponent {
    type Settings = DefaultSettings;

    fn settings(&self) -> DefaultSettings {
        DefaultSettings::default()
    }

    fn build(&self, settings: DefaultSettings) -> Result<Transport, ConfigError> {
        let content_type = ContentTypeLayer::try_new(&settings.content_type)?;
        let factory = ClientFactory::new(settings.connector())?;

        let service = ServiceBuilder::new()
            .layer(content_type)
            .service(PooledService::new(factory.client()));
        let service = with_timeout(BoxCloneSyncService::new(service), settings.request_timeout);

        tracing::info!(
            content_type = %settings.content_type,
            pool_max_idle_per_host = settings.pool_max_idle_per_host,
            pool_idle_timeout = ?settings.pool_idle_timeout,
            request_timeout = ?settings.request_timeout,
            "built default HTTP transport"
        );
        Ok(Transport::new(TransportKind::Default, service))
    }
}
