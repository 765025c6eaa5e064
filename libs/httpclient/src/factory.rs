use crate::component::TransportComponent;
use crate::config::{HttpClientSettings, TransportConfig};
use crate::default::DefaultComponent;
use crate::error::ConfigError;
use crate::smart::SmartComponent;
use crate::source::{SettingsSource, load_settings};
use crate::transport::Transport;

/// Section read by [`new_transport`]
pub const HTTPCLIENT_SECTION: &str = "httpclient";

/// Build a transport from the `httpclient` section of `source`.
///
/// ```yaml
/// httpclient:
///   type: SMART          # or DEFAULT (the default)
///   smart:
///     openapi: |
///       openapi: 3.0.0
///       ...
/// ```
///
/// # Errors
/// Returns [`ConfigError`] for malformed settings, an unrecognized `type`,
/// or a component that rejects its settings.
pub fn new_transport(source: &dyn SettingsSource) -> Result<Transport, ConfigError> {
    new_transport_from_section(source, HTTPCLIENT_SECTION)
}

/// Build a transport from an arbitrary settings section.
///
/// # Errors
/// Same as [`new_transport`].
pub fn new_transport_from_section(
    source: &dyn SettingsSource,
    section: &str,
) -> Result<Transport, ConfigError> {
    let settings: HttpClientSettings = load_settings(source, section)?;
    tracing::debug!(section, transport_type = %settings.transport_type, "resolving HTTP transport");
    build_transport(settings.resolve()?)
}

/// Dispatch an already-resolved configuration to its component.
///
/// # Errors
/// Returns the component's [`ConfigError`].
pub fn build_transport(config: TransportConfig) -> Result<Transport, ConfigError> {
    match config {
        TransportConfig::Default(settings) => DefaultComponent.build(settings),
        TransportConfig::Smart(settings) => SmartComponent.build(settings),
    }
}
