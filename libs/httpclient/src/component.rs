use crate::error::ConfigError;
use crate::transport::Transport;

/// A builder that turns one kind of settings into a [`Transport`].
///
/// `settings()` hands out the component's baseline configuration so callers
/// can tweak individual fields before calling `build()`.
pub trait TransportComponent {
    type Settings;

    /// Baseline settings for this component
    fn settings(&self) -> Self::Settings;

    /// Construct a transport.
    ///
    /// Construction happens once, at startup; the result is reused for the
    /// lifetime of the owning client.
    ///
    /// # Errors
    /// Returns [`ConfigError`] when the settings are invalid.
    fn build(&self, settings: Self::Settings) -> Result<Transport, ConfigError>;
}
