use crate::error::ConfigError;
use crate::factory::new_transport;
use crate::request::RequestBuilder;
use crate::response::DEFAULT_MAX_BODY_SIZE;
use crate::source::SettingsSource;
use crate::transport::Transport;

/// HTTP client over a configured [`Transport`]
///
/// `HttpClient` is `Clone + Send + Sync`; clones share the transport and
/// therefore its connection pools. Store it directly in your service state.
///
/// # Example
///
/// ```ignore
/// use httpclient::{HttpClient, MapSource};
///
/// let source = MapSource::new(serde_json::json!({ "httpclient": { "type": "DEFAULT" } }));
/// let client = HttpClient::from_settings(&source)?;
///
/// let user: User = client
///     .get("http://users.internal/users/42")
///     .send()
///     .await?
///     .json()
///     .await?;
/// ```
#[derive(Clone, Debug)]
pub struct HttpClient {
    transport: Transport,
    max_body_size: usize,
}

impl HttpClient {
    #[must_use]
    pub fn new(transport: Transport) -> Self {
        Self {
            transport,
            max_body_size: DEFAULT_MAX_BODY_SIZE,
        }
    }

    /// Client over the transport described by the `httpclient` section.
    ///
    /// # Errors
    /// Returns [`ConfigError`] when the transport cannot be built.
    pub fn from_settings(source: &dyn SettingsSource) -> Result<Self, ConfigError> {
        Ok(Self::new(new_transport(source)?))
    }

    /// Cap for buffered response bodies (default 10 MiB)
    #[must_use]
    pub fn with_max_body_size(mut self, max_body_size: usize) -> Self {
        self.max_body_size = max_body_size;
        self
    }

    #[must_use]
    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    fn request(&self, method: http::Method, url: &str) -> RequestBuilder {
        RequestBuilder::new(
            self.transport.clone(),
            self.max_body_size,
            method,
            url.to_owned(),
        )
    }

    pub fn get(&self, url: &str) -> RequestBuilder {
        self.request(http::Method::GET, url)
    }

    pub fn post(&self, url: &str) -> RequestBuilder {
        self.request(http::Method::POST, url)
    }

    pub fn put(&self, url: &str) -> RequestBuilder {
        self.request(http::Method::PUT, url)
    }

    pub fn patch(&self, url: &str) -> RequestBuilder {
        self.request(http::Method::PATCH, url)
    }

    pub fn delete(&self, url: &str) -> RequestBuilder {
        self.request(http::Method::DELETE, url)
    }
}
