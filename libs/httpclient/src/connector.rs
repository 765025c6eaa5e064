//! Connectors and pooled hyper clients shared by both transport kinds.

use crate::config::{ConnectorSettings, TlsRootConfig, TransportSecurity};
use crate::error::{ConfigError, HttpError};
use crate::tls;
use crate::transport::{ResponseBody, TransportFuture, TransportRequest, box_response};
use bytes::Bytes;
use http::Response;
use http_body_util::Full;
use hyper_rustls::HttpsConnector;
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::{TokioExecutor, TokioTimer};
use std::task::{Context, Poll};
use tower::Service;

/// HTTPS-capable connector used by every pool
pub type Connector = HttpsConnector<HttpConnector>;

/// hyper client owning one connection pool
pub type PooledClient = Client<Connector, Full<Bytes>>;

/// Creates pooled clients that share one connector configuration.
///
/// Each [`ClientFactory::client`] call yields a client with its own, empty
/// connection pool.
#[derive(Clone)]
pub struct ClientFactory {
    connector: Connector,
    settings: ConnectorSettings,
}

impl ClientFactory {
    /// # Errors
    /// Returns [`ConfigError::Tls`] if the TLS roots cannot be loaded.
    pub(crate) fn new(settings: ConnectorSettings) -> Result<Self, ConfigError> {
        let connector = build_connector(&settings)?;
        Ok(Self {
            connector,
            settings,
        })
    }

    pub(crate) fn client(&self) -> PooledClient {
        let mut builder = Client::builder(TokioExecutor::new());

        // pool_timer is required for pool_idle_timeout to take effect
        builder
            .pool_timer(TokioTimer::new())
            .pool_max_idle_per_host(self.settings.pool_max_idle_per_host)
            .http2_only(false);

        if let Some(idle_timeout) = self.settings.pool_idle_timeout {
            builder.pool_idle_timeout(idle_timeout);
        }

        builder.build(self.connector.clone())
    }
}

/// Send one request through a pooled client.
pub fn send_pooled(client: &PooledClient, request: TransportRequest) -> TransportFuture {
    let fut = client.request(request);
    Box::pin(async move {
        let response = fut.await?;
        Ok(box_response(response))
    })
}

/// Tower service over a single pooled client
#[derive(Clone)]
pub struct PooledService {
    client: PooledClient,
}

impl PooledService {
    pub(crate) fn new(client: PooledClient) -> Self {
        Self { client }
    }
}

impl Service<TransportRequest> for PooledService {
    type Response = Response<ResponseBody>;
    type Error = HttpError;
    type Future = TransportFuture;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: TransportRequest) -> Self::Future {
        send_pooled(&self.client, request)
    }
}

/// Build the HTTP(S) connector.
///
/// HTTP/2 is negotiated through ALPN; plaintext `http://` is dialed only
/// when the transport security mode allows it.
fn build_connector(settings: &ConnectorSettings) -> Result<Connector, ConfigError> {
    let allow_http = settings.transport_security == TransportSecurity::AllowInsecureHttp;
    if allow_http {
        tracing::debug!("transport allows plaintext http:// targets");
    }

    let mut http = HttpConnector::new();
    // the TLS wrapper decides which schemes are acceptable
    http.enforce_http(false);
    http.set_connect_timeout(Some(settings.connect_timeout));
    http.set_nodelay(true);

    let builder = match settings.tls_roots {
        TlsRootConfig::Webpki => hyper_rustls::HttpsConnectorBuilder::new()
            .with_provider_and_webpki_roots(tls::crypto_provider())
            .map_err(|e| ConfigError::Tls(Box::new(e)))?,
        TlsRootConfig::Native => hyper_rustls::HttpsConnectorBuilder::new()
            .with_tls_config(tls::native_roots_client_config()?),
    };

    let builder = if allow_http {
        builder.https_or_http()
    } else {
        builder.https_only()
    };

    Ok(builder.enable_all_versions().wrap_connector(http))
}
