//! HTTP transport exposing response bodies as byte sources
//!
//! The parser core only needs a status code and a [`ByteSource`]. The
//! reqwest-backed [`HttpTransport`] issues the request on the tokio runtime
//! and pumps body chunks through a bounded channel, so the synchronous
//! caller reads the body incrementally without ever holding all of it.

use std::time::Duration;

use reqwest::Client;
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::stream::{ByteSource, ChannelSource};

/// Default timeout for a whole request, body included
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Default timeout for establishing a connection
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Number of body chunks buffered between the network task and the reader
const BODY_CHANNEL_CAPACITY: usize = 8;

/// Errors that can occur before a response is available
#[derive(Debug, Error)]
pub enum TransportError {
    /// HTTP client could not be built
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    /// HTTP request failed (connect failure, timeout, TLS, ...)
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),
}

/// A response whose body is read incrementally
pub struct HttpResponse {
    /// HTTP status code
    pub status: u16,
    /// Response body
    pub body: Box<dyn ByteSource>,
}

impl HttpResponse {
    /// Whether the status is in the 2xx range
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

impl std::fmt::Debug for HttpResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpResponse")
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

/// Issues GET requests
pub trait Transport {
    /// Sends a GET request and returns once the status line is available.
    fn get(&self, url: &str) -> Result<HttpResponse, TransportError>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn get(&self, url: &str) -> Result<HttpResponse, TransportError> {
        (**self).get(url)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn get(&self, url: &str) -> Result<HttpResponse, TransportError> {
        (**self).get(url)
    }
}

/// Transport backed by reqwest on a tokio runtime
///
/// Must be called from a thread that is not driving the runtime, for
/// example inside `tokio::task::spawn_blocking`, and the runtime must be
/// multi-threaded so its IO driver keeps running while the caller blocks.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    runtime: Handle,
}

impl HttpTransport {
    /// Creates a transport with the given timeouts
    pub fn new(
        runtime: Handle,
        request_timeout: Duration,
        connect_timeout: Duration,
    ) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(request_timeout)
            .connect_timeout(connect_timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(TransportError::Client)?;
        Ok(Self { client, runtime })
    }

    /// Creates a transport with a custom HTTP client
    pub fn with_client(runtime: Handle, client: Client) -> Self {
        Self { client, runtime }
    }
}

impl Transport for HttpTransport {
    fn get(&self, url: &str) -> Result<HttpResponse, TransportError> {
        debug!(url, "GET");
        let mut response = self.runtime.block_on(self.client.get(url).send())?;
        let status = response.status().as_u16();

        let (tx, rx) = mpsc::channel::<Vec<u8>>(BODY_CHANNEL_CAPACITY);
        let url = url.to_string();
        self.runtime.spawn(async move {
            loop {
                match response.chunk().await {
                    Ok(Some(chunk)) => {
                        // Receiver dropped: the reader stopped early
                        if tx.send(chunk.to_vec()).await.is_err() {
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        warn!(url = %url, error = %e, "Response body failed");
                        break;
                    }
                }
            }
        });

        Ok(HttpResponse {
            status,
            body: Box::new(ChannelSource::new(rx)),
        })
    }
}
