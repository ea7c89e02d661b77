//! Pluggable transport seams.
//!
//! The core never opens sockets or HTTP connections itself. An
//! [`HttpClientFactory`] builds an [`HttpClient`] for one browser origin; the
//! client answers discovery GETs and opens debugging sockets.

use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::{Sink, Stream, StreamExt};
use serde::de::DeserializeOwned;
use tabwire_config::ConnectionConfig;
use tabwire_protocol::CdpError;
use url::Url;

/// Write half of a debugging socket: one `String` per text frame.
pub type FrameSink = Pin<Box<dyn Sink<String, Error = CdpError> + Send>>;

/// Read half of a debugging socket. Ends when the socket closes.
pub type FrameStream = BoxStream<'static, Result<String, CdpError>>;

/// An open debugging socket.
pub struct Socket {
    sink: FrameSink,
    stream: FrameStream,
}

impl Socket {
    pub fn new<S, R>(sink: S, stream: R) -> Self
    where
        S: Sink<String, Error = CdpError> + Send + 'static,
        R: Stream<Item = Result<String, CdpError>> + Send + 'static,
    {
        Self {
            sink: Box::pin(sink),
            stream: stream.boxed(),
        }
    }

    pub fn into_parts(self) -> (FrameSink, FrameStream) {
        (self.sink, self.stream)
    }
}

/// Minimal HTTP response used by discovery.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_ok(&self) -> bool {
        self.status == 200
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, CdpError> {
        Ok(serde_json::from_str(&self.body)?)
    }
}

/// HTTP + WebSocket client bound to one browser.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn get(&self, url: &Url) -> Result<HttpResponse, CdpError>;

    async fn open_socket(&self, url: &Url) -> Result<Socket, CdpError>;
}

/// Client construction settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    pub base_url: Url,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
}

impl ClientConfig {
    pub fn new(base_url: Url, connection: &ConnectionConfig) -> Self {
        Self {
            base_url,
            connect_timeout: connection.connect_timeout(),
            read_timeout: connection.read_timeout(),
        }
    }
}

/// Builds clients for discovery and sockets.
pub trait HttpClientFactory: Send + Sync {
    fn create_client(&self, config: &ClientConfig) -> Result<Arc<dyn HttpClient>, CdpError>;
}
