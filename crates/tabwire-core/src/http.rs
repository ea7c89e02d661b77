//! Default client: reqwest for discovery, tokio-tungstenite for sockets.

use std::sync::Arc;

use async_trait::async_trait;
use futures::{future, SinkExt, StreamExt};
use tabwire_protocol::CdpError;
use tokio_tungstenite::tungstenite::{self, Message};
use tracing::debug;
use url::Url;

use crate::transport::{ClientConfig, HttpClient, HttpClientFactory, HttpResponse, Socket};

fn ws_error(e: tungstenite::Error) -> CdpError {
    CdpError::WebSocket(e.to_string())
}

fn http_error(e: reqwest::Error) -> CdpError {
    CdpError::Http(e.to_string())
}

/// reqwest + tokio-tungstenite [`HttpClient`].
pub struct ReqwestClient {
    client: reqwest::Client,
    config: ClientConfig,
}

impl ReqwestClient {
    pub fn new(config: ClientConfig) -> Result<Self, CdpError> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.read_timeout)
            .build()
            .map_err(http_error)?;
        Ok(Self { client, config })
    }

    pub fn base_url(&self) -> &Url {
        &self.config.base_url
    }
}

#[async_trait]
impl HttpClient for ReqwestClient {
    async fn get(&self, url: &Url) -> Result<HttpResponse, CdpError> {
        let response = self.client.get(url.clone()).send().await.map_err(http_error)?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(http_error)?;
        Ok(HttpResponse { status, body })
    }

    async fn open_socket(&self, url: &Url) -> Result<Socket, CdpError> {
        debug!("Opening CDP socket to {}", url);
        let connect = tokio_tungstenite::connect_async(url.as_str());
        let (ws_stream, _) = tokio::time::timeout(self.config.connect_timeout, connect)
            .await
            .map_err(|_| CdpError::ConnectionFailed(format!("{}: connect timed out", url)))?
            .map_err(|e| CdpError::ConnectionFailed(format!("WebSocket: {}", e)))?;

        let (ws_sink, ws_source) = ws_stream.split();

        let sink = ws_sink
            .sink_map_err(ws_error)
            .with(|text: String| future::ready(Ok::<_, CdpError>(Message::Text(text.into()))));

        let stream = ws_source.filter_map(|msg| {
            future::ready(match msg {
                Ok(Message::Text(text)) => Some(Ok(text.as_str().to_owned())),
                Ok(Message::Close(frame)) => {
                    debug!("WebSocket closed: {:?}", frame);
                    None
                }
                // ping/pong are answered by tungstenite; binary frames are not part of the protocol
                Ok(_) => None,
                Err(e) => Some(Err(ws_error(e))),
            })
        });

        Ok(Socket::new(sink, stream))
    }
}

/// Factory for [`ReqwestClient`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ReqwestClientFactory;

impl HttpClientFactory for ReqwestClientFactory {
    fn create_client(&self, config: &ClientConfig) -> Result<Arc<dyn HttpClient>, CdpError> {
        Ok(Arc::new(ReqwestClient::new(config.clone())?))
    }
}
