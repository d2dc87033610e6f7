//! Transport boundary for terminal sessions
//!
//! The session driver only sees [`Connector`] and [`Transport`]. Production
//! uses a tokio-tungstenite WebSocket; tests plug in an in-memory pair.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{self, Message},
    MaybeTlsStream, WebSocketStream,
};
use tracing::debug;

use super::protocol::InboundFrame;
use crate::types::{Result, WicketError};

/// Default timeout for opening the WebSocket
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// One open bidirectional channel to the gateway.
#[async_trait]
pub trait Transport: Send {
    /// Send one text frame.
    async fn send(&mut self, text: String) -> Result<()>;

    /// Next inbound frame. `None` means the stream ended without a close
    /// frame. Must be cancel-safe.
    async fn recv(&mut self) -> Option<Result<InboundFrame>>;

    /// Close the channel. Closing an already-closed channel is not an error.
    async fn close(&mut self) -> Result<()>;
}

/// Opens transports. One call per session.
#[async_trait]
pub trait Connector: Send + Sync {
    type Transport: Transport + 'static;

    async fn connect(&self, url: &str) -> Result<Self::Transport>;
}

// =============================================================================
// WebSocket implementation
// =============================================================================

/// Opens tokio-tungstenite WebSocket connections.
#[derive(Debug, Clone)]
pub struct WsConnector {
    timeout: Duration,
}

impl WsConnector {
    pub fn new() -> Self {
        Self {
            timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for WsConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Connector for WsConnector {
    type Transport = WsTransport;

    async fn connect(&self, url: &str) -> Result<WsTransport> {
        debug!(url = %url, "Opening terminal WebSocket");

        let (stream, _response) = tokio::time::timeout(self.timeout, connect_async(url))
            .await
            .map_err(|_| {
                WicketError::TransportOpenFailed(format!(
                    "Connection timed out after {}ms",
                    self.timeout.as_millis()
                ))
            })?
            .map_err(|e| WicketError::TransportOpenFailed(e.to_string()))?;

        Ok(WsTransport { stream })
    }
}

pub struct WsTransport {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl Transport for WsTransport {
    async fn send(&mut self, text: String) -> Result<()> {
        self.stream
            .send(Message::Text(text))
            .await
            .map_err(WicketError::from)
    }

    async fn recv(&mut self) -> Option<Result<InboundFrame>> {
        loop {
            match self.stream.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(InboundFrame::Text(text))),
                Ok(Message::Binary(bytes)) => return Some(Ok(InboundFrame::Binary(bytes))),
                Ok(Message::Close(frame)) => {
                    debug!(?frame, "Received close frame");
                    return Some(Ok(InboundFrame::Close));
                }
                // tungstenite answers pings itself
                Ok(Message::Ping(_)) | Ok(Message::Pong(_)) | Ok(Message::Frame(_)) => continue,
                Err(e) => return Some(Err(e.into())),
            }
        }
    }

    async fn close(&mut self) -> Result<()> {
        match self.stream.close(None).await {
            Ok(()) => Ok(()),
            Err(tungstenite::Error::ConnectionClosed) | Err(tungstenite::Error::AlreadyClosed) => {
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}
