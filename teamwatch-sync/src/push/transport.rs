//! Push transport seam and its WebSocket implementation.

use async_trait::async_trait;
use futures_util::StreamExt;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PushError {
    #[error("Invalid push endpoint: {0}")]
    Endpoint(String),

    #[error("Connection failed: {0}")]
    Connect(String),

    /// The handshake was refused with HTTP 401/403.
    #[error("Handshake rejected with HTTP {0}")]
    Unauthorized(u16),

    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl From<url::ParseError> for PushError {
    fn from(err: url::ParseError) -> Self {
        Self::Endpoint(err.to_string())
    }
}

/// One inbound frame, reduced to what the channel acts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Binary(Vec<u8>),
    /// Close frame with its code, if any.
    Close(Option<u16>),
}

/// A live connection.
#[async_trait]
pub trait PushConnection: Send {
    /// Next frame; `None` once the stream has ended.
    async fn next_frame(&mut self) -> Option<Result<Frame, PushError>>;

    /// Close gracefully.
    async fn close(&mut self);
}

#[async_trait]
pub trait PushTransport: Send + Sync {
    async fn connect(&self, url: &Url) -> Result<Box<dyn PushConnection>, PushError>;
}

/// WebSocket transport over `tokio-tungstenite`.
#[derive(Debug, Clone, Copy, Default)]
pub struct WsTransport;

#[async_trait]
impl PushTransport for WsTransport {
    async fn connect(&self, url: &Url) -> Result<Box<dyn PushConnection>, PushError> {
        match tokio_tungstenite::connect_async(url.as_str()).await {
            Ok((stream, _)) => Ok(Box::new(WsConnection { stream })),
            Err(WsError::Http(response)) => {
                let status = response.status().as_u16();
                if matches!(status, 401 | 403) {
                    Err(PushError::Unauthorized(status))
                } else {
                    Err(PushError::Connect(format!("HTTP {}", status)))
                }
            }
            Err(err) => Err(PushError::Connect(err.to_string())),
        }
    }
}

struct WsConnection {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl PushConnection for WsConnection {
    async fn next_frame(&mut self) -> Option<Result<Frame, PushError>> {
        loop {
            let frame = match self.stream.next().await? {
                Ok(Message::Text(text)) => Frame::Text(text),
                Ok(Message::Binary(data)) => Frame::Binary(data),
                Ok(Message::Close(close)) => Frame::Close(close.map(|c| u16::from(c.code))),
                // Pings are answered by tungstenite itself.
                Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_)) => continue,
                Err(err) => return Some(Err(PushError::Protocol(err.to_string()))),
            };
            return Some(Ok(frame));
        }
    }

    async fn close(&mut self) {
        if let Err(err) = self.stream.close(None).await {
            tracing::debug!(error = %err, "push connection close failed");
        }
    }
}
