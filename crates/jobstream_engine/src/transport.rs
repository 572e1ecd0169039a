use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use jobstream_core::{CLOSE_ABNORMAL, CLOSE_NORMAL};
use jobstream_logging::stream_trace;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ConnectError {
    pub message: String,
}

impl ConnectError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A text frame (binary frames are decoded lossily as UTF-8).
    Text(String),
    /// The peer closed the connection or the stream ended.
    Closed { code: Option<u16> },
    /// The connection broke; the handle must not be polled again.
    Failed(String),
}

/// Opens connections to a job stream endpoint.
#[async_trait::async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, url: &str) -> Result<Box<dyn Connection>, ConnectError>;
}

/// One open duplex connection. `recv` must be cancel-safe.
#[async_trait::async_trait]
pub trait Connection: Send {
    async fn recv(&mut self) -> TransportEvent;
    async fn close(&mut self);
}

#[derive(Debug, Clone)]
pub struct WsConnector {
    pub connect_timeout: Duration,
}

impl Default for WsConnector {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
        }
    }
}

#[async_trait::async_trait]
impl Connector for WsConnector {
    async fn connect(&self, url: &str) -> Result<Box<dyn Connection>, ConnectError> {
        let handshake = tokio_tungstenite::connect_async(url);
        let (stream, response) = tokio::time::timeout(self.connect_timeout, handshake)
            .await
            .map_err(|_| ConnectError::new("websocket handshake timed out"))?
            .map_err(|err| ConnectError::new(err.to_string()))?;
        stream_trace!("WebSocket handshake to {} answered {}", url, response.status());
        Ok(Box::new(WsConnection { stream }))
    }
}

struct WsConnection {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait::async_trait]
impl Connection for WsConnection {
    async fn recv(&mut self) -> TransportEvent {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => return TransportEvent::Text(text),
                Some(Ok(Message::Binary(data))) => {
                    return TransportEvent::Text(String::from_utf8_lossy(&data).into_owned())
                }
                Some(Ok(Message::Close(frame))) => {
                    return TransportEvent::Closed {
                        code: frame.map(|frame| u16::from(frame.code)),
                    }
                }
                // Pings are answered by tungstenite on the next read.
                Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => continue,
                Some(Err(err)) => return TransportEvent::Failed(err.to_string()),
                None => {
                    return TransportEvent::Closed {
                        code: Some(CLOSE_ABNORMAL),
                    }
                }
            }
        }
    }

    async fn close(&mut self) {
        let frame = CloseFrame {
            code: CloseCode::from(CLOSE_NORMAL),
            reason: "client closed".into(),
        };
        if let Err(err) = self.stream.close(Some(frame)).await {
            stream_trace!("WebSocket close handshake failed: {}", err);
        }
        let _ = self.stream.flush().await;
    }
}
