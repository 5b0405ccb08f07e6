//! Connection transport for the session controller.
//!
//! A [`Connector`] opens one logical connection and hands back a pair of
//! channels. [`WsConnector`] backs them with a tokio-tungstenite WebSocket.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};

use crate::error::ClientError;

/// What the transport reports about an open connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A text frame from the server.
    Frame(String),
    /// The connection closed cleanly.
    Closed,
    /// The connection failed. No further events follow.
    Error(String),
}

/// An open connection.
///
/// Dropping `outbound` closes the connection.
pub struct Connection {
    pub outbound: mpsc::UnboundedSender<String>,
    pub inbound: mpsc::UnboundedReceiver<TransportEvent>,
}

#[async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn connect(&self) -> Result<Connection, ClientError>;
}

/// Connects to the relay's `/ws` endpoint.
pub struct WsConnector {
    url: String,
}

impl WsConnector {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self) -> Result<Connection, ClientError> {
        let (ws, _response) = tokio_tungstenite::connect_async(self.url.as_str())
            .await
            .map_err(|e| ClientError::Connect(e.to_string()))?;
        debug!(url = %self.url, "WebSocket connected");

        let (mut sink, mut stream) = ws.split();
        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<String>();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    outgoing = outbound_rx.recv() => match outgoing {
                        Some(text) => {
                            if let Err(e) = sink.send(Message::Text(text.into())).await {
                                let _ = inbound_tx.send(TransportEvent::Error(e.to_string()));
                                break;
                            }
                        }
                        None => {
                            let _ = sink.send(Message::Close(None)).await;
                            break;
                        }
                    },
                    incoming = stream.next() => match incoming {
                        Some(Ok(Message::Text(text))) => {
                            let _ = inbound_tx.send(TransportEvent::Frame(text.as_str().to_string()));
                        }
                        Some(Ok(Message::Close(_))) | None => {
                            let _ = inbound_tx.send(TransportEvent::Closed);
                            break;
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            warn!(error = %e, "WebSocket receive error");
                            let _ = inbound_tx.send(TransportEvent::Error(e.to_string()));
                            break;
                        }
                    },
                }
            }
        });

        Ok(Connection {
            outbound: outbound_tx,
            inbound: inbound_rx,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_refused() {
        // Port 9 (discard) on localhost is almost never listening.
        let connector = WsConnector::new("ws://127.0.0.1:9/ws");
        assert_eq!(connector.url(), "ws://127.0.0.1:9/ws");
        let result = connector.connect().await;
        assert!(matches!(result, Err(ClientError::Connect(_))));
    }

    #[tokio::test]
    async fn test_invalid_url() {
        let connector = WsConnector::new("not a url");
        assert!(matches!(
            connector.connect().await,
            Err(ClientError::Connect(_))
        ));
    }

    #[tokio::test]
    async fn test_wss_attempts_tls_handshake() {
        // A plain TCP listener that hangs up after reading the client hello.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            use tokio::io::AsyncReadExt;
            if let Ok((mut socket, _)) = listener.accept().await {
                let mut buf = [0u8; 1024];
                let _ = socket.read(&mut buf).await;
            }
        });

        let connector = WsConnector::new(format!("wss://127.0.0.1:{}/ws", port));
        match connector.connect().await {
            Err(ClientError::Connect(reason)) => {
                assert!(!reason.contains("TLS support not compiled in"), "{}", reason);
            }
            Err(other) => panic!("unexpected error: {}", other),
            Ok(_) => panic!("plain TCP listener accepted a TLS handshake"),
        }
    }
}
