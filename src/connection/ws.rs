//! WebSocket transport for the live feed.
//!
//! Dials the backend over a persistent WebSocket carrying newline-free JSON
//! frames: outbound `get_resources` pull triggers and inbound `resources`
//! payloads. Session identity travels as `user_id` and `token` query
//! parameters on the connection URL.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};

use crate::error::ConnectionError;

use super::transport::{Credentials, InboundFrame, LinkEvent, OutboundFrame, Transport, TransportLink};

/// WebSocket implementation of [`Transport`].
///
/// Each [`dial`](Transport::dial) opens a fresh socket; the transport never
/// reconnects on its own.
#[derive(Debug, Clone)]
pub struct WsTransport {
    endpoint: String,
}

impl WsTransport {
    /// Create a transport for the given endpoint, e.g. `ws://localhost:8000/feed`.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
        }
    }

    fn session_url(&self, credentials: &Credentials) -> String {
        format!(
            "{}?user_id={}&token={}",
            self.endpoint,
            urlencoded(&credentials.user_id),
            urlencoded(&credentials.token)
        )
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn dial(&self, credentials: &Credentials) -> Result<Box<dyn TransportLink>, ConnectionError> {
        let url = self.session_url(credentials);
        let (stream, _) = connect_async(url.as_str())
            .await
            .map_err(|e| ConnectionError::Transport(e.to_string()))?;

        debug!(endpoint = %self.endpoint, "WebSocket opened");
        Ok(Box::new(WsLink { stream }))
    }
}

#[derive(Debug)]
struct WsLink {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl TransportLink for WsLink {
    async fn send(&mut self, frame: OutboundFrame) -> Result<(), ConnectionError> {
        let json = serde_json::to_string(&frame)
            .map_err(|e| ConnectionError::Transport(e.to_string()))?;
        self.stream
            .send(Message::Text(json.into()))
            .await
            .map_err(|e| ConnectionError::Transport(e.to_string()))
    }

    async fn next_event(&mut self) -> LinkEvent {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    match serde_json::from_str::<InboundFrame>(&text) {
                        Ok(InboundFrame::Resources(sample)) => return LinkEvent::Sample(sample),
                        Err(e) => {
                            // Malformed payloads are dropped, not merged
                            warn!(error = %e, "Dropping malformed feed payload");
                        }
                    }
                }
                Some(Ok(Message::Close(_))) => return LinkEvent::Closed,
                Some(Ok(_)) => {
                    // Ping/pong and binary frames carry no samples
                }
                Some(Err(e)) => return LinkEvent::Error(e.to_string()),
                None => return LinkEvent::Closed,
            }
        }
    }

    async fn close(&mut self) {
        let _ = self.stream.close(None).await;
    }
}

// Percent-encode a query parameter value
fn urlencoded(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            'A'..='Z' | 'a'..='z' | '0'..='9' | '-' | '_' | '.' | '~' => out.push(c),
            _ => {
                let mut buf = [0u8; 4];
                for byte in c.encode_utf8(&mut buf).as_bytes() {
                    out.push_str(&format!("%{:02X}", byte));
                }
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_url_carries_identity() {
        let transport = WsTransport::new("ws://localhost:8000/feed");
        let url = transport.session_url(&Credentials::new("alice", "tok-123"));
        assert_eq!(url, "ws://localhost:8000/feed?user_id=alice&token=tok-123");
    }

    #[test]
    fn test_session_url_escapes_reserved() {
        let transport = WsTransport::new("ws://localhost:8000/feed");
        let url = transport.session_url(&Credentials::new("a&b", "t=1"));
        assert_eq!(url, "ws://localhost:8000/feed?user_id=a%26b&token=t%3D1");
    }
}
