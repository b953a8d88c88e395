//! Transport abstraction for the live feed.
//!
//! This module provides a trait-based seam between the connection manager
//! and the concrete wire protocol. The manager drives reconnection and
//! listener lifecycle; a [`Transport`] only knows how to dial once and hand
//! back a [`TransportLink`] it never resurrects on its own. Keeping
//! transport-level auto-reconnect off guarantees a single in-flight attempt.

use std::fmt::Debug;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ConnectionError;
use crate::sample::Sample;

/// Session credentials passed as connection query parameters.
#[derive(Debug, Clone)]
pub struct Credentials {
    /// Identity of the monitoring user; must be non-empty.
    pub user_id: String,
    /// Opaque bearer credential for the session-scoped stream.
    pub token: String,
}

impl Credentials {
    pub fn new(user_id: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            token: token.into(),
        }
    }
}

/// Outbound frames the consumer sends on the feed.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum OutboundFrame {
    /// Explicit pull trigger; the backend answers with a `resources` frame.
    GetResources,
}

/// Inbound frames carried by the feed.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum InboundFrame {
    /// A complete resource sample.
    Resources(Sample),
}

/// An event observed on a live link.
#[derive(Debug)]
pub enum LinkEvent {
    /// A well-formed sample arrived.
    Sample(Sample),
    /// The peer closed the link.
    Closed,
    /// The link failed mid-session.
    Error(String),
}

/// Dials the feed endpoint once per call.
#[async_trait]
pub trait Transport: Send + Sync + Debug {
    /// Establish a new link using the given credentials.
    ///
    /// Implementations must not retry internally; bounded reconnection is
    /// owned by the connection manager.
    async fn dial(&self, credentials: &Credentials) -> Result<Box<dyn TransportLink>, ConnectionError>;
}

/// One live, bidirectional feed connection.
#[async_trait]
pub trait TransportLink: Send + Debug {
    /// Send an outbound frame.
    async fn send(&mut self, frame: OutboundFrame) -> Result<(), ConnectionError>;

    /// Wait for the next link event.
    ///
    /// Malformed payloads are handled inside the link (logged and skipped),
    /// so every returned [`LinkEvent::Sample`] is complete and well-formed.
    async fn next_event(&mut self) -> LinkEvent;

    /// Close the link. Idempotent; late peer events after close are ignored.
    async fn close(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outbound_frame_shape() {
        let json = serde_json::to_string(&OutboundFrame::GetResources).unwrap();
        assert_eq!(json, r#"{"event":"get_resources"}"#);
    }

    #[test]
    fn test_inbound_frame_roundtrip() {
        let json = r#"{
            "event": "resources",
            "data": {
                "cpu": 55.0,
                "memory": {"used": 2048.0, "total": 8192.0, "percentage": 25.0},
                "disk": 40.0,
                "network": {
                    "upload_speed": 0.5,
                    "download_speed": 2.0,
                    "total_sent": 10.0,
                    "total_recv": 20.0,
                    "total_traffic": 30.0
                }
            }
        }"#;

        let frame: InboundFrame = serde_json::from_str(json).unwrap();
        let InboundFrame::Resources(sample) = frame;
        assert_eq!(sample.cpu, 55.0);
    }

    #[test]
    fn test_unknown_event_rejected() {
        let json = r#"{"event": "heartbeat", "data": {}}"#;
        assert!(serde_json::from_str::<InboundFrame>(json).is_err());
    }
}
