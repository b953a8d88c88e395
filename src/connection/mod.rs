//! Live feed connection handling.
//!
//! The [`ConnectionManager`] owns the transport, drives the
//! disconnected/connecting/connected/reconnecting/failed state machine, and
//! fans samples and state changes out to subscribers. The [`Transport`]
//! trait is the seam to the concrete wire protocol; [`WsTransport`] is the
//! production WebSocket implementation.

mod manager;
mod state;
mod transport;
mod ws;

pub use manager::{
    ConnectionHandle, ConnectionManager, FeedEvent, Subscription, CONNECT_TIMEOUT,
    MAX_RECONNECT_ATTEMPTS, RECONNECT_DELAY,
};
pub use state::ConnectionState;
pub use transport::{Credentials, InboundFrame, LinkEvent, OutboundFrame, Transport, TransportLink};
pub use ws::WsTransport;
