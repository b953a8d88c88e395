//! # hostwatch
//!
//! A monitoring core for live host resource feeds.
//!
//! This crate consumes a stream of resource samples (CPU, memory, disk,
//! network) pushed over a persistent WebSocket connection, maintains a
//! bounded per-metric history for charting, and raises edge-triggered
//! threshold alerts that are persisted through a REST gateway.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                         Consumers                            │
//! │   ┌────────────┐      ┌───────────┐      ┌───────────────┐   │
//! │   │ connection │─────▶│   data    │      │     alert     │   │
//! │   │ (manager)  │Sample│ (series)  │      │ (thresholds)  │   │
//! │   └─────┬──────┘      └───────────┘      └───────┬───────┘   │
//! │         │                                        │           │
//! │         ▼                                        ▼           │
//! │   WebSocket feed                        Alert gateway (REST) │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! - **[`connection`]**: Transport ownership, the
//!   disconnected/connecting/connected/reconnecting/failed state machine,
//!   manager-driven bounded reconnection, and subscriber fan-out
//! - **[`data`]**: The sliding-window series store turning point samples
//!   into fixed-capacity chartable series
//! - **[`alert`]**: Per-metric limits with durable storage, debounced limit
//!   edits, edge-triggered evaluation, and best-effort alert dispatch
//! - **[`sample`]**: The resource sample payload model
//!
//! ## Usage
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use hostwatch::alert::{HttpAlertSink, ThresholdEngine, ThresholdStore};
//! use hostwatch::connection::{ConnectionManager, Credentials, FeedEvent, WsTransport};
//! use hostwatch::data::SeriesStore;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let transport = Arc::new(WsTransport::new("ws://localhost:8000/feed"));
//! let manager = ConnectionManager::new(transport, Credentials::new("alice", "token"));
//!
//! let store = Arc::new(ThresholdStore::open("thresholds.json")?);
//! let sink = Arc::new(HttpAlertSink::new("http://localhost:8000", "token"));
//! let engine = ThresholdEngine::new(store, sink, "alice");
//!
//! let mut series = SeriesStore::new();
//! let (_subscription, mut events) = manager.subscribe();
//! manager.connect().await?;
//!
//! while let Some(event) = events.recv().await {
//!     match event {
//!         FeedEvent::Sample(sample) => {
//!             series.record(&sample);
//!             engine.evaluate_sample(&sample);
//!         }
//!         FeedEvent::State(state) => println!("feed is {}", state.label()),
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod alert;
pub mod connection;
pub mod data;
pub mod error;
pub mod sample;

// Re-export main types for convenience
pub use alert::{AlertMetric, AlertRecord, AlertSink, HttpAlertSink, ThresholdEngine, ThresholdStore};
pub use connection::{
    ConnectionHandle, ConnectionManager, ConnectionState, Credentials, FeedEvent, Subscription,
    Transport, TransportLink, WsTransport,
};
pub use data::{SeriesPoint, SeriesStore};
pub use error::{ConnectionError, DispatchError, StoreError};
pub use sample::{MemoryUsage, NetworkUsage, ProcessInfo, Sample};
