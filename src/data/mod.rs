//! Data models and processing for the monitoring pipeline.
//!
//! ## Submodules
//!
//! - [`series`]: Sliding-window per-metric history for charting consumers
//!
//! ## Data Flow
//!
//! ```text
//! Sample (from the feed)
//!        │
//!        ▼
//! SeriesStore::record()
//!        │
//!        └──▶ one SeriesPoint appended per tracked metric (FIFO, capacity 30)
//! ```

pub mod series;

pub use series::{SeriesPoint, SeriesStore, DEFAULT_CAPACITY};
