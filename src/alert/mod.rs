//! Threshold-based alerting.
//!
//! ## Submodules
//!
//! - [`store`]: Durable key-value storage for configured limits
//! - [`engine`]: Edge-triggered evaluation with debounced persistence
//! - [`dispatch`]: Gateway client that persists alert records

pub mod dispatch;
pub mod engine;
pub mod store;

pub use dispatch::{AlertRecord, AlertSink, HttpAlertSink};
pub use engine::{AlertMetric, ThresholdEngine, DEBOUNCE_WINDOW};
pub use store::{ThresholdStore, CPU_THRESHOLD_KEY, MEMORY_THRESHOLD_KEY};
