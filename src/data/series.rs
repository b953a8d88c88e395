//! Sliding-window time-series storage for charting.
//!
//! Turns the stream of point samples into fixed-capacity, FIFO-evicting
//! per-metric buffers. Buffers are independent: a gap in one metric's
//! samples never shifts another's indices.

use std::collections::{HashMap, VecDeque};

use chrono::{Local, TimeZone};

use crate::sample::Sample;

/// Default number of points kept per metric.
pub const DEFAULT_CAPACITY: usize = 30;

/// Well-known metric names the store tracks out of a [`Sample`].
pub mod metric {
    pub const CPU: &str = "cpu";
    pub const MEMORY: &str = "memory";
    pub const DISK: &str = "disk";
    pub const NETWORK_UPLOAD: &str = "network_upload";
    pub const NETWORK_DOWNLOAD: &str = "network_download";
}

/// One charted data point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeriesPoint {
    /// Unix timestamp in milliseconds when the point was recorded.
    pub timestamp_ms: u64,
    /// Metric value at that instant.
    pub value: f64,
}

impl SeriesPoint {
    pub fn new(timestamp_ms: u64, value: f64) -> Self {
        Self { timestamp_ms, value }
    }

    /// A point stamped with the current wall clock.
    pub fn now(value: f64) -> Self {
        let timestamp_ms = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;
        Self { timestamp_ms, value }
    }

    /// Wall-clock label for chart axes, e.g. "14:03:27".
    pub fn label(&self) -> String {
        match Local.timestamp_millis_opt(self.timestamp_ms as i64) {
            chrono::LocalResult::Single(dt) => dt.format("%H:%M:%S").to_string(),
            _ => String::new(),
        }
    }
}

/// Bounded per-metric history of recent samples.
#[derive(Debug, Clone)]
pub struct SeriesStore {
    capacity: usize,
    clear_on_reconnect: bool,
    series: HashMap<String, VecDeque<SeriesPoint>>,
}

impl Default for SeriesStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SeriesStore {
    /// Store with the default capacity, clearing history on reconnect.
    pub fn new() -> Self {
        Self::with_policy(DEFAULT_CAPACITY, true)
    }

    /// Store with explicit capacity and reconnect policy.
    ///
    /// `clear_on_reconnect: false` keeps pre-outage points, stitching the
    /// chart across the gap the way the original feed consumer did.
    pub fn with_policy(capacity: usize, clear_on_reconnect: bool) -> Self {
        Self {
            capacity,
            clear_on_reconnect,
            series: HashMap::new(),
        }
    }

    /// Fold one sample into every tracked metric's buffer.
    pub fn record(&mut self, sample: &Sample) {
        let point = |value| SeriesPoint::now(value);
        self.append(metric::CPU, point(sample.cpu));
        self.append(metric::MEMORY, point(sample.memory.percentage));
        self.append(metric::DISK, point(sample.disk));
        self.append(metric::NETWORK_UPLOAD, point(sample.network.upload_speed));
        self.append(metric::NETWORK_DOWNLOAD, point(sample.network.download_speed));
    }

    /// Append a point to one metric's buffer, evicting the oldest point once
    /// the buffer is full. Arrival order is temporal order.
    pub fn append(&mut self, metric: &str, point: SeriesPoint) {
        let buffer = self.series.entry(metric.to_string()).or_default();
        buffer.push_back(point);
        if buffer.len() > self.capacity {
            buffer.pop_front();
        }
    }

    /// Owned copy of one metric's buffer, oldest first.
    pub fn snapshot(&self, metric: &str) -> Vec<SeriesPoint> {
        self.series
            .get(metric)
            .map(|buffer| buffer.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Number of points currently held for one metric.
    pub fn len(&self, metric: &str) -> usize {
        self.series.get(metric).map_or(0, VecDeque::len)
    }

    /// True when no metric holds any points.
    pub fn is_empty(&self) -> bool {
        self.series.values().all(VecDeque::is_empty)
    }

    /// Clear all buffers.
    pub fn reset(&mut self) {
        self.series.clear();
    }

    /// Apply the reconnect policy: clears history unless configured to keep it.
    pub fn on_reconnect(&mut self) {
        if self.clear_on_reconnect {
            self.reset();
        }
    }
}
