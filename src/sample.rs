//! Shared types for resource samples.
//!
//! These types match the JSON payload carried by the feed's `resources`
//! event. They are the common data format between the backend collector
//! and this monitoring consumer.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One complete snapshot of all monitored host metrics at a point in time.
///
/// Every top-level field is mandatory: a payload missing any of them fails
/// deserialization and is dropped by the transport as malformed. Partial
/// samples are never merged with earlier ones.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sample {
    /// CPU usage percentage in [0, 100].
    pub cpu: f64,

    /// Current CPU frequency in MHz, if the collector reports it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_frequency: Option<f64>,

    /// CPU package temperature in degrees Celsius, if available.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_temperature: Option<f64>,

    /// Number of active processes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub process_count: Option<u64>,

    /// Per-process detail rows for the process table.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processes: Option<Vec<ProcessInfo>>,

    /// Memory usage breakdown.
    pub memory: MemoryUsage,

    /// Disk space used, in GB.
    pub disk: f64,

    /// Network throughput and totals.
    pub network: NetworkUsage,
}

/// A single process entry from the feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessInfo {
    pub pid: u32,
    pub name: String,
    /// CPU share of this process, percentage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_usage: Option<f64>,
}

/// Memory usage at sample time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryUsage {
    /// Memory in use, MB.
    pub used: f64,
    /// Total installed memory, MB.
    pub total: f64,
    /// Usage percentage in [0, 100].
    pub percentage: f64,
}

impl MemoryUsage {
    /// Memory in use expressed in GB, the unit the memory threshold uses.
    pub fn used_gb(&self) -> f64 {
        self.used / 1024.0
    }
}

/// Network throughput, totals, and per-interface traffic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkUsage {
    /// Current upload speed, Mbps.
    pub upload_speed: f64,
    /// Current download speed, Mbps.
    pub download_speed: f64,
    /// Total bytes sent since boot, MB.
    pub total_sent: f64,
    /// Total bytes received since boot, MB.
    pub total_recv: f64,
    /// Combined traffic, MB.
    pub total_traffic: f64,
    /// Traffic per active interface, keyed by interface name.
    #[serde(default)]
    pub active_interfaces: BTreeMap<String, InterfaceTraffic>,
}

/// Traffic counters for one network interface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterfaceTraffic {
    /// Bytes sent on this interface, MB.
    #[serde(default)]
    pub sent: f64,
    /// Bytes received on this interface, MB.
    #[serde(default)]
    pub recv: f64,
    /// Combined traffic on this interface, MB.
    pub total_traffic: f64,
}
