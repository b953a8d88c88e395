//! Threshold evaluation with edge-triggered alerting.
//!
//! The engine holds one configurable limit per alertable metric, compares
//! each incoming sample value against it, and fires exactly once per rising
//! edge: the transition from below-limit to at-or-above-limit. While a
//! metric stays above its limit no further alerts are produced, which keeps
//! a sustained overage from flooding the gateway with duplicates.
//!
//! Limit edits are debounced: each edit cancels and reschedules a
//! single-slot flush task per metric, so keystroke-by-keystroke changes
//! collapse into one durable write after a quiet period.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::sample::Sample;

use super::dispatch::{AlertRecord, AlertSink};
use super::store::{ThresholdStore, CPU_THRESHOLD_KEY, MEMORY_THRESHOLD_KEY};

/// Quiet period before an edited limit is persisted.
pub const DEBOUNCE_WINDOW: Duration = Duration::from_millis(2000);

/// Metrics the engine can alert on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlertMetric {
    /// CPU usage, percent. Domain [0, 100].
    Cpu,
    /// Memory in use, GB. Domain [0, ∞).
    MemoryGb,
}

impl AlertMetric {
    /// The `resource_type` label used in alert records.
    pub fn resource_type(&self) -> &'static str {
        match self {
            AlertMetric::Cpu => "CPU",
            AlertMetric::MemoryGb => "Memory",
        }
    }

    /// The durable storage key for this metric's limit.
    pub fn storage_key(&self) -> &'static str {
        match self {
            AlertMetric::Cpu => CPU_THRESHOLD_KEY,
            AlertMetric::MemoryGb => MEMORY_THRESHOLD_KEY,
        }
    }

    /// Limit applied when the store holds no value for this metric.
    pub fn default_limit(&self) -> f64 {
        match self {
            AlertMetric::Cpu => 80.0,
            AlertMetric::MemoryGb => 4.0,
        }
    }

    /// Clamp a finite value into this metric's valid domain.
    fn clamp_to_domain(&self, value: f64) -> f64 {
        match self {
            AlertMetric::Cpu => value.clamp(0.0, 100.0),
            AlertMetric::MemoryGb => value.max(0.0),
        }
    }
}

type EdgeCallback = Arc<dyn Fn(&AlertRecord) + Send + Sync>;

/// Edge-triggered threshold engine.
///
/// Cheap to clone; clones share limits, edge state, and pending flush
/// timers. Must live inside a tokio runtime: limit edits and alert dispatch
/// spawn background tasks.
#[derive(Clone)]
pub struct ThresholdEngine {
    shared: Arc<EngineShared>,
}

struct EngineShared {
    store: Arc<ThresholdStore>,
    sink: Arc<dyn AlertSink>,
    user_id: String,
    debounce: Duration,
    state: Mutex<EngineState>,
    callbacks: Mutex<HashMap<AlertMetric, Vec<EdgeCallback>>>,
}

struct EngineState {
    limits: HashMap<AlertMetric, f64>,
    exceeded: HashMap<AlertMetric, bool>,
    pending_flush: HashMap<AlertMetric, JoinHandle<()>>,
}

impl ThresholdEngine {
    /// Create an engine with the default debounce window.
    ///
    /// Limits are read from the store at construction; absent keys fall back
    /// to the per-metric defaults (CPU 80%, memory 4 GB).
    pub fn new(store: Arc<ThresholdStore>, sink: Arc<dyn AlertSink>, user_id: impl Into<String>) -> Self {
        Self::with_debounce(store, sink, user_id, DEBOUNCE_WINDOW)
    }

    /// Create an engine with an explicit debounce window.
    pub fn with_debounce(
        store: Arc<ThresholdStore>,
        sink: Arc<dyn AlertSink>,
        user_id: impl Into<String>,
        debounce: Duration,
    ) -> Self {
        let mut limits = HashMap::new();
        let mut exceeded = HashMap::new();
        for metric in [AlertMetric::Cpu, AlertMetric::MemoryGb] {
            let limit = store.get(metric.storage_key()).unwrap_or(metric.default_limit());
            limits.insert(metric, limit);
            exceeded.insert(metric, false);
        }

        Self {
            shared: Arc::new(EngineShared {
                store,
                sink,
                user_id: user_id.into(),
                debounce,
                state: Mutex::new(EngineState {
                    limits,
                    exceeded,
                    pending_flush: HashMap::new(),
                }),
                callbacks: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Current limit for a metric.
    pub fn limit(&self, metric: AlertMetric) -> f64 {
        *self.lock_state().limits.get(&metric).unwrap_or(&metric.default_limit())
    }

    /// Current edge state for a metric (result of the last evaluation).
    pub fn exceeded(&self, metric: AlertMetric) -> bool {
        *self.lock_state().exceeded.get(&metric).unwrap_or(&false)
    }

    /// Update a metric's limit, returning the effective value.
    ///
    /// Non-finite input is rejected and the last valid limit is retained;
    /// finite out-of-domain input is clamped. Each accepted edit cancels and
    /// reschedules that metric's pending durable write, so rapid edits
    /// produce a single flush carrying the final value.
    pub fn set_limit(&self, metric: AlertMetric, value: f64) -> f64 {
        if !value.is_finite() {
            warn!(metric = metric.resource_type(), "Rejecting non-finite threshold");
            return self.limit(metric);
        }
        let value = metric.clamp_to_domain(value);

        let mut state = self.lock_state();
        state.limits.insert(metric, value);

        if let Some(stale) = state.pending_flush.remove(&metric) {
            stale.abort();
        }
        let shared = self.shared.clone();
        let task = tokio::spawn(async move {
            sleep(shared.debounce).await;
            if let Err(e) = shared.store.set(metric.storage_key(), value) {
                warn!(
                    metric = metric.resource_type(),
                    error = %e,
                    "Failed to persist threshold"
                );
            }
        });
        state.pending_flush.insert(metric, task);
        value
    }

    /// Register a callback fired once per rising edge of a metric.
    pub fn on_edge_rising<F>(&self, metric: AlertMetric, callback: F)
    where
        F: Fn(&AlertRecord) + Send + Sync + 'static,
    {
        self.lock_callbacks().entry(metric).or_default().push(Arc::new(callback));
    }

    /// Evaluate one value against its metric's limit.
    ///
    /// Returns `true` while `current_value >= limit` (boundary inclusive).
    /// On a rising edge the registered callbacks run synchronously and the
    /// alert record is dispatched fire-and-forget; a failed dispatch is
    /// logged and swallowed, never reverting the edge transition.
    pub fn evaluate(&self, metric: AlertMetric, current_value: f64) -> bool {
        let (exceeded, rising, limit) = {
            let mut state = self.lock_state();
            let limit = *state.limits.get(&metric).unwrap_or(&metric.default_limit());
            let exceeded = current_value >= limit;
            let previous = state.exceeded.insert(metric, exceeded).unwrap_or(false);
            (exceeded, exceeded && !previous, limit)
        };

        if rising {
            let record = AlertRecord {
                resource_type: metric.resource_type().to_string(),
                threshold: limit,
                current_value,
                user_id: self.shared.user_id.clone(),
            };
            info!(
                resource = %record.resource_type,
                value = current_value,
                limit,
                "Threshold exceeded, dispatching alert"
            );

            // Invoke outside the guard so a callback may re-enter the engine
            let callbacks: Vec<EdgeCallback> = self
                .lock_callbacks()
                .get(&metric)
                .map(Vec::clone)
                .unwrap_or_default();
            for callback in &callbacks {
                callback(&record);
            }

            let shared = self.shared.clone();
            tokio::spawn(async move {
                if let Err(e) = shared.sink.create_alert(&record).await {
                    warn!(
                        resource = %record.resource_type,
                        error = %e,
                        "Alert dispatch failed"
                    );
                }
            });
        }

        exceeded
    }

    /// Evaluate every alertable metric carried by a sample.
    pub fn evaluate_sample(&self, sample: &Sample) {
        self.evaluate(AlertMetric::Cpu, sample.cpu);
        self.evaluate(AlertMetric::MemoryGb, sample.memory.used_gb());
    }

    fn lock_state(&self) -> MutexGuard<'_, EngineState> {
        self.shared.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_callbacks(&self) -> MutexGuard<'_, HashMap<AlertMetric, Vec<EdgeCallback>>> {
        self.shared.callbacks.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl fmt::Debug for ThresholdEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock_state();
        f.debug_struct("ThresholdEngine")
            .field("limits", &state.limits)
            .field("exceeded", &state.exceeded)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;

    use crate::error::DispatchError;

    #[derive(Debug, Default)]
    struct RecordingSink {
        records: Mutex<Vec<AlertRecord>>,
        failures: AtomicU32,
    }

    impl RecordingSink {
        fn failing() -> Self {
            let sink = Self::default();
            sink.failures.store(u32::MAX, Ordering::SeqCst);
            sink
        }

        fn recorded(&self) -> Vec<AlertRecord> {
            self.records.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl AlertSink for RecordingSink {
        async fn create_alert(&self, alert: &AlertRecord) -> Result<(), DispatchError> {
            if self.failures.load(Ordering::SeqCst) > 0 {
                return Err(DispatchError::Status(500));
            }
            self.records.lock().unwrap().push(alert.clone());
            Ok(())
        }
    }

    fn engine_with(sink: Arc<RecordingSink>) -> (ThresholdEngine, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(ThresholdStore::open(dir.path().join("thresholds.json")).unwrap());
        let engine = ThresholdEngine::new(store, sink, "alice");
        (engine, dir)
    }

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_edge_rising_fires_per_transition_not_per_sample() {
        let sink = Arc::new(RecordingSink::default());
        let (engine, _dir) = engine_with(sink.clone());

        let edges = Arc::new(Mutex::new(Vec::new()));
        let seen = edges.clone();
        engine.on_edge_rising(AlertMetric::Cpu, move |record| {
            seen.lock().unwrap().push(record.current_value);
        });

        // limit 80: rising at 82 and again at 85, not at 90 (still exceeded)
        let expectations = [(75.0, false), (82.0, true), (90.0, true), (78.0, false), (85.0, true)];
        for (value, exceeded) in expectations {
            assert_eq!(engine.evaluate(AlertMetric::Cpu, value), exceeded);
        }

        assert_eq!(edges.lock().unwrap().as_slice(), [82.0, 85.0]);

        settle().await;
        let records = sink.recorded();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].resource_type, "CPU");
        assert_eq!(records[0].threshold, 80.0);
        assert_eq!(records[0].current_value, 82.0);
        assert_eq!(records[0].user_id, "alice");
        assert_eq!(records[1].current_value, 85.0);
    }

    #[tokio::test]
    async fn test_boundary_is_inclusive() {
        let sink = Arc::new(RecordingSink::default());
        let (engine, _dir) = engine_with(sink);

        assert!(engine.evaluate(AlertMetric::Cpu, 80.0));
        assert!(!engine.evaluate(AlertMetric::Cpu, 79.999));
    }

    #[tokio::test]
    async fn test_memory_evaluates_in_gb() {
        let sink = Arc::new(RecordingSink::default());
        let (engine, _dir) = engine_with(sink.clone());

        let sample: Sample = serde_json::from_value(serde_json::json!({
            "cpu": 10.0,
            "memory": {"used": 5120.0, "total": 16384.0, "percentage": 31.25},
            "disk": 10.0,
            "network": {
                "upload_speed": 0.0, "download_speed": 0.0,
                "total_sent": 0.0, "total_recv": 0.0, "total_traffic": 0.0
            }
        }))
        .unwrap();

        // 5120 MB = 5 GB, above the default 4 GB limit
        engine.evaluate_sample(&sample);
        assert!(engine.exceeded(AlertMetric::MemoryGb));
        assert!(!engine.exceeded(AlertMetric::Cpu));

        settle().await;
        let records = sink.recorded();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].resource_type, "Memory");
        assert_eq!(records[0].current_value, 5.0);
    }

    #[tokio::test]
    async fn test_dispatch_failure_never_blocks_the_edge() {
        let sink = Arc::new(RecordingSink::failing());
        let (engine, _dir) = engine_with(sink.clone());

        assert!(engine.evaluate(AlertMetric::Cpu, 95.0));
        settle().await;

        // Edge state advanced despite the failed dispatch, and the next
        // rising edge still fires
        assert!(engine.exceeded(AlertMetric::Cpu));
        assert!(!engine.evaluate(AlertMetric::Cpu, 10.0));
        assert!(engine.evaluate(AlertMetric::Cpu, 95.0));
        assert!(sink.recorded().is_empty());
    }

    #[tokio::test]
    async fn test_edge_callback_may_reenter_the_engine() {
        let sink = Arc::new(RecordingSink::default());
        let (engine, _dir) = engine_with(sink);

        let edges = Arc::new(Mutex::new(Vec::new()));
        let seen = edges.clone();
        let reentrant = engine.clone();
        engine.on_edge_rising(AlertMetric::Cpu, move |record| {
            seen.lock().unwrap().push(record.current_value);
            // Registering and evaluating from inside a callback must not
            // deadlock on the engine's internal locks
            reentrant.on_edge_rising(AlertMetric::MemoryGb, |_| {});
            reentrant.evaluate(AlertMetric::MemoryGb, 0.0);
        });

        assert!(engine.evaluate(AlertMetric::Cpu, 90.0));
        assert_eq!(edges.lock().unwrap().as_slice(), [90.0]);
    }

    #[tokio::test]
    async fn test_invalid_limits_are_rejected_or_clamped() {
        let sink = Arc::new(RecordingSink::default());
        let (engine, _dir) = engine_with(sink);

        assert_eq!(engine.set_limit(AlertMetric::Cpu, 70.0), 70.0);
        // Non-finite input keeps the last valid value
        assert_eq!(engine.set_limit(AlertMetric::Cpu, f64::NAN), 70.0);
        assert_eq!(engine.set_limit(AlertMetric::Cpu, f64::INFINITY), 70.0);
        assert_eq!(engine.limit(AlertMetric::Cpu), 70.0);
        // Out-of-domain input is clamped
        assert_eq!(engine.set_limit(AlertMetric::Cpu, 150.0), 100.0);
        assert_eq!(engine.set_limit(AlertMetric::MemoryGb, -2.0), 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_debounce_coalesces_rapid_edits_into_one_write() {
        let sink = Arc::new(RecordingSink::default());
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("thresholds.json");
        let store = Arc::new(ThresholdStore::open(&path).unwrap());
        let engine = ThresholdEngine::new(store, sink, "alice");

        engine.set_limit(AlertMetric::Cpu, 50.0);
        engine.set_limit(AlertMetric::Cpu, 60.0);
        engine.set_limit(AlertMetric::Cpu, 70.0);
        // Let the surviving flush task register its timer before time moves
        settle().await;

        // Inside the quiet period nothing has been written
        tokio::time::advance(Duration::from_millis(1000)).await;
        settle().await;
        assert!(!path.exists());

        // After the quiet period exactly one write lands, with the last value
        tokio::time::advance(Duration::from_millis(1500)).await;
        settle().await;
        let reopened = ThresholdStore::open(&path).unwrap();
        assert_eq!(reopened.get(CPU_THRESHOLD_KEY), Some(70.0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_limits_survive_restart() {
        let sink = Arc::new(RecordingSink::default());
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("thresholds.json");

        {
            let store = Arc::new(ThresholdStore::open(&path).unwrap());
            let engine = ThresholdEngine::new(store, sink.clone(), "alice");
            engine.set_limit(AlertMetric::MemoryGb, 8.0);
            settle().await;
            tokio::time::advance(DEBOUNCE_WINDOW + Duration::from_millis(100)).await;
            settle().await;
        }

        let store = Arc::new(ThresholdStore::open(&path).unwrap());
        let engine = ThresholdEngine::new(store, sink, "alice");
        assert_eq!(engine.limit(AlertMetric::MemoryGb), 8.0);
        // The untouched metric still uses its default
        assert_eq!(engine.limit(AlertMetric::Cpu), 80.0);
    }
}
