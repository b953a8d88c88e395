//! Durable key-value storage for threshold limits.
//!
//! A flat JSON object of string keys to decimal-string values, read once at
//! initialization and rewritten whole on each debounce flush. Limits survive
//! process restarts; no concurrent writers are assumed.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::warn;

use crate::error::StoreError;

/// Storage key for the CPU usage limit, percent.
pub const CPU_THRESHOLD_KEY: &str = "cpuThreshold";

/// Storage key for the memory usage limit, GB.
pub const MEMORY_THRESHOLD_KEY: &str = "memoryThresholdGB";

/// File-backed threshold storage.
#[derive(Debug)]
pub struct ThresholdStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl ThresholdStore {
    /// Open the store at `path`, loading existing entries.
    ///
    /// A missing file yields an empty store; callers fall back to their
    /// defaults for absent keys.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let entries = if path.exists() {
            let content = fs::read_to_string(&path)?;
            serde_json::from_str(&content)?
        } else {
            BTreeMap::new()
        };
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    /// Read a limit, parsing its decimal-string value.
    pub fn get(&self, key: &str) -> Option<f64> {
        let entries = self.lock();
        let raw = entries.get(key)?;
        match raw.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(key, raw = raw.as_str(), "Ignoring unparseable threshold value");
                None
            }
        }
    }

    /// Write a limit as a decimal string and persist the whole map.
    ///
    /// The lock is held across the file write so concurrent flushes for
    /// different keys cannot persist a snapshot missing the other's update.
    pub fn set(&self, key: &str, value: f64) -> Result<(), StoreError> {
        let mut entries = self.lock();
        entries.insert(key.to_string(), value.to_string());
        let json = serde_json::to_string_pretty(&*entries)?;
        fs::write(&self.path, json)?;
        Ok(())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, String>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_yields_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = ThresholdStore::open(dir.path().join("thresholds.json")).unwrap();
        assert!(store.get(CPU_THRESHOLD_KEY).is_none());
    }

    #[test]
    fn test_values_round_trip_as_decimal_strings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("thresholds.json");

        let store = ThresholdStore::open(&path).unwrap();
        store.set(MEMORY_THRESHOLD_KEY, 4.5).unwrap();
        store.set(CPU_THRESHOLD_KEY, 80.0).unwrap();

        let raw: BTreeMap<String, String> =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw.get(MEMORY_THRESHOLD_KEY).unwrap(), "4.5");
        assert_eq!(raw.get(CPU_THRESHOLD_KEY).unwrap(), "80");

        // Survives a reopen
        let reopened = ThresholdStore::open(&path).unwrap();
        assert_eq!(reopened.get(MEMORY_THRESHOLD_KEY), Some(4.5));
        assert_eq!(reopened.get(CPU_THRESHOLD_KEY), Some(80.0));
    }

    #[test]
    fn test_concurrent_flushes_keep_both_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("thresholds.json");
        let store = std::sync::Arc::new(ThresholdStore::open(&path).unwrap());

        let writers: Vec<_> = [(CPU_THRESHOLD_KEY, 75.0), (MEMORY_THRESHOLD_KEY, 6.0)]
            .into_iter()
            .map(|(key, value)| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for _ in 0..50 {
                        store.set(key, value).unwrap();
                    }
                })
            })
            .collect();
        for writer in writers {
            writer.join().unwrap();
        }

        // Whichever flush landed last, the persisted map holds both keys
        let reopened = ThresholdStore::open(&path).unwrap();
        assert_eq!(reopened.get(CPU_THRESHOLD_KEY), Some(75.0));
        assert_eq!(reopened.get(MEMORY_THRESHOLD_KEY), Some(6.0));
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("thresholds.json");
        fs::write(&path, "[1, 2, 3]").unwrap();

        assert!(matches!(
            ThresholdStore::open(&path),
            Err(StoreError::Malformed(_))
        ));
    }

    #[test]
    fn test_unparseable_value_reads_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("thresholds.json");
        fs::write(&path, r#"{"cpuThreshold": "lots"}"#).unwrap();

        let store = ThresholdStore::open(&path).unwrap();
        assert!(store.get(CPU_THRESHOLD_KEY).is_none());
    }
}
