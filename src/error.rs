//! Error types for the monitoring core.

use std::time::Duration;

use thiserror::Error;

/// Errors raised while establishing or maintaining the live feed.
///
/// Mid-session failures are recovered internally by the connection manager's
/// state machine and reach subscribers only as [`ConnectionState`] changes;
/// these variants surface from the explicit `connect`/`reconnect` calls.
///
/// [`ConnectionState`]: crate::connection::ConnectionState
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// No valid identity at connect time. Fatal to the attempt, never retried.
    #[error("authentication failed: user id is empty")]
    Authentication,

    /// The transport did not open within the allotted bound.
    #[error("connection attempt timed out after {0:?}")]
    Timeout(Duration),

    /// The transport failed to dial or dropped mid-handshake.
    #[error("transport failure: {0}")]
    Transport(String),

    /// A newer `reconnect()` or `disconnect()` was issued while this attempt
    /// was still pending; its handle was discarded without touching state.
    #[error("connection attempt superseded by a newer request")]
    Superseded,

    /// Automatic reconnection gave up after the configured attempt budget.
    #[error("reconnection attempts exhausted after {0} tries")]
    RetriesExhausted(u32),
}

/// Errors from the alert dispatch gateway.
///
/// Dispatch is best-effort: the threshold engine logs these and moves on,
/// never blocking or reverting an edge transition.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// The gateway answered with a non-success status.
    #[error("gateway returned status {0}")]
    Status(u16),

    /// Request timed out.
    #[error("alert request timed out")]
    Timeout,
}

impl From<reqwest::Error> for DispatchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            DispatchError::Timeout
        } else {
            DispatchError::Http(err.to_string())
        }
    }
}

/// Errors from the durable threshold store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Reading or writing the backing file failed.
    #[error("threshold store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// The backing file exists but does not hold a string-to-string map.
    #[error("threshold store is malformed: {0}")]
    Malformed(#[from] serde_json::Error),
}
