//! Connection state machine states.

/// The lifecycle state of the live feed connection.
///
/// Created as [`Disconnected`] at manager construction and mutated only by
/// the manager, in response to transport events or explicit caller action.
/// Consumers observe transitions through [`FeedEvent::State`] but never
/// mutate the state themselves.
///
/// ```text
/// Disconnected --connect()--> Connecting --open--> Connected
/// Connected --close/error--> Reconnecting --.. (max 5) ..--> Failed
/// Connected --disconnect()--> Disconnected
/// any state --reconnect()--> Connecting
/// ```
///
/// [`Disconnected`]: ConnectionState::Disconnected
/// [`FeedEvent::State`]: crate::connection::FeedEvent::State
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    /// No transport; the initial state and the result of `disconnect()`.
    Disconnected,
    /// A dial is in flight.
    Connecting,
    /// The transport is open and samples are flowing.
    Connected,
    /// The transport dropped mid-session; automatic recovery is running.
    Reconnecting,
    /// Recovery gave up or the dial timed out; manual `reconnect()` required.
    Failed(String),
}

impl ConnectionState {
    /// Returns the display label for this state.
    pub fn label(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Reconnecting => "reconnecting",
            ConnectionState::Failed(_) => "failed",
        }
    }

    /// True while the feed is delivering samples.
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }

    /// True once the state machine has given up; only `reconnect()` leaves it.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ConnectionState::Failed(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels() {
        assert_eq!(ConnectionState::Disconnected.label(), "disconnected");
        assert_eq!(ConnectionState::Failed("boom".into()).label(), "failed");
    }

    #[test]
    fn test_predicates() {
        assert!(ConnectionState::Connected.is_connected());
        assert!(!ConnectionState::Reconnecting.is_connected());
        assert!(ConnectionState::Failed("gone".into()).is_terminal());
        assert!(!ConnectionState::Connecting.is_terminal());
    }
}
