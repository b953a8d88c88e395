//! Connection lifecycle manager for the live feed.
//!
//! Owns the transport handle, drives the state machine, and fans inbound
//! samples and state changes out to subscribers. Reconnection is entirely
//! manager-driven: the transport dials exactly once per request, so there is
//! never more than one in-flight attempt or more than one live link.
//!
//! Every live link is bound to a monotonically increasing generation. A
//! `reconnect()` or `disconnect()` bumps the generation, which invalidates
//! any pending dial and silences the superseded reader before the new link's
//! events can interleave with the old one's.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use crate::error::ConnectionError;
use crate::sample::Sample;

use super::state::ConnectionState;
use super::transport::{Credentials, LinkEvent, OutboundFrame, Transport, TransportLink};

/// Bound on a single dial, after which the attempt fails with
/// [`ConnectionError::Timeout`].
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Maximum automatic reconnection attempts before the state machine gives up.
pub const MAX_RECONNECT_ATTEMPTS: u32 = 5;

/// Fixed delay between automatic reconnection attempts.
pub const RECONNECT_DELAY: Duration = Duration::from_millis(1000);

/// An event delivered to feed subscribers.
#[derive(Debug, Clone)]
pub enum FeedEvent {
    /// A complete resource sample arrived.
    Sample(Sample),
    /// The connection state changed.
    State(ConnectionState),
}

/// Identity of one live link. Changes on every successful (re)connect;
/// comparing generations tells whether two handles refer to the same link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionHandle {
    generation: u64,
}

impl ConnectionHandle {
    /// The generation this handle was issued under.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Typed unsubscribe handle returned by [`ConnectionManager::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subscription {
    id: u64,
}

/// Manages the live feed connection.
///
/// Cheap to clone; all clones share the same state machine and subscriber
/// list. The transport is injected at construction and exclusively owned by
/// the manager.
#[derive(Debug, Clone)]
pub struct ConnectionManager {
    shared: Arc<Shared>,
}

#[derive(Debug)]
struct Shared {
    transport: Arc<dyn Transport>,
    credentials: Credentials,
    connect_timeout: Duration,
    max_attempts: u32,
    retry_delay: Duration,
    inner: Mutex<Inner>,
}

#[derive(Debug)]
struct Inner {
    state: ConnectionState,
    generation: u64,
    next_subscription: u64,
    subscribers: Vec<(u64, mpsc::UnboundedSender<FeedEvent>)>,
    reader: Option<JoinHandle<()>>,
}

impl ConnectionManager {
    /// Create a manager with the default timing constants.
    pub fn new(transport: Arc<dyn Transport>, credentials: Credentials) -> Self {
        Self::with_timing(
            transport,
            credentials,
            CONNECT_TIMEOUT,
            MAX_RECONNECT_ATTEMPTS,
            RECONNECT_DELAY,
        )
    }

    /// Create a manager with explicit timing, mainly for tests and tuning.
    pub fn with_timing(
        transport: Arc<dyn Transport>,
        credentials: Credentials,
        connect_timeout: Duration,
        max_attempts: u32,
        retry_delay: Duration,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                transport,
                credentials,
                connect_timeout,
                max_attempts,
                retry_delay,
                inner: Mutex::new(Inner {
                    state: ConnectionState::Disconnected,
                    generation: 0,
                    next_subscription: 0,
                    subscribers: Vec::new(),
                    reader: None,
                }),
            }),
        }
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.lock().state.clone()
    }

    /// Register a subscriber for samples and state changes.
    ///
    /// Multiple subscribers are allowed; each gets its own receiver and sees
    /// events in arrival order.
    pub fn subscribe(&self) -> (Subscription, mpsc::UnboundedReceiver<FeedEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.lock();
        inner.next_subscription += 1;
        let id = inner.next_subscription;
        inner.subscribers.push((id, tx));
        (Subscription { id }, rx)
    }

    /// Remove a subscriber. Idempotent; unknown handles are ignored.
    pub fn unsubscribe(&self, subscription: &Subscription) {
        let mut inner = self.lock();
        inner.subscribers.retain(|(id, _)| *id != subscription.id);
    }

    /// Establish the feed connection.
    ///
    /// Fails with [`ConnectionError::Authentication`] before any transport
    /// attempt when the user id is empty. The dial is bounded by the connect
    /// timeout; on success the manager requests an initial data pull and
    /// starts forwarding samples.
    pub async fn connect(&self) -> Result<ConnectionHandle, ConnectionError> {
        if self.shared.credentials.user_id.trim().is_empty() {
            return Err(ConnectionError::Authentication);
        }

        let generation = {
            let mut inner = self.lock();
            inner.generation += 1;
            Self::set_state(&mut inner, ConnectionState::Connecting);
            inner.generation
        };

        let link = self.dial_once(generation).await?;
        self.attach(generation, link).await
    }

    /// Tear down the current handle and establish a fresh one.
    ///
    /// The superseded link's reader is silenced before the new dial starts,
    /// so no callback registered on the prior handle fires again.
    pub async fn reconnect(&self) -> Result<ConnectionHandle, ConnectionError> {
        let reader = {
            let mut inner = self.lock();
            inner.generation += 1;
            inner.reader.take()
        };
        if let Some(task) = reader {
            task.abort();
        }
        info!("Forced teardown complete, redialing");
        self.connect().await
    }

    /// Close the transport and drop all listeners.
    ///
    /// Emits the final `Disconnected` state event before clearing the
    /// subscriber list. Calling this while already disconnected is a no-op.
    pub async fn disconnect(&self) {
        let reader = {
            let mut inner = self.lock();
            if inner.state == ConnectionState::Disconnected {
                return;
            }
            inner.generation += 1;
            let reader = inner.reader.take();
            Self::set_state(&mut inner, ConnectionState::Disconnected);
            inner.subscribers.clear();
            reader
        };
        if let Some(task) = reader {
            task.abort();
        }
        info!("Feed disconnected");
    }

    async fn dial_once(&self, generation: u64) -> Result<Box<dyn TransportLink>, ConnectionError> {
        let dial = self.shared.transport.dial(&self.shared.credentials);
        match timeout(self.shared.connect_timeout, dial).await {
            Ok(Ok(link)) => Ok(link),
            Ok(Err(e)) => {
                self.fail_if_current(generation, e.to_string());
                Err(e)
            }
            Err(_) => {
                let err = ConnectionError::Timeout(self.shared.connect_timeout);
                self.fail_if_current(generation, err.to_string());
                Err(err)
            }
        }
    }

    /// Bind a freshly dialed link to the manager under `generation`.
    ///
    /// If a newer `reconnect()`/`disconnect()` raced the dial, the stale
    /// link is closed without touching state.
    async fn attach(
        &self,
        generation: u64,
        mut link: Box<dyn TransportLink>,
    ) -> Result<ConnectionHandle, ConnectionError> {
        // Initial data pull happens on every transition into Connected
        if let Err(e) = link.send(OutboundFrame::GetResources).await {
            self.fail_if_current(generation, e.to_string());
            return Err(e);
        }

        {
            let mut inner = self.lock();
            if inner.generation == generation {
                Self::set_state(&mut inner, ConnectionState::Connected);
                let task = tokio::spawn(self.clone().run_link(link, generation));
                if let Some(old) = inner.reader.replace(task) {
                    old.abort();
                }
                return Ok(ConnectionHandle { generation });
            }
        }

        link.close().await;
        Err(ConnectionError::Superseded)
    }

    /// Reader task: forwards samples while the link lives, then runs bounded
    /// reconnection. Exits silently once its generation is superseded.
    async fn run_link(self, mut link: Box<dyn TransportLink>, mut generation: u64) {
        loop {
            let reason = loop {
                match link.next_event().await {
                    LinkEvent::Sample(sample) => {
                        if !self.emit_if_current(generation, FeedEvent::Sample(sample)) {
                            link.close().await;
                            return;
                        }
                    }
                    LinkEvent::Closed => break "connection closed by peer".to_string(),
                    LinkEvent::Error(e) => break e,
                }
            };
            link.close().await;
            warn!(reason = %reason, "Feed link lost, starting bounded reconnection");

            let new_link = match self.redial(generation, &reason).await {
                Some(l) => l,
                None => return,
            };

            // Adopt the recovered link under a fresh generation so late
            // events from the dead link can never be mistaken for live ones
            let adopted = {
                let mut inner = self.lock();
                if inner.generation == generation {
                    inner.generation += 1;
                    generation = inner.generation;
                    Self::set_state(&mut inner, ConnectionState::Connected);
                    true
                } else {
                    false
                }
            };
            if !adopted {
                let mut stale = new_link;
                stale.close().await;
                return;
            }
            link = new_link;
            info!("Feed link restored");
        }
    }

    /// Bounded redial loop. Returns `None` when attempts are exhausted or the
    /// generation was superseded; exhaustion transitions to `Failed`.
    async fn redial(&self, generation: u64, reason: &str) -> Option<Box<dyn TransportLink>> {
        for attempt in 1..=self.shared.max_attempts {
            if !self.set_state_if_current(generation, ConnectionState::Reconnecting) {
                return None;
            }
            sleep(self.shared.retry_delay).await;
            if !self.is_current(generation) {
                return None;
            }

            let dial = self.shared.transport.dial(&self.shared.credentials);
            match timeout(self.shared.connect_timeout, dial).await {
                Ok(Ok(mut link)) => match link.send(OutboundFrame::GetResources).await {
                    Ok(()) => return Some(link),
                    Err(e) => {
                        warn!(attempt, error = %e, "Initial pull failed after redial");
                        link.close().await;
                    }
                },
                Ok(Err(e)) => warn!(attempt, error = %e, "Reconnect attempt failed"),
                Err(_) => warn!(attempt, "Reconnect attempt timed out"),
            }
        }

        let err = ConnectionError::RetriesExhausted(self.shared.max_attempts);
        self.fail_if_current(generation, format!("{err}: {reason}"));
        None
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.shared.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn is_current(&self, generation: u64) -> bool {
        self.lock().generation == generation
    }

    fn emit_if_current(&self, generation: u64, event: FeedEvent) -> bool {
        let mut inner = self.lock();
        if inner.generation != generation {
            return false;
        }
        Self::emit(&mut inner, event);
        true
    }

    fn set_state_if_current(&self, generation: u64, state: ConnectionState) -> bool {
        let mut inner = self.lock();
        if inner.generation != generation {
            return false;
        }
        Self::set_state(&mut inner, state);
        true
    }

    fn fail_if_current(&self, generation: u64, reason: String) {
        let mut inner = self.lock();
        if inner.generation == generation {
            Self::set_state(&mut inner, ConnectionState::Failed(reason));
        }
    }

    fn set_state(inner: &mut Inner, state: ConnectionState) {
        if inner.state != state {
            debug!(from = inner.state.label(), to = state.label(), "Connection state change");
            inner.state = state.clone();
            Self::emit(inner, FeedEvent::State(state));
        }
    }

    fn emit(inner: &mut Inner, event: FeedEvent) {
        inner.subscribers.retain(|(_, tx)| tx.send(event.clone()).is_ok());
    }
}
