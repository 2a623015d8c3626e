//! Per-client connection state.
//!
//! Each connection is a small state machine (`Open → Closing → Closed`).
//! Every termination trigger funnels through [`ClientConnection::apply`],
//! which reports `true` exactly once: on the first transition into
//! `Closed`. That return value gates subscription cleanup.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::protocol::{MatchId, ServerMessage};

/// Connection identifier, `conn_<uuid v7>`.
pub type ConnectionId = String;

/// Mint a fresh connection identifier.
pub fn new_connection_id() -> ConnectionId {
    format!("conn_{}", uuid::Uuid::now_v7())
}

/// Frames queued for the socket writer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outbound {
    /// A text frame.
    Text(Arc<String>),
    /// A liveness probe.
    Ping,
}

/// Lifecycle state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    /// Accepting deliveries.
    Open,
    /// Peer sent a close frame; waiting for the socket to drain.
    Closing,
    /// Terminated and detached from every subscription.
    Closed,
}

/// Events that drive the lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// Probe response received.
    Pong,
    /// Inbound data frame received.
    Frame,
    /// Peer sent a close frame.
    PeerClose,
    /// Read or write on the socket failed.
    TransportError,
    /// Peer missed a liveness probe.
    HeartbeatTimeout,
    /// Server is shutting down.
    Shutdown,
    /// The read side ended.
    Drained,
}

/// Pure transition: returns the next state.
pub fn transition(state: ConnectionState, event: LifecycleEvent) -> ConnectionState {
    use ConnectionState::{Closed, Closing, Open};
    use LifecycleEvent::{Drained, Frame, HeartbeatTimeout, PeerClose, Pong, Shutdown, TransportError};

    match (state, event) {
        (Closed, _) => Closed,
        (Open, Pong | Frame) => Open,
        (Open, PeerClose) | (Closing, Pong | Frame | PeerClose) => Closing,
        (Open | Closing, TransportError | HeartbeatTimeout | Shutdown | Drained) => Closed,
    }
}

/// A connected client.
pub struct ClientConnection {
    /// Unique connection ID.
    pub id: ConnectionId,
    tx: mpsc::Sender<Outbound>,
    /// When this connection was accepted.
    pub connected_at: Instant,
    is_alive: AtomicBool,
    state: Mutex<ConnectionState>,
    subscriptions: Mutex<HashSet<MatchId>>,
    cancel: CancellationToken,
    dropped_messages: AtomicU64,
}

impl std::fmt::Debug for ClientConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConnection")
            .field("id", &self.id)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl ClientConnection {
    /// Create an open, alive connection with no subscriptions.
    pub fn new(id: ConnectionId, tx: mpsc::Sender<Outbound>) -> Self {
        Self {
            id,
            tx,
            connected_at: Instant::now(),
            is_alive: AtomicBool::new(true),
            state: Mutex::new(ConnectionState::Open),
            subscriptions: Mutex::new(HashSet::new()),
            cancel: CancellationToken::new(),
            dropped_messages: AtomicU64::new(0),
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        *self.state.lock()
    }

    /// Whether deliveries are accepted.
    pub fn is_open(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    /// Apply `event`. Returns `true` only for the transition that first
    /// enters `Closed`.
    pub fn apply(&self, event: LifecycleEvent) -> bool {
        let mut state = self.state.lock();
        let next = transition(*state, event);
        let entered_closed = *state != ConnectionState::Closed && next == ConnectionState::Closed;
        *state = next;
        entered_closed
    }

    /// Queue a text frame. Returns `false` when not open or the queue is full.
    pub fn send(&self, text: Arc<String>) -> bool {
        if !self.is_open() {
            return false;
        }
        self.enqueue(Outbound::Text(text))
    }

    /// Serialize and queue a control message.
    pub fn send_message(&self, message: &ServerMessage) -> bool {
        match serde_json::to_string(message) {
            Ok(json) => self.send(Arc::new(json)),
            Err(e) => {
                warn!(conn_id = %self.id, error = %e, "failed to serialize message");
                false
            }
        }
    }

    /// Queue a liveness probe.
    pub fn ping(&self) -> bool {
        self.is_open() && self.enqueue(Outbound::Ping)
    }

    fn enqueue(&self, frame: Outbound) -> bool {
        if self.tx.try_send(frame).is_ok() {
            true
        } else {
            let _ = self.dropped_messages.fetch_add(1, Ordering::Relaxed);
            false
        }
    }

    /// Frames dropped because the queue was full or closed.
    pub fn drop_count(&self) -> u64 {
        self.dropped_messages.load(Ordering::Relaxed)
    }

    /// Probe answered.
    pub fn mark_alive(&self) {
        self.is_alive.store(true, Ordering::Relaxed);
    }

    /// Clear the alive flag, returning its previous value.
    pub fn check_alive(&self) -> bool {
        self.is_alive.swap(false, Ordering::Relaxed)
    }

    /// Current alive flag.
    pub fn is_alive(&self) -> bool {
        self.is_alive.load(Ordering::Relaxed)
    }

    /// Stop all I/O for this connection.
    pub fn terminate(&self) {
        self.cancel.cancel();
    }

    /// Token cancelled on termination.
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Matches currently subscribed to.
    pub fn subscriptions(&self) -> Vec<MatchId> {
        let mut ids: Vec<MatchId> = self.subscriptions.lock().iter().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Whether subscribed to `match_id`.
    pub fn is_subscribed(&self, match_id: MatchId) -> bool {
        self.subscriptions.lock().contains(&match_id)
    }

    pub(crate) fn add_subscription(&self, match_id: MatchId) {
        let _ = self.subscriptions.lock().insert(match_id);
    }

    pub(crate) fn remove_subscription(&self, match_id: MatchId) {
        let _ = self.subscriptions.lock().remove(&match_id);
    }

    pub(crate) fn take_subscriptions(&self) -> Vec<MatchId> {
        self.subscriptions.lock().drain().collect()
    }

    /// Connection age.
    pub fn age(&self) -> Duration {
        self.connected_at.elapsed()
    }
}
