//! Shared connection state behind one lock.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use super::connection::{ClientConnection, LifecycleEvent};
use super::registry::ConnectionRegistry;
use super::subscriptions::SubscriptionIndex;
use crate::protocol::MatchId;

#[derive(Debug, Default)]
struct HubInner {
    registry: ConnectionRegistry,
    index: SubscriptionIndex,
    closed: bool,
}

/// Registry and subscription index, mutated under a single mutex.
///
/// The lock is never held across an await or a socket write; deliveries go
/// through each connection's bounded queue.
#[derive(Debug, Default)]
pub struct LiveHub {
    inner: Mutex<HubInner>,
}

impl LiveHub {
    /// Create an empty hub.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an accepted connection.
    ///
    /// Once [`close_all`](Self::close_all) has run the hub refuses new
    /// connections: the connection is closed with `Shutdown` and `false` is
    /// returned.
    pub fn admit(&self, connection: Arc<ClientConnection>) -> bool {
        let id = connection.id.clone();
        let admitted = {
            let mut inner = self.inner.lock();
            if inner.closed {
                None
            } else {
                let _ = inner.registry.add(connection.clone());
                Some(inner.registry.len())
            }
        };
        let Some(total) = admitted else {
            let _ = connection.apply(LifecycleEvent::Shutdown);
            connection.terminate();
            warn!(conn_id = %id, "hub closed, connection refused");
            return false;
        };
        info!(conn_id = %id, connections = total, "client connected");
        true
    }

    /// Subscribe `connection` to `match_id`.
    pub fn subscribe(&self, match_id: MatchId, connection: &Arc<ClientConnection>) -> bool {
        let subscribed = self.inner.lock().index.subscribe(match_id, connection);
        debug!(conn_id = %connection.id, %match_id, subscribed, "subscribe");
        subscribed
    }

    /// Unsubscribe `connection` from `match_id`.
    pub fn unsubscribe(&self, match_id: MatchId, connection: &ClientConnection) {
        self.inner.lock().index.unsubscribe(match_id, connection);
        debug!(conn_id = %connection.id, %match_id, "unsubscribe");
    }

    /// Drive `connection` with a termination event.
    ///
    /// On the first transition into `Closed` it stops the connection's I/O,
    /// removes it from the registry and from every bucket, and returns
    /// `true`. Later calls return `false` and do nothing.
    pub fn disconnect(&self, connection: &ClientConnection, event: LifecycleEvent) -> bool {
        if !connection.apply(event) {
            return false;
        }
        connection.terminate();
        let (released, remaining) = {
            let mut inner = self.inner.lock();
            let _ = inner.registry.remove(&connection.id);
            let released = inner.index.cleanup(connection);
            (released, inner.registry.len())
        };
        info!(
            conn_id = %connection.id,
            reason = ?event,
            released_subscriptions = released,
            dropped_frames = connection.drop_count(),
            connections = remaining,
            duration_secs = connection.age().as_secs(),
            "client disconnected"
        );
        true
    }

    /// Terminate every connection and refuse later admissions. Returns how
    /// many were closed.
    pub fn close_all(&self) -> usize {
        let connections: Vec<_> = {
            let mut inner = self.inner.lock();
            inner.closed = true;
            inner.registry.iter().cloned().collect()
        };
        connections
            .iter()
            .filter(|c| self.disconnect(c, LifecycleEvent::Shutdown))
            .count()
    }

    /// Whether [`close_all`](Self::close_all) has run.
    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    /// Snapshot of every registered connection.
    pub fn connections(&self) -> Vec<Arc<ClientConnection>> {
        self.inner.lock().registry.iter().cloned().collect()
    }

    /// Snapshot of open connections.
    pub fn open_connections(&self) -> Vec<Arc<ClientConnection>> {
        self.inner.lock().registry.iter_open().cloned().collect()
    }

    /// Snapshot of open subscribers of `match_id`.
    pub fn subscribers(&self, match_id: MatchId) -> Vec<Arc<ClientConnection>> {
        self.inner.lock().index.subscribers(match_id)
    }

    /// Number of registered connections.
    pub fn connection_count(&self) -> usize {
        self.inner.lock().registry.len()
    }

    /// Number of matches with subscribers.
    pub fn match_count(&self) -> usize {
        self.inner.lock().index.match_count()
    }

    /// Whether a bucket exists for `match_id`.
    pub fn has_bucket(&self, match_id: MatchId) -> bool {
        self.inner.lock().index.has_bucket(match_id)
    }

    /// Whether `connection_id` is registered.
    pub fn is_registered(&self, connection_id: &str) -> bool {
        self.inner.lock().registry.get(connection_id).is_some()
    }
}
