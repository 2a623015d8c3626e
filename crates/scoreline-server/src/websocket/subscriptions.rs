//! Per-match subscription buckets.
//!
//! A match appears in a connection's subscription set iff the connection is
//! in that match's bucket. Every mutation updates both sides together, and
//! buckets are dropped as soon as they empty.

use std::collections::HashMap;
use std::sync::Arc;

use super::connection::ClientConnection;
use crate::protocol::{MatchId, ServerMessage};

/// Match ID → subscribed connections. Not synchronized; the hub owns the lock.
#[derive(Debug, Default)]
pub struct SubscriptionIndex {
    buckets: HashMap<MatchId, HashMap<String, Arc<ClientConnection>>>,
}

impl SubscriptionIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe `connection` to `match_id` and acknowledge. Idempotent.
    ///
    /// Returns `false` without touching state when the connection is no
    /// longer open.
    pub fn subscribe(&mut self, match_id: MatchId, connection: &Arc<ClientConnection>) -> bool {
        if !connection.is_open() {
            return false;
        }
        let _ = self
            .buckets
            .entry(match_id)
            .or_default()
            .insert(connection.id.clone(), Arc::clone(connection));
        connection.add_subscription(match_id);
        let _ = connection.send_message(&ServerMessage::Subscribed { match_id });
        true
    }

    /// Unsubscribe `connection` from `match_id` and acknowledge. The ack is
    /// sent even when the connection was not subscribed.
    pub fn unsubscribe(&mut self, match_id: MatchId, connection: &ClientConnection) {
        self.detach(match_id, &connection.id);
        connection.remove_subscription(match_id);
        let _ = connection.send_message(&ServerMessage::Unsubscribed { match_id });
    }

    /// Remove `connection` from every bucket it is in. Sends nothing and is
    /// a no-op on repeat calls.
    pub fn cleanup(&mut self, connection: &ClientConnection) -> usize {
        let ids = connection.take_subscriptions();
        for match_id in &ids {
            self.detach(*match_id, &connection.id);
        }
        ids.len()
    }

    fn detach(&mut self, match_id: MatchId, connection_id: &str) {
        if let Some(bucket) = self.buckets.get_mut(&match_id) {
            let _ = bucket.remove(connection_id);
            if bucket.is_empty() {
                let _ = self.buckets.remove(&match_id);
            }
        }
    }

    /// Open subscribers of `match_id`. Does not allocate when there are none.
    pub fn subscribers(&self, match_id: MatchId) -> Vec<Arc<ClientConnection>> {
        self.buckets.get(&match_id).map_or_else(Vec::new, |bucket| {
            bucket.values().filter(|c| c.is_open()).cloned().collect()
        })
    }

    /// Size of the bucket for `match_id`.
    pub fn bucket_len(&self, match_id: MatchId) -> usize {
        self.buckets.get(&match_id).map_or(0, HashMap::len)
    }

    /// Whether a bucket exists for `match_id`.
    pub fn has_bucket(&self, match_id: MatchId) -> bool {
        self.buckets.contains_key(&match_id)
    }

    /// Whether `connection_id` is in the bucket for `match_id`.
    pub fn contains(&self, match_id: MatchId, connection_id: &str) -> bool {
        self.buckets
            .get(&match_id)
            .is_some_and(|bucket| bucket.contains_key(connection_id))
    }

    /// Number of matches with at least one subscriber.
    pub fn match_count(&self) -> usize {
        self.buckets.len()
    }
}
