//! Fan-out entry points for the data-write path.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use super::hub::LiveHub;
use crate::protocol::{MatchId, encode_commentary, encode_match_created};

/// Best-effort delivery of match and commentary events.
///
/// Connections that are not open, or whose queue is full, are skipped.
#[derive(Debug, Clone)]
pub struct Broadcaster {
    hub: Arc<LiveHub>,
}

impl Broadcaster {
    /// Create a broadcaster over `hub`.
    pub fn new(hub: Arc<LiveHub>) -> Self {
        Self { hub }
    }

    /// Announce a new match to every open connection. Returns deliveries.
    pub fn broadcast_match_created<T: Serialize>(&self, data: &T) -> usize {
        let recipients = self.hub.open_connections();
        if recipients.is_empty() {
            return 0;
        }
        let json = match encode_match_created(data) {
            Ok(json) => Arc::new(json),
            Err(e) => {
                warn!(error = %e, "failed to serialize match");
                return 0;
            }
        };
        let delivered = recipients
            .iter()
            .filter(|c| c.send(Arc::clone(&json)))
            .count();
        debug!(recipients = recipients.len(), delivered, "broadcast match_created");
        delivered
    }

    /// Deliver commentary to subscribers of `match_id`. Returns deliveries.
    pub fn broadcast_commentary<T: Serialize>(&self, match_id: MatchId, data: &T) -> usize {
        let recipients = self.hub.subscribers(match_id);
        if recipients.is_empty() {
            return 0;
        }
        let json = match encode_commentary(data) {
            Ok(json) => Arc::new(json),
            Err(e) => {
                warn!(%match_id, error = %e, "failed to serialize commentary");
                return 0;
            }
        };
        let delivered = recipients
            .iter()
            .filter(|c| c.send(Arc::clone(&json)))
            .count();
        debug!(%match_id, recipients = recipients.len(), delivered, "broadcast commentary");
        delivered
    }
}
