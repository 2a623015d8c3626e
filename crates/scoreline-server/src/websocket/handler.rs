//! Inbound frame dispatch.

use std::sync::Arc;

use tracing::debug;

use super::connection::ClientConnection;
use super::hub::LiveHub;
use crate::protocol::{ClientIntent, InboundFrame, MatchId, ServerMessage, parse_frame};

/// What routing a frame did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RouteOutcome {
    /// Subscribed to a match.
    Subscribed(MatchId),
    /// Unsubscribed from a match.
    Unsubscribed(MatchId),
    /// Replied with an error; the connection stays open.
    InvalidJson,
    /// Nothing happened.
    Ignored,
}

/// Parses inbound frames and applies them to the hub.
#[derive(Debug, Clone)]
pub struct MessageRouter {
    hub: Arc<LiveHub>,
}

impl MessageRouter {
    /// Create a router over `hub`.
    pub fn new(hub: Arc<LiveHub>) -> Self {
        Self { hub }
    }

    /// Route a text frame.
    pub fn route(&self, connection: &Arc<ClientConnection>, text: &str) -> RouteOutcome {
        match parse_frame(text) {
            InboundFrame::Intent(ClientIntent::Subscribe(match_id)) => {
                if self.hub.subscribe(match_id, connection) {
                    RouteOutcome::Subscribed(match_id)
                } else {
                    RouteOutcome::Ignored
                }
            }
            InboundFrame::Intent(ClientIntent::Unsubscribe(match_id)) => {
                self.hub.unsubscribe(match_id, connection);
                RouteOutcome::Unsubscribed(match_id)
            }
            InboundFrame::InvalidJson => {
                let _ = connection.send_message(&ServerMessage::invalid_json());
                RouteOutcome::InvalidJson
            }
            InboundFrame::Ignored => {
                debug!(conn_id = %connection.id, "ignored frame");
                RouteOutcome::Ignored
            }
        }
    }

    /// Route a binary frame. Non-UTF-8 payloads are treated as invalid JSON.
    pub fn route_bytes(&self, connection: &Arc<ClientConnection>, data: &[u8]) -> RouteOutcome {
        match std::str::from_utf8(data) {
            Ok(text) => self.route(connection, text),
            Err(_) => {
                let _ = connection.send_message(&ServerMessage::invalid_json());
                RouteOutcome::InvalidJson
            }
        }
    }
}
