//! `/health` endpoint body.

use std::time::Instant;

use serde::Serialize;

/// Health check response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// `"ok"` while serving, `"shutting_down"` after shutdown is signalled.
    pub status: &'static str,
    /// Seconds since the server started.
    pub uptime_secs: u64,
    /// Registered connections.
    pub connections: usize,
    /// Matches with at least one subscriber.
    pub matches: usize,
}

/// Build a health response from live counters.
pub fn health_check(start_time: Instant, connections: usize, matches: usize, shutting_down: bool) -> HealthResponse {
    HealthResponse {
        status: if shutting_down { "shutting_down" } else { "ok" },
        uptime_secs: start_time.elapsed().as_secs(),
        connections,
        matches,
    }
}
