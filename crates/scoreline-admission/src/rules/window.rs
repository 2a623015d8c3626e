//! Per-client sliding-window counters.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::policy::SlidingWindow;

/// Result of counting one request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WindowVerdict {
    /// Counted; `remaining` more fit in the window.
    Counted {
        /// Requests left before the limit.
        remaining: u32,
    },
    /// Over the limit. The request was not recorded.
    Exceeded {
        /// Time until the oldest entry expires.
        retry_after: Duration,
    },
}

/// Timestamps of admitted requests, keyed by `policy:client`.
#[derive(Debug, Default)]
pub struct WindowLimiter {
    hits: DashMap<String, VecDeque<Instant>>,
}

impl WindowLimiter {
    /// Create an empty limiter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a request under `key` at `now`.
    pub fn check_at(&self, key: &str, window: &SlidingWindow, now: Instant) -> WindowVerdict {
        let interval = window.interval();
        let mut hits = self.hits.entry(key.to_string()).or_default();

        while hits
            .front()
            .is_some_and(|&at| now.saturating_duration_since(at) >= interval)
        {
            let _ = hits.pop_front();
        }

        let count = u32::try_from(hits.len()).unwrap_or(u32::MAX);
        if count >= window.max_requests {
            let retry_after = hits
                .front()
                .map_or(interval, |&oldest| (oldest + interval).saturating_duration_since(now));
            return WindowVerdict::Exceeded { retry_after };
        }

        hits.push_back(now);
        WindowVerdict::Counted {
            remaining: window.max_requests - count - 1,
        }
    }

    /// Drop keys whose newest entry is older than `horizon`. Returns how many
    /// keys were dropped.
    pub fn prune_at(&self, now: Instant, horizon: Duration) -> usize {
        let before = self.hits.len();
        self.hits.retain(|_, hits| {
            hits.back()
                .is_some_and(|&at| now.saturating_duration_since(at) < horizon)
        });
        before.saturating_sub(self.hits.len())
    }

    /// Number of keys being tracked.
    pub fn tracked(&self) -> usize {
        self.hits.len()
    }
}
