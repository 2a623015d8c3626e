//! Decision providers.
//!
//! The gate talks to a [`DecisionProvider`]; [`RuleEngine`] is the in-process
//! implementation and [`RemoteDecisionProvider`](crate::remote::RemoteDecisionProvider)
//! delegates to an external service. Tests substitute their own.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::debug;

use crate::decision::{Decision, DenyReason};
use crate::errors::Result;
use crate::policy::Policy;
use crate::request::RequestFacts;
use crate::rules::{Shield, WindowLimiter, WindowVerdict, classify};

/// Something that can judge a request against a policy.
#[async_trait]
pub trait DecisionProvider: Send + Sync {
    /// Evaluate `request` under `policy`. An `Err` means no decision could be
    /// reached; callers must not treat it as allow.
    async fn decide(&self, request: &RequestFacts, policy: &Policy) -> Result<Decision>;
}

/// Evaluations between idle-key sweeps of the window limiter.
const PRUNE_EVERY: u64 = 1024;

/// Idle keys are kept this long after their newest hit.
const PRUNE_HORIZON: Duration = Duration::from_secs(60);

/// In-process rules: shield, then bots, then the sliding window.
#[derive(Debug)]
pub struct RuleEngine {
    shield: Shield,
    limiter: WindowLimiter,
    evaluations: AtomicU64,
}

impl RuleEngine {
    /// Compile the shield and start with empty counters.
    pub fn new() -> Result<Self> {
        Ok(Self {
            shield: Shield::new()?,
            limiter: WindowLimiter::new(),
            evaluations: AtomicU64::new(0),
        })
    }

    /// Evaluate at an explicit instant.
    pub fn decide_at(&self, request: &RequestFacts, policy: &Policy, now: Instant) -> Decision {
        if self.evaluations.fetch_add(1, Ordering::Relaxed) % PRUNE_EVERY == PRUNE_EVERY - 1 {
            let dropped = self.limiter.prune_at(now, PRUNE_HORIZON);
            debug!(dropped, "pruned idle rate-limit keys");
        }

        if policy.shield {
            if let Some(signature) = self.shield.inspect(request) {
                return Decision::DenyOther(DenyReason::Shield {
                    signature: signature.to_string(),
                });
            }
        }

        let category = classify(request.user_agent.as_deref());
        if !policy.allows_bot(category) {
            return Decision::DenyOther(DenyReason::Bot { category });
        }

        let key = format!("{}:{}", policy.name, request.client_key());
        match self.limiter.check_at(&key, &policy.window, now) {
            WindowVerdict::Counted { .. } => Decision::Allow,
            WindowVerdict::Exceeded { retry_after } => Decision::DenyRateLimited { retry_after },
        }
    }

    /// Keys currently tracked by the window limiter.
    pub fn tracked_clients(&self) -> usize {
        self.limiter.tracked()
    }
}

#[async_trait]
impl DecisionProvider for RuleEngine {
    async fn decide(&self, request: &RequestFacts, policy: &Policy) -> Result<Decision> {
        Ok(self.decide_at(request, policy, Instant::now()))
    }
}
