//! The admission gate: a provider plus the two call-site policies.

use std::sync::Arc;
use std::time::Duration;

use axum::http::request::Parts;
use scoreline_settings::{AdmissionMode, AdmissionProvider, AdmissionSettings};
use tracing::{error, info, warn};

use crate::decision::{Decision, GateOutcome, Site};
use crate::errors::{AdmissionError, Result};
use crate::policy::{Policy, RuleMode};
use crate::provider::{DecisionProvider, RuleEngine};
use crate::remote::RemoteDecisionProvider;
use crate::request::RequestFacts;

/// Screens requests and upgrades. Cheap to clone.
#[derive(Clone)]
pub struct AdmissionGate {
    provider: Option<Arc<dyn DecisionProvider>>,
    http_policy: Policy,
    upgrade_policy: Policy,
    trust_forwarded_for: bool,
}

impl std::fmt::Debug for AdmissionGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdmissionGate")
            .field("enabled", &self.is_enabled())
            .field("http_policy", &self.http_policy)
            .field("upgrade_policy", &self.upgrade_policy)
            .field("trust_forwarded_for", &self.trust_forwarded_for)
            .finish()
    }
}

impl AdmissionGate {
    /// Gate backed by `provider`.
    pub fn new(provider: Arc<dyn DecisionProvider>, http_policy: Policy, upgrade_policy: Policy) -> Self {
        Self {
            provider: Some(provider),
            http_policy,
            upgrade_policy,
            trust_forwarded_for: false,
        }
    }

    /// Gate that allows everything without evaluating.
    pub fn disabled() -> Self {
        Self {
            provider: None,
            http_policy: Policy::http_default(),
            upgrade_policy: Policy::upgrade_default(),
            trust_forwarded_for: false,
        }
    }

    /// Key clients on the proxy-appended `X-Forwarded-For` entry.
    #[must_use]
    pub fn with_trusted_forwarding(mut self, trust: bool) -> Self {
        self.trust_forwarded_for = trust;
        self
    }

    /// Build from settings. A remote provider without a key or endpoint is an
    /// error unless the gate is disabled.
    pub fn from_settings(settings: &AdmissionSettings) -> Result<Self> {
        let mode = match settings.mode {
            AdmissionMode::Disabled => {
                warn!("admission gate disabled: every request and upgrade is allowed");
                return Ok(Self::disabled().with_trusted_forwarding(settings.trust_forwarded_for));
            }
            AdmissionMode::Live => RuleMode::Live,
            AdmissionMode::DryRun => RuleMode::DryRun,
        };

        let provider: Arc<dyn DecisionProvider> = match settings.provider {
            AdmissionProvider::Local => Arc::new(RuleEngine::new()?),
            AdmissionProvider::Remote => {
                let key = settings.key.as_deref().ok_or(AdmissionError::MissingCredential)?;
                let endpoint = settings.endpoint.as_deref().ok_or(AdmissionError::MissingEndpoint)?;
                Arc::new(RemoteDecisionProvider::new(
                    endpoint,
                    key,
                    Duration::from_millis(settings.timeout_ms),
                )?)
            }
        };

        info!(
            provider = ?settings.provider,
            mode = ?mode,
            trust_forwarded_for = settings.trust_forwarded_for,
            "admission gate ready"
        );
        Ok(Self::new(
            provider,
            Policy::standard(Policy::HTTP, settings.http.into(), mode),
            Policy::standard(Policy::UPGRADE, settings.upgrade.into(), mode),
        )
        .with_trusted_forwarding(settings.trust_forwarded_for))
    }

    /// Whether a provider is configured.
    pub fn is_enabled(&self) -> bool {
        self.provider.is_some()
    }

    /// Whether `X-Forwarded-For` is honored.
    pub fn trusts_forwarded_for(&self) -> bool {
        self.trust_forwarded_for
    }

    /// Request facts under this gate's forwarding policy.
    pub fn facts(&self, parts: &Parts) -> RequestFacts {
        RequestFacts::from_parts(parts, self.trust_forwarded_for)
    }

    /// Policy used at `site`.
    pub fn policy(&self, site: Site) -> &Policy {
        match site {
            Site::Request => &self.http_policy,
            Site::Upgrade => &self.upgrade_policy,
        }
    }

    /// Evaluate `request` under `policy`. Dry-run policies log denials and
    /// return allow; provider errors are passed through.
    pub async fn evaluate(&self, request: &RequestFacts, policy: &Policy) -> Result<Decision> {
        let Some(provider) = &self.provider else {
            return Ok(Decision::Allow);
        };
        let decision = provider.decide(request, policy).await?;
        if decision.is_denied() && policy.mode == RuleMode::DryRun {
            warn!(
                policy = %policy.name,
                path = %request.path,
                client = %request.client_key(),
                decision = ?decision,
                "dry run: request would have been denied"
            );
            return Ok(Decision::Allow);
        }
        Ok(decision)
    }

    /// Evaluate at `site` and fold provider failure into a closed outcome.
    pub async fn check(&self, request: &RequestFacts, site: Site) -> GateOutcome {
        let policy = self.policy(site);
        match self.evaluate(request, policy).await {
            Ok(decision) => {
                if decision.is_denied() {
                    info!(
                        policy = %policy.name,
                        path = %request.path,
                        client = %request.client_key(),
                        decision = ?decision,
                        "admission denied"
                    );
                }
                decision.into()
            }
            Err(e) => {
                error!(policy = %policy.name, error = %e, "admission evaluation failed");
                GateOutcome::Unavailable
            }
        }
    }
}
