//! Admission decisions and how each call site reports them.

use std::time::Duration;

use axum::http::StatusCode;

use crate::rules::bots::BotCategory;

/// Outcome of evaluating one request against one policy.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Decision {
    /// Let the request through.
    Allow,
    /// Over the sliding-window limit.
    DenyRateLimited {
        /// Time until the oldest counted request leaves the window.
        retry_after: Duration,
    },
    /// Denied for a non-rate reason.
    DenyOther(DenyReason),
}

impl Decision {
    /// Whether this decision refuses the request.
    pub fn is_denied(&self) -> bool {
        !matches!(self, Self::Allow)
    }
}

/// Why a non-rate denial happened.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DenyReason {
    /// Matched an attack signature.
    Shield {
        /// Signature name.
        signature: String,
    },
    /// Classified as a disallowed bot.
    Bot {
        /// Classification.
        category: BotCategory,
    },
    /// Provider-specific reason.
    Other(String),
}

impl std::fmt::Display for DenyReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Shield { signature } => write!(f, "shield:{signature}"),
            Self::Bot { category } => write!(f, "bot:{category:?}"),
            Self::Other(reason) => write!(f, "{reason}"),
        }
    }
}

/// Where the gate is being consulted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Site {
    /// Ordinary HTTP route.
    Request,
    /// Socket upgrade handshake.
    Upgrade,
}

/// Gate verdict after provider failures have been folded in.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GateOutcome {
    /// Proceed.
    Allow,
    /// Rate limited.
    RateLimited {
        /// Time until retry is worthwhile.
        retry_after: Duration,
    },
    /// Shield or bot denial.
    Forbidden,
    /// The provider failed. Never allowed.
    Unavailable,
}

impl GateOutcome {
    /// Status code for a refusal at `site`; `None` when allowed.
    pub fn status(&self, site: Site) -> Option<StatusCode> {
        match (self, site) {
            (Self::Allow, _) => None,
            (Self::RateLimited { .. }, _) => Some(StatusCode::TOO_MANY_REQUESTS),
            (Self::Forbidden, _) => Some(StatusCode::FORBIDDEN),
            (Self::Unavailable, Site::Request) => Some(StatusCode::SERVICE_UNAVAILABLE),
            (Self::Unavailable, Site::Upgrade) => Some(StatusCode::INTERNAL_SERVER_ERROR),
        }
    }

    /// Whether the request may proceed.
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }
}

impl From<Decision> for GateOutcome {
    fn from(decision: Decision) -> Self {
        match decision {
            Decision::Allow => Self::Allow,
            Decision::DenyRateLimited { retry_after } => Self::RateLimited { retry_after },
            Decision::DenyOther(_) => Self::Forbidden,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_is_429_on_both_sites() {
        let outcome = GateOutcome::RateLimited {
            retry_after: Duration::from_secs(1),
        };
        assert_eq!(outcome.status(Site::Request), Some(StatusCode::TOO_MANY_REQUESTS));
        assert_eq!(outcome.status(Site::Upgrade), Some(StatusCode::TOO_MANY_REQUESTS));
    }

    #[test]
    fn forbidden_is_403_on_both_sites() {
        assert_eq!(GateOutcome::Forbidden.status(Site::Request), Some(StatusCode::FORBIDDEN));
        assert_eq!(GateOutcome::Forbidden.status(Site::Upgrade), Some(StatusCode::FORBIDDEN));
    }

    #[test]
    fn provider_failure_differs_by_site() {
        assert_eq!(
            GateOutcome::Unavailable.status(Site::Request),
            Some(StatusCode::SERVICE_UNAVAILABLE)
        );
        assert_eq!(
            GateOutcome::Unavailable.status(Site::Upgrade),
            Some(StatusCode::INTERNAL_SERVER_ERROR)
        );
    }

    #[test]
    fn allow_has_no_status() {
        assert!(GateOutcome::Allow.status(Site::Request).is_none());
        assert!(GateOutcome::Allow.is_allowed());
    }

    #[test]
    fn decision_maps_to_outcome() {
        let denied = Decision::DenyOther(DenyReason::Bot {
            category: BotCategory::Automated,
        });
        assert!(denied.is_denied());
        assert_eq!(GateOutcome::from(denied), GateOutcome::Forbidden);
        assert_eq!(GateOutcome::from(Decision::Allow), GateOutcome::Allow);
    }

    #[test]
    fn deny_reason_display() {
        let reason = DenyReason::Shield {
            signature: "path_traversal".into(),
        };
        assert_eq!(reason.to_string(), "shield:path_traversal");
    }
}
