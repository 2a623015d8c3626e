//! Rule parameters for one call site.

use std::time::Duration;

use scoreline_settings::WindowSettings;
use serde::Serialize;

use crate::rules::bots::BotCategory;

/// Whether a policy's denials are enforced.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuleMode {
    /// Denials are returned to the caller.
    #[default]
    Live,
    /// Denials are logged and converted to allow.
    DryRun,
}

/// Trailing-window limit: at most `max_requests` per `interval_secs`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlidingWindow {
    /// Requests allowed inside one window.
    pub max_requests: u32,
    /// Window length in seconds.
    pub interval_secs: u64,
}

impl SlidingWindow {
    /// Window length as a [`Duration`].
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl From<WindowSettings> for SlidingWindow {
    fn from(settings: WindowSettings) -> Self {
        Self {
            max_requests: settings.max_requests,
            interval_secs: settings.interval_secs,
        }
    }
}

/// The full rule set applied at one call site.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Policy {
    /// Policy name. Also scopes the sliding-window counters.
    pub name: String,
    /// Enforcement mode.
    pub mode: RuleMode,
    /// Run the attack-signature shield.
    pub shield: bool,
    /// Bot categories let through. Anything else classified as a bot is denied.
    pub allow_bots: Vec<BotCategory>,
    /// Rate limit.
    pub window: SlidingWindow,
}

impl Policy {
    /// Name of the ordinary request policy.
    pub const HTTP: &'static str = "http";
    /// Name of the socket upgrade policy.
    pub const UPGRADE: &'static str = "upgrade";

    /// Shield plus crawler allowlist plus the given window.
    pub fn standard(name: impl Into<String>, window: SlidingWindow, mode: RuleMode) -> Self {
        Self {
            name: name.into(),
            mode,
            shield: true,
            allow_bots: vec![BotCategory::SearchEngine, BotCategory::Preview],
            window,
        }
    }

    /// Ordinary requests: 50 per 10 seconds.
    pub fn http_default() -> Self {
        Self::standard(
            Self::HTTP,
            SlidingWindow {
                max_requests: 50,
                interval_secs: 10,
            },
            RuleMode::Live,
        )
    }

    /// Socket upgrades: 5 per 2 seconds.
    pub fn upgrade_default() -> Self {
        Self::standard(
            Self::UPGRADE,
            SlidingWindow {
                max_requests: 5,
                interval_secs: 2,
            },
            RuleMode::Live,
        )
    }

    /// Whether `category` passes the bot rule.
    pub fn allows_bot(&self, category: BotCategory) -> bool {
        category == BotCategory::Browser || self.allow_bots.contains(&category)
    }
}
