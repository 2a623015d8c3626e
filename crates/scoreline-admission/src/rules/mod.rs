//! Individual admission rules. Each one is a pure check; the
//! [`RuleEngine`](crate::provider::RuleEngine) strings them together.

pub mod bots;
pub mod shield;
pub mod window;

pub use bots::{BotCategory, classify};
pub use shield::Shield;
pub use window::{WindowLimiter, WindowVerdict};
