//! Connection lifecycle, subscriptions, liveness and fan-out.

pub mod broadcast;
pub mod connection;
pub mod handler;
pub mod heartbeat;
pub mod hub;
pub(crate) mod registry;
pub mod session;
pub mod subscriptions;
