//! # scoreline-server
//!
//! Axum WebSocket server pushing live match and commentary updates.
//!
//! Accepted sockets become [`ClientConnection`](websocket::connection::ClientConnection)s
//! held by a [`LiveHub`](websocket::hub::LiveHub), which owns the registry and
//! the per-match subscription index. The data-write path calls the
//! [`Broadcaster`](websocket::broadcast::Broadcaster); a
//! [`HeartbeatMonitor`](websocket::heartbeat::HeartbeatMonitor) terminates
//! unresponsive peers. Upgrades pass the admission gate first.

#![deny(unsafe_code)]

pub mod config;
pub mod errors;
pub mod health;
pub mod protocol;
pub mod server;
pub mod shutdown;
pub mod websocket;

pub use config::ServerConfig;
pub use errors::{Result, ServerError};
pub use protocol::MatchId;
pub use server::{LiveServer, ServerHandle};
pub use websocket::broadcast::Broadcaster;
