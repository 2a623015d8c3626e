//! Server configuration.

use std::time::Duration;

use scoreline_settings::ServerSettings;

/// Runtime configuration for [`LiveServer`](crate::server::LiveServer).
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Host to bind.
    pub host: String,
    /// Port to bind; `0` picks a free one.
    pub port: u16,
    /// Path accepting socket upgrades.
    pub ws_path: String,
    /// Time between liveness sweeps.
    pub heartbeat_interval: Duration,
    /// Largest inbound message or frame, in bytes.
    pub max_message_size: usize,
    /// Outbound frames buffered per connection.
    pub send_queue_capacity: usize,
    /// Time allowed for background tasks to finish on shutdown.
    pub shutdown_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            ws_path: "/ws".into(),
            heartbeat_interval: Duration::from_secs(30),
            max_message_size: 1024 * 1024,
            send_queue_capacity: 256,
            shutdown_timeout: Duration::from_secs(10),
        }
    }
}

impl From<&ServerSettings> for ServerConfig {
    fn from(settings: &ServerSettings) -> Self {
        Self {
            host: settings.host.clone(),
            port: settings.port,
            ws_path: settings.ws_path.clone(),
            heartbeat_interval: Duration::from_secs(settings.heartbeat_interval_secs),
            max_message_size: settings.max_message_size,
            send_queue_capacity: settings.send_queue_capacity,
            shutdown_timeout: Duration::from_secs(settings.shutdown_timeout_secs),
        }
    }
}
