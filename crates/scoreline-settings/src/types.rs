//! Settings structures.
//!
//! Every struct uses `#[serde(default)]` so a partial user file only has to
//! name the keys it changes.

use serde::{Deserialize, Serialize};

/// Root settings object.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScorelineSettings {
    /// Network and feed settings.
    pub server: ServerSettings,
    /// Abuse screening for requests and upgrades.
    pub admission: AdmissionSettings,
    /// Log output.
    pub logging: LoggingSettings,
}

/// Server network and liveness settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Bind port.
    pub port: u16,
    /// Path that accepts socket upgrades.
    pub ws_path: String,
    /// Seconds between liveness sweeps.
    pub heartbeat_interval_secs: u64,
    /// Largest inbound message accepted by the transport, in bytes.
    pub max_message_size: usize,
    /// Outbound frames buffered per connection before sends are dropped.
    pub send_queue_capacity: usize,
    /// Seconds to wait for tasks on shutdown.
    pub shutdown_timeout_secs: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            ws_path: "/ws".to_string(),
            heartbeat_interval_secs: 30,
            max_message_size: 1024 * 1024,
            send_queue_capacity: 256,
            shutdown_timeout_secs: 10,
        }
    }
}

/// How admission decisions are applied.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AdmissionMode {
    /// Denials are enforced.
    #[default]
    Live,
    /// Rules run and denials are logged, but everything is allowed.
    DryRun,
    /// No evaluation at all. Every request is allowed.
    Disabled,
}

/// Where admission decisions come from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AdmissionProvider {
    /// In-process rule engine.
    #[default]
    Local,
    /// External decision service reached over HTTP.
    Remote,
}

/// A sliding-window limit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowSettings {
    /// Requests allowed inside one window.
    pub max_requests: u32,
    /// Window length in seconds.
    pub interval_secs: u64,
}

/// Admission gate settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AdmissionSettings {
    /// Enforcement mode.
    pub mode: AdmissionMode,
    /// Decision provider.
    pub provider: AdmissionProvider,
    /// Credential for the remote decision service.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    /// Base URL of the remote decision service.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    /// Remote call timeout in milliseconds.
    pub timeout_ms: u64,
    /// Key clients on the rightmost `X-Forwarded-For` entry instead of the
    /// socket peer. Only for deployments behind a proxy that appends it.
    pub trust_forwarded_for: bool,
    /// Window for ordinary HTTP requests.
    pub http: WindowSettings,
    /// Window for socket upgrades.
    pub upgrade: WindowSettings,
}

impl Default for AdmissionSettings {
    fn default() -> Self {
        Self {
            mode: AdmissionMode::Live,
            provider: AdmissionProvider::Local,
            key: None,
            endpoint: None,
            timeout_ms: 1500,
            trust_forwarded_for: false,
            http: WindowSettings {
                max_requests: 50,
                interval_secs: 10,
            },
            upgrade: WindowSettings {
                max_requests: 5,
                interval_secs: 2,
            },
        }
    }
}

/// Log line format.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// One JSON object per line.
    #[default]
    Json,
    /// Human-readable.
    Pretty,
}

/// Logging settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default level directive. `RUST_LOG` wins when set.
    pub level: String,
    /// Output format.
    pub format: LogFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Json,
        }
    }
}
