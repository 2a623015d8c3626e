//! Server error types.

use thiserror::Error;

/// Errors raised while starting the server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Could not bind the listening socket.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Address attempted.
        addr: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
    /// Other socket error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for server operations.
pub type Result<T> = std::result::Result<T, ServerError>;
