//! Admission error types.

use thiserror::Error;

/// Errors raised while building or consulting the admission gate.
///
/// Any of these surfacing from an evaluation is treated as a denial by the
/// gate; none of them ever turns into an allow.
#[derive(Debug, Error)]
pub enum AdmissionError {
    /// The remote provider was selected without a credential.
    #[error("remote admission provider requires a key (set admission.key or SCORELINE_ADMISSION_KEY)")]
    MissingCredential,

    /// The remote provider was selected without an endpoint.
    #[error("remote admission provider requires an endpoint")]
    MissingEndpoint,

    /// A shield signature failed to compile.
    #[error("regex compilation error: {0}")]
    Regex(#[from] regex::Error),

    /// Transport failure talking to the decision service, including timeouts.
    #[error("decision service request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The decision service answered with a non-success status.
    #[error("decision service returned status {status}")]
    Status {
        /// HTTP status code returned.
        status: u16,
    },

    /// The decision service answered with a body we cannot interpret.
    #[error("invalid decision response: {0}")]
    InvalidResponse(String),
}

/// Result type for admission operations.
pub type Result<T> = std::result::Result<T, AdmissionError>;
