//! Error types for the upgrade risk engine

use thiserror::Error;
use uuid::Uuid;

/// Result type alias for the upgrade risk engine
pub type Result<T> = std::result::Result<T, Error>;

/// Upgrade risk engine errors
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error (bad settings, unreachable or malformed SSO
    /// discovery document). Fatal at construction, never retried.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The SSO token exchange was rejected or unreachable
    #[error("Token refresh failed: {0}")]
    TokenRefresh(String),

    /// The upstream telemetry backend has no record of the cluster
    #[error("Cluster not found: {0}")]
    ClusterNotFound(Uuid),

    /// The upstream telemetry query returned a non-success status
    #[error("Upstream query failed: HTTP {status}")]
    UpstreamStatus {
        /// HTTP status code returned by the upstream
        status: u16,
    },

    /// Transport error (connection, TLS, timeout)
    #[error("Transport error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create an upstream-status error from a response status
    #[must_use]
    pub fn upstream(status: reqwest::StatusCode) -> Self {
        Self::UpstreamStatus {
            status: status.as_u16(),
        }
    }
}
