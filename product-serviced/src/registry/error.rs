//! Error types for the registry client

use thiserror::Error;
use crate::registry::lifecycle::LifecycleState;

/// Registry client error type
#[derive(Error, Debug)]
pub enum RegistryError {
    /// Request could not be sent or no response arrived
    #[error("Transport error calling {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Registry answered with a non-success status
    #[error("Registry returned {status} for {url}: {body}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
        body: String,
    },

    /// Response body could not be read
    #[error("Failed to read response body from {url}: {source}")]
    Body {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// HTTP client construction failed
    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    /// Background registry task panicked or was aborted
    #[error("Registry task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// Lifecycle step requested out of order
    #[error("Invalid lifecycle transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: LifecycleState,
        to: LifecycleState,
    },
}

impl RegistryError {
    /// Network-level failures that a later attempt may not hit
    pub fn is_transient(&self) -> bool {
        match self {
            RegistryError::Transport { .. } | RegistryError::Body { .. } => true,
            RegistryError::Status { status, .. } => status.is_server_error(),
            RegistryError::Client(_)
            | RegistryError::Task(_)
            | RegistryError::InvalidTransition { .. } => false,
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, RegistryError>;
