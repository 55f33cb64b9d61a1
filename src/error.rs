//! Error types for shardcache
//!
//! Two layers:
//! - [`BackendError`]: what a backend connection reports (collaborator boundary)
//! - [`CacheError`]: the stable contract every public client operation fails with

use std::fmt;

use thiserror::Error;

use crate::codec::Value;

/// Result type alias using CacheError
pub type Result<T> = std::result::Result<T, CacheError>;

/// Unified error type for client operations
#[derive(Debug, Error)]
pub enum CacheError {
    // -------------------------------------------------------------------------
    // Caller Errors (never retried)
    // -------------------------------------------------------------------------
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Compression error: {0}")]
    Compression(String),

    // -------------------------------------------------------------------------
    // Transport Errors
    // -------------------------------------------------------------------------
    #[error("Connection to {endpoint} interrupted: {reason}")]
    ConnectionInterrupted { endpoint: String, reason: String },

    #[error("No endpoints available: {0}")]
    NoEndpointsAvailable(String),

    /// One or more shards failed during a batch call. `partial` holds
    /// whatever the healthy shards returned.
    #[error("Batch operation failed on {} shard(s): {}", failures.len(), ShardFailure::join(failures))]
    PartialFailure {
        failures: Vec<ShardFailure>,
        partial: PartialResult,
    },

    // -------------------------------------------------------------------------
    // Backend Errors (never retried)
    // -------------------------------------------------------------------------
    #[error("Backend command error: {0}")]
    BackendCommand(String),

    #[error("Index out of range: {0}")]
    IndexOutOfRange(String),

    // -------------------------------------------------------------------------
    // Configuration Errors (client construction only)
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl CacheError {
    /// True for failures the dispatcher may retry on another shard or
    /// swallow in ignore mode.
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            CacheError::ConnectionInterrupted { .. } | CacheError::NoEndpointsAvailable(_)
        )
    }
}

/// One failed shard inside a [`CacheError::PartialFailure`]
#[derive(Debug, Clone, PartialEq)]
pub struct ShardFailure {
    /// Endpoint address of the failed shard
    pub endpoint: String,

    /// Rendered cause
    pub reason: String,
}

impl ShardFailure {
    fn join(failures: &[ShardFailure]) -> String {
        failures
            .iter()
            .map(|f| format!("{} ({})", f.endpoint, f.reason))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Results obtained from the healthy shards of a partially failed batch
#[derive(Debug, Clone, PartialEq)]
pub enum PartialResult {
    /// `get_many`: values found on shards that answered, in request order,
    /// keyed by logical key as in `CacheClient::get_many`
    Values(Vec<(String, Value)>),

    /// `set_many`: logical keys that were written
    Written(Vec<String>),

    /// `delete_many`: number of keys deleted (not rolled back)
    Deleted(u64),
}

// =============================================================================
// Backend Errors
// =============================================================================

/// Error reported by a backend connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// Socket-level failure: refused, reset, broken pipe, closed
    Transport(String),

    /// Connect or request deadline elapsed
    Timeout(String),

    /// The backend understood the command and rejected it
    Command(String),

    /// The reply could not be decoded
    Protocol(String),

    /// The backend cannot serve this endpoint or request (e.g. TLS on a
    /// plaintext-only client). Endpoints are vetted by `Backend::check` when
    /// the client is built, so an operation only sees this for requests.
    Unsupported(String),
}

impl BackendError {
    /// Connectivity-class errors invalidate the connection they came from
    pub fn is_connectivity(&self) -> bool {
        matches!(
            self,
            BackendError::Transport(_) | BackendError::Timeout(_) | BackendError::Protocol(_)
        )
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, BackendError::Timeout(_))
    }

    /// Translate into the client contract, naming the endpoint involved
    pub fn into_cache_error(self, endpoint: &str) -> CacheError {
        match self {
            BackendError::Transport(reason)
            | BackendError::Timeout(reason)
            | BackendError::Protocol(reason) => CacheError::ConnectionInterrupted {
                endpoint: endpoint.to_string(),
                reason,
            },
            BackendError::Command(message) | BackendError::Unsupported(message) => {
                CacheError::BackendCommand(message)
            }
        }
    }
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendError::Transport(m) => write!(f, "transport error: {}", m),
            BackendError::Timeout(m) => write!(f, "timeout: {}", m),
            BackendError::Command(m) => write!(f, "{}", m),
            BackendError::Protocol(m) => write!(f, "protocol error: {}", m),
            BackendError::Unsupported(m) => write!(f, "unsupported: {}", m),
        }
    }
}

impl std::error::Error for BackendError {}

impl From<std::io::Error> for BackendError {
    fn from(e: std::io::Error) -> Self {
        use std::io::ErrorKind;
        match e.kind() {
            ErrorKind::TimedOut | ErrorKind::WouldBlock => BackendError::Timeout(e.to_string()),
            _ => BackendError::Transport(e.to_string()),
        }
    }
}
