//! Error types for swap indexer operations.
//!
//! One `thiserror` enumeration covers the whole pipeline. Decoding problems
//! inside a single transaction never surface here: they degrade to empty
//! results at the call site. Variants in this enum are for I/O, queue and
//! configuration failures that callers actually have to react to.

use thiserror::Error;

/// Custom error type for swap indexer operations.
#[derive(Debug, Error)]
pub enum SwapIndexerError {
    /// Errors encountered during database operations.
    ///
    /// Wraps `sqlx::Error` via `#[from]` so repository code can use `?` directly.
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    /// A payload could not be decoded (work item JSON, raw transaction shape).
    #[error("Decoding error: {0}")]
    DecodingError(String),

    /// Errors interacting with the Solana RPC that are not tied to a client call.
    #[error("RPC error: {0}")]
    RpcError(String),

    /// Errors from the Solana RPC client.
    #[error("RPC client error: {0}")]
    RpcClientError(Box<solana_client::client_error::ClientError>),

    /// The ledger has no block for this slot (skipped or purged).
    #[error("Block not found for slot {0}")]
    BlockNotFound(u64),

    /// Every attempt against the node failed.
    #[error("Node unavailable after {attempts} attempts: {last_error}")]
    NodeUnavailable {
        /// Number of attempts made.
        attempts: u32,
        /// Last error observed.
        last_error: String,
    },

    /// Generic retry exhaustion from `utils::retry::retry_with_backoff`.
    #[error("Retry exhausted after {attempts} attempts: {last_error}")]
    RetryExhausted {
        /// Number of attempts made.
        attempts: u32,
        /// Last error observed.
        last_error: String,
    },

    /// A persisted batch of swaps could not be written.
    #[error("Batch insert failed after {attempts} attempts: {last_error}")]
    BatchInsertFailed {
        /// Number of attempts made.
        attempts: u32,
        /// Last error observed.
        last_error: String,
    },

    /// WebSocket or other transport drop.
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// The work queue rejected an operation.
    #[error("Queue error: {0}")]
    QueueError(String),

    /// The underlying queue connection is gone and must be re-established.
    #[error("Queue connection closed: {0}")]
    QueueClosed(String),

    /// JSON (de)serialization failures.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Errors related to configuration.
    ///
    /// Missing or malformed settings are fatal at startup.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Generic errors for operations that don't fit other categories.
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl From<solana_client::client_error::ClientError> for SwapIndexerError {
    fn from(err: solana_client::client_error::ClientError) -> Self {
        Self::RpcClientError(Box::new(err))
    }
}

/// Type alias for Results using `SwapIndexerError`.
pub type Result<T> = std::result::Result<T, SwapIndexerError>;
