//! Error types for the engine and its collaborators

use thiserror::Error;

/// Result type alias using our EngineError
pub type Result<T> = std::result::Result<T, EngineError>;

/// Main error type for engine and collaborator operations
#[derive(Error, Debug)]
pub enum EngineError {
    /// A collaborator call (quotes, positions, account) failed or timed out
    #[error("Collaborator error: {0}")]
    Collaborator(String),

    /// The order collaborator refused an order
    #[error("Order rejected for {symbol}: {reason}")]
    OrderRejected { symbol: String, reason: String },

    /// A cancel request was denied or failed
    #[error("Cancel failed for order {order_id}: {reason}")]
    CancelFailed { order_id: String, reason: String },

    /// Per-symbol state needed by a decision is not available
    #[error("Missing state: {0}")]
    MissingState(String),

    /// Malformed market data or screening input
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// File access errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON parsing error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// Channel send errors
    #[error("Channel send error: {0}")]
    ChannelSend(String),
}

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for EngineError {
    fn from(err: tokio::sync::mpsc::error::SendError<T>) -> Self {
        EngineError::ChannelSend(err.to_string())
    }
}
