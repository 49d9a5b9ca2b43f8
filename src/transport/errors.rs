//! Transport Error Types

use thiserror::Error;

/// Transport error type
#[derive(Debug, Error)]
pub enum TransportError {
    /// The peer endpoint is gone; pending sends cannot complete.
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    /// Message framing or codec failure.
    #[error("codec failure: {0}")]
    Codec(#[from] serde_json::Error),
}

impl TransportError {
    /// Create a connection-closed error.
    pub fn connection_closed(detail: impl Into<String>) -> Self {
        Self::ConnectionClosed(detail.into())
    }

    /// Check if this error means the connection is unusable.
    pub fn is_connection_loss(&self) -> bool {
        matches!(self, Self::ConnectionClosed(_))
    }
}

/// Result type for transport operations
pub type TransportResult<T> = Result<T, TransportError>;
