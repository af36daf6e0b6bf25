/// Longeron Error Types
///
/// The single error taxonomy shared by the pools, the frame codec, and both
/// framed endpoints.

use std::io;
use thiserror::Error;

/// Main error type for Longeron operations
#[derive(Error, Debug)]
pub enum LongeronError {
    /// Construction-time argument out of range
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Caller-supplied buffer exceeds the configured message bound
    #[error("Buffer too large: {size} bytes (max: {max})")]
    BufferTooLarge { size: usize, max: usize },

    /// Decoded frame header declares an illegal payload length
    #[error("Malformed frame header: declared {len} bytes (max: {max})")]
    MalformedHeader { len: usize, max: usize },

    /// Socket read or write returned zero bytes
    #[error("Peer closed the connection")]
    PeerClosed,

    /// Any other OS socket error
    #[error("Transport error: {0}")]
    Transport(io::Error),

    /// Cooperative cancellation observed before the operation completed
    #[error("Operation cancelled")]
    Cancelled,

    /// The endpoint is stopping; the operation was not started
    #[error("Endpoint is shutting down")]
    Shutdown,
}

/// Result type alias for Longeron operations
pub type Result<T> = std::result::Result<T, LongeronError>;

impl From<io::Error> for LongeronError {
    /// Map an OS socket error into the taxonomy.
    ///
    /// An aborted in-flight operation surfaces as `Cancelled`; everything
    /// else is carried verbatim as `Transport`.
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::Interrupted => Self::Cancelled,
            io::ErrorKind::UnexpectedEof => Self::PeerClosed,
            _ => Self::Transport(err),
        }
    }
}

impl LongeronError {
    /// Create an invalid-configuration error with a message
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Check if this error is a cooperative cancellation or shutdown
    #[must_use]
    pub const fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled | Self::Shutdown)
    }

    /// Check if this error tears down the connection it occurred on
    #[must_use]
    pub const fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::PeerClosed | Self::Transport(_) | Self::MalformedHeader { .. }
        )
    }

    /// Check if the underlying OS error is a reset from a half-open peer
    #[must_use]
    pub fn is_connection_reset(&self) -> bool {
        match self {
            Self::Transport(e) => matches!(
                e.kind(),
                io::ErrorKind::ConnectionReset | io::ErrorKind::ConnectionAborted
            ),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interrupted_maps_to_cancelled() {
        let err: LongeronError = io::Error::from(io::ErrorKind::Interrupted).into();
        assert!(matches!(err, LongeronError::Cancelled));
        assert!(err.is_cancellation());
    }

    #[test]
    fn reset_is_connection_reset() {
        let err: LongeronError = io::Error::from(io::ErrorKind::ConnectionReset).into();
        assert!(err.is_connection_reset());
        assert!(err.is_connection_error());
    }

    #[test]
    fn malformed_header_is_connection_error() {
        let err = LongeronError::MalformedHeader { len: 0, max: 8192 };
        assert!(err.is_connection_error());
        assert!(!err.is_cancellation());
    }
}
