//! Transmission result value type.

use std::net::SocketAddr;

use bytes::Bytes;

/// Outcome of a completed framed transfer, surfaced by the writer's
/// operations.
#[derive(Debug, Clone)]
pub struct TransmissionResult {
    /// Payload bytes moved (header excluded).
    pub bytes_transferred: usize,
    /// The peer the transfer was exchanged with.
    pub remote_endpoint: SocketAddr,
    /// Immutable view of the transferred payload.
    pub buffer: Bytes,
}

impl TransmissionResult {
    #[must_use]
    pub fn new(bytes_transferred: usize, remote_endpoint: SocketAddr, buffer: Bytes) -> Self {
        Self {
            bytes_transferred,
            remote_endpoint,
            buffer,
        }
    }
}
