//! Pooled completion state objects.
//!
//! One `OperationState` is rented from the pool for each in-flight exchange
//! and carries everything a continuation needs between partial completions:
//! the attached transmission buffer, the running transfer counters, and a
//! [`UserToken`] discriminating what to do when the operation finishes.
//!
//! A state object is never referenced by two in-flight operations at once;
//! the engine that rented it owns it exclusively until it is given back.

use std::net::SocketAddr;

use crate::pool::Recycle;

/// The operation a state object is currently attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Accept,
    Connect,
    Disconnect,
    Receive,
    Send,
}

/// Tagged per-operation bookkeeping, one variant per operation kind.
///
/// Stored as a single field on [`OperationState`] so the pool stays
/// homogeneous; completion delivery itself is the operation's future.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UserToken {
    /// Parked in the pool, attached to nothing.
    #[default]
    Idle,
    /// Accept carries no user payload.
    Accept,
    Connect,
    Disconnect,
    /// Client-side framed read: how many payload bytes the caller expects,
    /// and how many have landed in the transmission buffer so far.
    Read { expected: usize, total_read: usize },
    /// Client-side framed write: how many bytes have left the transmission
    /// buffer so far.
    Write { total_written: usize },
    /// Reader-side exchange: per-connection running counters. The reader
    /// never surfaces per-message completions outward.
    ServerTransmission { frames: u64, total_bytes: usize },
}

impl UserToken {
    /// Advance the running transfer counter by one completion's bytes.
    pub fn advance(&mut self, bytes: usize) {
        match self {
            Self::Read { total_read, .. } => *total_read += bytes,
            Self::Write { total_written } => *total_written += bytes,
            Self::ServerTransmission { total_bytes, .. } => *total_bytes += bytes,
            _ => {}
        }
    }

    /// Record a fully linearised frame on a reader-side token.
    pub fn complete_frame(&mut self) {
        if let Self::ServerTransmission { frames, .. } = self {
            *frames += 1;
        }
    }

    /// The operation kind this token belongs to, if attached.
    #[must_use]
    pub const fn kind(&self) -> Option<OperationKind> {
        match self {
            Self::Idle => None,
            Self::Accept => Some(OperationKind::Accept),
            Self::Connect => Some(OperationKind::Connect),
            Self::Disconnect => Some(OperationKind::Disconnect),
            Self::Read { .. } | Self::ServerTransmission { .. } => Some(OperationKind::Receive),
            Self::Write { .. } => Some(OperationKind::Send),
        }
    }
}

/// Continuation carrier for one in-flight I/O exchange.
#[derive(Debug)]
pub struct OperationState {
    /// What to do on completion, plus the running counters.
    pub token: UserToken,
    /// Transmission buffer attached while an exchange is in flight.
    pub buffer: Option<Vec<u8>>,
    /// Bytes moved by the most recent OS completion.
    pub bytes_transferred: usize,
    /// Destination endpoint; the configured default until attached.
    pub remote: SocketAddr,
}

impl OperationState {
    #[must_use]
    pub const fn new(default_endpoint: SocketAddr) -> Self {
        Self {
            token: UserToken::Idle,
            buffer: None,
            bytes_transferred: 0,
            remote: default_endpoint,
        }
    }

    /// Detach and return the transmission buffer, if any.
    pub fn take_buffer(&mut self) -> Option<Vec<u8>> {
        self.buffer.take()
    }
}

/// Pool hooks for [`OperationState`].
///
/// `can_reuse` rejects a state still holding a transmission buffer: every
/// in-flight buffer must go back to the buffer pool before its state object
/// is returned, and a state that violates that is destroyed rather than
/// recycled.
pub struct StateRecycler {
    default_endpoint: SocketAddr,
}

impl StateRecycler {
    #[must_use]
    pub const fn new(default_endpoint: SocketAddr) -> Self {
        Self { default_endpoint }
    }
}

impl Recycle<OperationState> for StateRecycler {
    fn create(&self) -> OperationState {
        OperationState::new(self.default_endpoint)
    }

    fn reset(&self, state: &mut OperationState) {
        state.token = UserToken::Idle;
        state.bytes_transferred = 0;
        state.remote = self.default_endpoint;
    }

    fn can_reuse(&self, state: &mut OperationState) -> bool {
        state.buffer.is_none()
    }
}
