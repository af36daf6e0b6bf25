//! Longeron Core
//!
//! This crate contains the runtime-agnostic core building blocks:
//! - Bucketed transmission-buffer pool (`buffer`)
//! - Generic completion-state pool with lifecycle hooks (`pool`)
//! - Pooled state objects and user tokens (`state`)
//! - Length-prefix frame header codec (`frame`)
//! - One-shot shutdown / cancellation signal (`signal`)
//! - Endpoint options (`options`)
//! - Error taxonomy (`error`)
//! - TCP socket utilities (`tcp`)

#![deny(unsafe_code)]
// Allow some pedantic lints that are intentional in this crate
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::needless_pass_by_value)]
pub mod buffer;
pub mod error;
pub mod frame;
pub mod options;
pub mod pool;
pub mod result;
pub mod signal;
pub mod state;
pub mod tcp;

// Optional: a small prelude to make downstream crates ergonomic.
// Keep it minimal to avoid API lock-in.
pub mod prelude {
    pub use crate::buffer::{BufferPool, BufferPoolStats};
    pub use crate::error::{LongeronError, Result};
    pub use crate::frame::{decode_header, encode_header, total_frame_size, HEADER_SIZE};
    pub use crate::options::EndpointOptions;
    pub use crate::pool::{ObjectPool, Recycle};
    pub use crate::result::TransmissionResult;
    pub use crate::signal::Signal;
    pub use crate::state::{OperationKind, OperationState, StateRecycler, UserToken};
}
