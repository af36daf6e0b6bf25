//! Longeron
//!
//! A pooled, framed, asynchronous TCP engine: a server-side
//! [`FramedReader`] serving length-prefixed request/response exchanges from
//! many concurrent peers, and a client-side [`FramedWriter`] speaking the
//! same wire format, both multiplexed over completion-based I/O with
//! explicit pooling of completion state objects and transmission buffers.
//!
//! # Example
//!
//! ```rust,no_run
//! use longeron::{EndpointOptions, FramedReader, FramedWriter};
//! use std::net::SocketAddr;
//!
//! #[compio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let addr: SocketAddr = "127.0.0.1:12377".parse()?;
//!
//!     // Echo server.
//!     let mut reader = FramedReader::bind(
//!         EndpointOptions::default().with_default_endpoint(addr),
//!         |_peer: SocketAddr, request: &[u8], response: &mut [u8]| {
//!             response[..request.len()].copy_from_slice(request);
//!             Some(request.len())
//!         },
//!     )
//!     .await?;
//!     reader.start(8)?;
//!
//!     // Client round trip.
//!     let mut writer = FramedWriter::new(EndpointOptions::default())?;
//!     writer.connect(addr).await?;
//!     writer.write(addr, b"hello").await?;
//!     let mut reply = [0u8; 5];
//!     writer.read(addr, &mut reply).await?;
//!     assert_eq!(&reply, b"hello");
//!
//!     writer.disconnect(false).await?;
//!     reader.stop().await;
//!     Ok(())
//! }
//! ```

#![warn(clippy::all)]
// Allow some pedantic patterns
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::future_not_send)] // Runtime-agnostic design

// Re-export core types
pub use bytes::Bytes;
pub use longeron_core::buffer::{BufferPool, BufferPoolStats};
pub use longeron_core::error::{LongeronError, Result};
pub use longeron_core::frame::{decode_header, encode_header, total_frame_size, HEADER_SIZE};
pub use longeron_core::options::EndpointOptions;
pub use longeron_core::pool::{ObjectPool, Recycle};
pub use longeron_core::result::TransmissionResult;
pub use longeron_core::signal::Signal;
pub use longeron_core::state::{OperationKind, OperationState, StateRecycler, UserToken};

#[cfg(feature = "framed")]
pub use longeron_framed::{FramedReader, FramedWriter, RequestHandler};

/// Install an env-filtered log subscriber when `RUST_LOG` is set.
///
/// Intended for tests; calling it more than once, or with a subscriber
/// already installed, is a no-op.
pub fn init_tracing() {
    if std::env::var("RUST_LOG").is_ok() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    }
}
