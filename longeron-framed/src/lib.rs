//! Longeron Framed
//!
//! The two concrete framed TCP endpoints built on the `longeron-core`
//! pooling layer:
//! - [`writer::FramedWriter`] — client-side bidirectional messenger
//! - [`reader::FramedReader`] — server-side acceptor dispatching to a
//!   [`handler::RequestHandler`]
//!
//! Wire format, per frame: 4-byte little-endian payload length ‖ payload.

#![deny(unsafe_code)]
#![allow(clippy::module_name_repetitions)]
pub mod handler;
pub mod reader;
pub mod writer;

mod exchange;

pub use handler::RequestHandler;
pub use reader::FramedReader;
pub use writer::FramedWriter;
