//! Partial-I/O continuation engine.
//!
//! OS sends and receives may move fewer bytes than requested; these loops
//! drive a single frame region to completion across as many completions as
//! the kernel needs. The transmission buffer rides attached to the
//! operation's state object, is resliced to the unfinished region on every
//! continuation, and is re-attached before returning on every exit path so
//! the caller can hand it back to the buffer pool.
//!
//! Every continuation consults the cancellation signal before issuing the
//! next OS call; a signal observed mid-frame resolves the operation as
//! `Cancelled`.

use std::time::Duration;

use compio::buf::{BufResult, IntoInner, IoBuf};
use compio::io::{AsyncRead, AsyncWrite};
use compio::net::TcpStream;
use tracing::trace;

use longeron_core::error::{LongeronError, Result};
use longeron_core::signal::Signal;
use longeron_core::state::OperationState;

/// Consecutive inline completions tolerated within one frame before the
/// continuation is pushed back to the scheduler.
pub(crate) const INLINE_COMPLETION_LIMIT: u32 = 16;

/// Cede the worker so an always-ready socket cannot starve its siblings.
async fn reschedule() {
    compio::time::sleep(Duration::from_micros(1)).await;
}

/// Send `buffer[start..end)` in full.
///
/// On success returns the number of bytes sent (`end - start`). The state's
/// token counter advances once per completion. `Ok(0)` from the OS resolves
/// as `PeerClosed`.
pub(crate) async fn send_exact(
    stream: &mut TcpStream,
    state: &mut OperationState,
    start: usize,
    end: usize,
    cancel: &Signal,
) -> Result<usize> {
    let mut buf = state.take_buffer().expect("send requires an attached buffer");
    debug_assert!(end <= buf.len() && start < end);

    let mut sent = 0;
    let mut inline_streak = 0u32;
    let result = loop {
        if cancel.is_set() {
            break Err(LongeronError::Cancelled);
        }

        let slice = buf.slice(start + sent..end);
        let BufResult(res, slice) = stream.write(slice).await;
        buf = slice.into_inner();

        match res {
            Ok(0) => break Err(LongeronError::PeerClosed),
            Ok(n) => {
                state.bytes_transferred = n;
                state.token.advance(n);
                sent += n;
                if start + sent == end {
                    break Ok(sent);
                }
                trace!(
                    "[exchange] partial send: {} of {} bytes",
                    sent,
                    end - start
                );
                inline_streak += 1;
                if inline_streak >= INLINE_COMPLETION_LIMIT {
                    inline_streak = 0;
                    reschedule().await;
                }
            }
            Err(e) => break Err(e.into()),
        }
    };

    state.buffer = Some(buf);
    result
}

/// Receive exactly `buffer[start..end)`.
///
/// The slice bound caps the OS read at the frame boundary, so a receive can
/// never consume bytes belonging to the next frame. `Ok(0)` from the OS
/// resolves as `PeerClosed`; callers distinguish a clean close (EOF between
/// frames) by the token counter not having advanced.
pub(crate) async fn recv_exact(
    stream: &mut TcpStream,
    state: &mut OperationState,
    start: usize,
    end: usize,
    cancel: &Signal,
) -> Result<usize> {
    let mut buf = state.take_buffer().expect("recv requires an attached buffer");
    debug_assert!(end <= buf.len() && start < end);

    let mut received = 0;
    let mut inline_streak = 0u32;
    let result = loop {
        if cancel.is_set() {
            break Err(LongeronError::Cancelled);
        }

        let slice = buf.slice(start + received..end);
        let BufResult(res, slice) = stream.read(slice).await;
        buf = slice.into_inner();

        match res {
            Ok(0) => break Err(LongeronError::PeerClosed),
            Ok(n) => {
                state.bytes_transferred = n;
                state.token.advance(n);
                received += n;
                if start + received == end {
                    break Ok(received);
                }
                trace!(
                    "[exchange] partial recv: {} of {} bytes",
                    received,
                    end - start
                );
                inline_streak += 1;
                if inline_streak >= INLINE_COMPLETION_LIMIT {
                    inline_streak = 0;
                    reschedule().await;
                }
            }
            Err(e) => break Err(e.into()),
        }
    };

    state.buffer = Some(buf);
    result
}
