//! Client-side framed endpoint.
//!
//! A `FramedWriter` owns one outgoing TCP stream and exchanges
//! length-prefixed frames over it: every `write` sends exactly
//! `HEADER_SIZE + payload` bytes across as many OS sends as needed, and
//! every `read` linearises one inbound frame before returning. Taking
//! `&mut self` on each operation means at most one operation is ever in
//! flight on the socket.
//!
//! Each operation rents a completion state object and a transmission buffer
//! from the endpoint's pools and returns both when it resolves, so
//! steady-state traffic allocates nothing.

use std::net::{Shutdown, SocketAddr};
use std::sync::Arc;

use bytes::Bytes;
use compio::net::TcpStream;
use tracing::{debug, trace, warn};

use longeron_core::buffer::BufferPool;
use longeron_core::error::{LongeronError, Result};
use longeron_core::frame::{decode_header, encode_header, total_frame_size, HEADER_SIZE};
use longeron_core::options::EndpointOptions;
use longeron_core::pool::ObjectPool;
use longeron_core::result::TransmissionResult;
use longeron_core::signal::Signal;
use longeron_core::state::{OperationState, StateRecycler, UserToken};
use longeron_core::tcp;

use crate::exchange;

/// Client-side bidirectional framed messenger.
pub struct FramedWriter {
    stream: Option<TcpStream>,
    peer: Option<SocketAddr>,
    options: EndpointOptions,
    buffers: Arc<BufferPool>,
    states: Arc<ObjectPool<OperationState>>,
    shutdown: Signal,
}

impl FramedWriter {
    /// Create a detached writer with warm pools.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the options fail validation.
    pub fn new(options: EndpointOptions) -> Result<Self> {
        options.validate()?;

        let frame_capacity = total_frame_size(options.max_message_size);
        let buffers = Arc::new(BufferPool::new(
            frame_capacity,
            options.pooled_buffers_per_bucket,
        )?);
        buffers.warm(frame_capacity, options.preallocated_state_objects);

        let states = Arc::new(ObjectPool::new(
            Arc::new(StateRecycler::new(options.default_endpoint)),
            options.preallocated_state_objects,
            options.preallocated_state_objects.max(1) * 2,
        ));

        Ok(Self {
            stream: None,
            peer: None,
            options,
            buffers,
            states,
            shutdown: Signal::new(),
        })
    }

    /// The options this writer was built with.
    #[must_use]
    pub const fn options(&self) -> &EndpointOptions {
        &self.options
    }

    /// Snapshot of the transmission-buffer pool counters.
    #[must_use]
    pub fn buffer_stats(&self) -> longeron_core::buffer::BufferPoolStats {
        self.buffers.stats()
    }

    /// Completion state objects currently parked in the pool.
    #[must_use]
    pub fn idle_state_objects(&self) -> usize {
        self.states.idle_objects()
    }

    /// Check whether a connection is currently open.
    #[inline]
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    /// The connected peer, if any.
    #[inline]
    #[must_use]
    pub const fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer
    }

    /// Local address of the open connection.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        let stream = self.stream.as_ref().ok_or_else(Self::not_connected)?;
        stream.local_addr().map_err(Into::into)
    }

    /// Establish the outgoing connection.
    pub async fn connect(&mut self, remote: SocketAddr) -> Result<()> {
        let never = Signal::new();
        self.connect_with_cancel(remote, &never).await
    }

    /// `connect` with an attached cancellation signal.
    ///
    /// Cancellation is best-effort: a signal that fires after the OS
    /// completes the connect loses the race and the connection stands.
    pub async fn connect_with_cancel(&mut self, remote: SocketAddr, cancel: &Signal) -> Result<()> {
        self.ensure_live()?;
        if self.stream.is_some() {
            return Err(LongeronError::invalid_config(
                "writer is already connected; disconnect first",
            ));
        }

        let mut state = self.states.rent();
        state.token = UserToken::Connect;
        state.remote = remote;

        let outcome = if cancel.is_set() {
            Err(LongeronError::Cancelled)
        } else {
            match TcpStream::connect(remote).await {
                Ok(stream) => {
                    if self.options.nodelay {
                        if let Err(e) = tcp::enable_nodelay(&stream) {
                            warn!("[FramedWriter] failed to set TCP_NODELAY: {e}");
                        }
                    }
                    debug!("[FramedWriter] connected to {remote}");
                    self.stream = Some(stream);
                    self.peer = Some(remote);
                    Ok(())
                }
                Err(e) => Err(e.into()),
            }
        };

        self.states.give_back(state);
        outcome
    }

    /// Gracefully close the connection: half-close the write side, drain the
    /// peer's remaining bytes to EOF, then release the socket.
    ///
    /// With `reuse_socket` the writer stays live and may `connect` again;
    /// without it the writer is disposed and every subsequent operation
    /// fails with `Shutdown`.
    pub async fn disconnect(&mut self, reuse_socket: bool) -> Result<()> {
        let never = Signal::new();
        self.disconnect_with_cancel(reuse_socket, &never).await
    }

    /// `disconnect` with an attached cancellation signal.
    pub async fn disconnect_with_cancel(
        &mut self,
        reuse_socket: bool,
        cancel: &Signal,
    ) -> Result<()> {
        self.ensure_live()?;
        let Some(mut stream) = self.stream.take() else {
            return Ok(());
        };
        self.peer = None;

        let mut state = self.states.rent();
        state.token = UserToken::Disconnect;

        let outcome = async {
            tcp::shutdown_stream(&stream, Shutdown::Write)?;

            // Drain until the peer acknowledges with EOF.
            let drain_capacity = 512.min(self.buffers.max_buffer_size());
            state.buffer = Some(self.buffers.rent(drain_capacity)?);
            loop {
                let buffer_len = state.buffer.as_ref().map_or(0, |b| b.len());
                match exchange::recv_exact(&mut stream, &mut state, 0, buffer_len, cancel).await {
                    Ok(_) => continue,
                    Err(LongeronError::PeerClosed) => break Ok(()),
                    Err(e) => break Err(e),
                }
            }
        }
        .await;

        if let Some(buf) = state.take_buffer() {
            self.buffers.give_back(buf, false);
        }
        self.states.give_back(state);

        debug!("[FramedWriter] disconnected (reuse_socket: {reuse_socket})");
        if !reuse_socket {
            self.shutdown.set();
        }
        outcome
    }

    /// Send exactly `src.len()` payload bytes as one frame.
    ///
    /// # Errors
    ///
    /// `BufferTooLarge` if `src` exceeds `max_message_size`;
    /// `MalformedHeader` for an empty payload; `PeerClosed` / `Transport`
    /// on connection failure.
    pub async fn write(&mut self, remote: SocketAddr, src: &[u8]) -> Result<TransmissionResult> {
        let never = Signal::new();
        self.write_with_cancel(remote, src, &never).await
    }

    /// `write` with an attached cancellation signal, checked before every
    /// continuation.
    pub async fn write_with_cancel(
        &mut self,
        remote: SocketAddr,
        src: &[u8],
        cancel: &Signal,
    ) -> Result<TransmissionResult> {
        self.ensure_live()?;
        self.check_payload_len(src.len())?;
        debug_assert!(
            self.peer.is_none() || self.peer == Some(remote),
            "endpoint argument disagrees with the connected peer"
        );

        let frame_len = total_frame_size(src.len());
        let mut state = self.states.rent();
        state.token = UserToken::Write { total_written: 0 };
        state.remote = remote;

        let outcome = match self.buffers.rent(frame_len) {
            Err(e) => Err(e),
            Ok(mut buf) => {
                let mut header = [0u8; HEADER_SIZE];
                encode_header(src.len(), &mut header);
                buf[..HEADER_SIZE].copy_from_slice(&header);
                buf[HEADER_SIZE..frame_len].copy_from_slice(src);
                state.buffer = Some(buf);

                match self.stream.as_mut() {
                    None => Err(Self::not_connected()),
                    Some(stream) => {
                        exchange::send_exact(stream, &mut state, 0, frame_len, cancel).await
                    }
                }
            }
        };

        if let Some(buf) = state.take_buffer() {
            self.buffers.give_back(buf, false);
        }
        self.states.give_back(state);

        match outcome {
            Ok(sent) => {
                trace!("[FramedWriter] sent frame: {sent} bytes on the wire");
                Ok(TransmissionResult::new(
                    src.len(),
                    remote,
                    Bytes::copy_from_slice(src),
                ))
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Receive one frame; the payload must fit `dst` and is copied into its
    /// prefix.
    ///
    /// # Errors
    ///
    /// `BufferTooLarge` if `dst` exceeds `max_message_size` or the inbound
    /// payload exceeds `dst`; `MalformedHeader` if the peer declares an
    /// illegal length; `PeerClosed` / `Transport` on connection failure.
    pub async fn read(&mut self, remote: SocketAddr, dst: &mut [u8]) -> Result<TransmissionResult> {
        let never = Signal::new();
        self.read_with_cancel(remote, dst, &never).await
    }

    /// `read` with an attached cancellation signal, checked before every
    /// continuation.
    pub async fn read_with_cancel(
        &mut self,
        remote: SocketAddr,
        dst: &mut [u8],
        cancel: &Signal,
    ) -> Result<TransmissionResult> {
        self.ensure_live()?;
        self.check_payload_len(dst.len())?;
        debug_assert!(
            self.peer.is_none() || self.peer == Some(remote),
            "endpoint argument disagrees with the connected peer"
        );

        let mut state = self.states.rent();
        state.token = UserToken::Read {
            expected: dst.len(),
            total_read: 0,
        };
        state.remote = remote;

        let outcome = match self.buffers.rent(total_frame_size(self.options.max_message_size)) {
            Err(e) => Err(e),
            Ok(buf) => {
                state.buffer = Some(buf);
                match self.stream.as_mut() {
                    None => Err(Self::not_connected()),
                    Some(stream) => {
                        Self::read_frame(
                            stream,
                            &mut state,
                            dst,
                            self.options.max_message_size,
                            cancel,
                        )
                        .await
                    }
                }
            }
        };

        if let Some(buf) = state.take_buffer() {
            self.buffers.give_back(buf, false);
        }
        self.states.give_back(state);

        match outcome {
            Ok(view) => {
                trace!("[FramedWriter] received frame: {} bytes", view.len());
                Ok(TransmissionResult::new(view.len(), remote, view))
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Drive one inbound frame to completion: header, then payload, then the
    /// copy into `dst`.
    async fn read_frame(
        stream: &mut TcpStream,
        state: &mut OperationState,
        dst: &mut [u8],
        max_message_size: usize,
        cancel: &Signal,
    ) -> Result<Bytes> {
        exchange::recv_exact(stream, state, 0, HEADER_SIZE, cancel).await?;

        let payload_len = {
            let buf = state.buffer.as_ref().expect("buffer attached after recv");
            let mut header = [0u8; HEADER_SIZE];
            header.copy_from_slice(&buf[..HEADER_SIZE]);
            decode_header(&header, max_message_size)?
        };
        if payload_len > dst.len() {
            return Err(LongeronError::BufferTooLarge {
                size: payload_len,
                max: dst.len(),
            });
        }

        exchange::recv_exact(
            stream,
            state,
            HEADER_SIZE,
            total_frame_size(payload_len),
            cancel,
        )
        .await?;

        let buf = state.buffer.as_ref().expect("buffer attached after recv");
        let payload = &buf[HEADER_SIZE..total_frame_size(payload_len)];
        dst[..payload_len].copy_from_slice(payload);
        Ok(Bytes::copy_from_slice(payload))
    }

    /// Half-close or fully shut down the open connection.
    pub fn shutdown(&self, how: Shutdown) -> Result<()> {
        let stream = self.stream.as_ref().ok_or_else(Self::not_connected)?;
        tcp::shutdown_stream(stream, how).map_err(Into::into)
    }

    /// Tear the writer down: latch the shutdown signal, release the socket,
    /// and destroy every pooled object.
    pub fn dispose(&mut self) {
        self.shutdown.set();
        self.stream = None;
        self.peer = None;
        self.states.dispose();
    }

    fn ensure_live(&self) -> Result<()> {
        if self.shutdown.is_set() {
            return Err(LongeronError::Shutdown);
        }
        Ok(())
    }

    fn check_payload_len(&self, len: usize) -> Result<()> {
        if len == 0 {
            return Err(LongeronError::MalformedHeader {
                len: 0,
                max: self.options.max_message_size,
            });
        }
        if len > self.options.max_message_size {
            return Err(LongeronError::BufferTooLarge {
                size: len,
                max: self.options.max_message_size,
            });
        }
        Ok(())
    }

    /// Mark the connection unusable for errors that tear it down.
    ///
    /// An oversize inbound frame counts: its payload is still on the wire,
    /// so the stream is beyond resynchronisation.
    fn fail(&mut self, err: LongeronError) -> LongeronError {
        if err.is_connection_error() || matches!(err, LongeronError::BufferTooLarge { .. }) {
            debug!("[FramedWriter] connection failed: {err}");
            self.stream = None;
            self.peer = None;
        }
        err
    }

    fn not_connected() -> LongeronError {
        LongeronError::Transport(std::io::Error::new(
            std::io::ErrorKind::NotConnected,
            "writer is not connected",
        ))
    }
}

impl Drop for FramedWriter {
    fn drop(&mut self) {
        self.dispose();
    }
}
