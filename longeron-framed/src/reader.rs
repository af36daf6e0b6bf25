//! Server-side framed endpoint.
//!
//! A `FramedReader` owns a listening socket and serves framed
//! request/response exchanges from many concurrent peers. `start` keeps a
//! configurable number of accept operations outstanding; each accepted
//! socket runs its own connection task that linearises one frame at a time:
//! receive header, receive payload, dispatch to the request handler, send
//! the response, repeat.
//!
//! Fault isolation: anything that goes wrong on an accepted socket (bad
//! header, transport error, handler panic) closes that connection only and
//! is logged, never surfaced to the caller. Shutdown closes the listening
//! socket first, failing any accept still pending in the kernel; per-
//! connection work is cooperative, observing the signal before each next OS
//! call, and `stop` resolves once the last connection has closed its socket
//! and returned its state object.

use std::cell::RefCell;
use std::io::ErrorKind;
use std::net::{Shutdown, SocketAddr};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use compio::net::{TcpListener, TcpStream};
use compio::runtime::Task;
use smallvec::SmallVec;
use tracing::{debug, trace, warn};

use longeron_core::buffer::{BufferPool, BufferPoolStats};
use longeron_core::error::{LongeronError, Result};
use longeron_core::frame::{decode_header, encode_header, total_frame_size, HEADER_SIZE};
use longeron_core::options::EndpointOptions;
use longeron_core::pool::ObjectPool;
use longeron_core::signal::Signal;
use longeron_core::state::{OperationState, StateRecycler, UserToken};
use longeron_core::tcp;

use crate::exchange;
use crate::handler::RequestHandler;

/// Everything the acceptor and connection tasks need, shared across all of
/// them. The listener lives here (not in the tasks) so that tearing it down
/// in one place is what actually unblocks every pending accept.
struct ReaderShared {
    listener: RefCell<Option<Rc<TcpListener>>>,
    handler: Arc<dyn RequestHandler>,
    options: EndpointOptions,
    buffers: Arc<BufferPool>,
    states: Arc<ObjectPool<OperationState>>,
    shutdown: Signal,
}

/// Server-side acceptor for framed request/response exchanges.
pub struct FramedReader {
    local_endpoint: SocketAddr,
    shared: Rc<ReaderShared>,
    accept_tasks: SmallVec<[Task<()>; 8]>,
    // Every running task holds a clone; the receiver disconnects when the
    // last one exits.
    drain_tx: Option<flume::Sender<()>>,
    drain_rx: flume::Receiver<()>,
    started: bool,
}

impl FramedReader {
    /// Bind the listening socket at `options.default_endpoint` and warm the
    /// pools. The reader accepts nothing until [`FramedReader::start`].
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` for out-of-range options and `Transport` if
    /// the bind fails.
    pub async fn bind(options: EndpointOptions, handler: impl RequestHandler) -> Result<Self> {
        options.validate()?;

        let listener = TcpListener::bind(options.default_endpoint)
            .await
            .map_err(LongeronError::from)?;
        let local_endpoint = listener.local_addr().map_err(LongeronError::from)?;

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

        let (drain_tx, drain_rx) = flume::unbounded();

        debug!("[FramedReader] listening on {local_endpoint}");
        Ok(Self {
            local_endpoint,
            shared: Rc::new(ReaderShared {
                listener: RefCell::new(Some(Rc::new(listener))),
                handler: Arc::new(handler),
                options,
                buffers,
                states,
                shutdown: Signal::new(),
            }),
            accept_tasks: SmallVec::new(),
            drain_tx: Some(drain_tx),
            drain_rx,
            started: false,
        })
    }

    /// The address the listener actually bound (resolves port 0).
    #[inline]
    #[must_use]
    pub const fn local_addr(&self) -> SocketAddr {
        self.local_endpoint
    }

    /// Dispatch `concurrent_accepts` outstanding accept operations.
    ///
    /// Each completion immediately re-arms its accept while the accepted
    /// socket transitions to its own connection task, so the listener queue
    /// keeps draining at full parallelism.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` if already started or `concurrent_accepts` is zero;
    /// `Shutdown` once [`FramedReader::stop`] has been called.
    pub fn start(&mut self, concurrent_accepts: u16) -> Result<()> {
        if self.shared.shutdown.is_set() {
            return Err(LongeronError::Shutdown);
        }
        if self.started {
            return Err(LongeronError::invalid_config("reader is already started"));
        }
        if concurrent_accepts == 0 {
            return Err(LongeronError::invalid_config(
                "concurrent_accepts must be > 0",
            ));
        }
        if self.shared.listener.borrow().is_none() {
            return Err(LongeronError::Shutdown);
        }
        let drain = self
            .drain_tx
            .clone()
            .ok_or(LongeronError::Shutdown)?;

        for id in 0..concurrent_accepts {
            self.accept_tasks.push(compio::runtime::spawn(accept_loop(
                id,
                self.shared.clone(),
                drain.clone(),
            )));
        }
        self.started = true;
        debug!("[FramedReader] started with {concurrent_accepts} concurrent accepts");
        Ok(())
    }

    /// Quiesce the reader.
    ///
    /// Closes the listening socket first, so every pending accept completes
    /// with an error at the OS level rather than waiting on the shutdown
    /// flag, then latches the signal and waits until every connection task
    /// has observed it, closed its socket, and returned its state object.
    /// One-shot and idempotent.
    pub async fn stop(&mut self) {
        self.shared.shutdown.set();
        close_listener(&self.shared);
        self.drain_tx.take();

        // Disconnects once the last task guard drops; nothing is ever sent.
        let _ = self.drain_rx.recv_async().await;
        self.accept_tasks.clear();
        debug!("[FramedReader] stopped");
    }

    /// Tear the reader down without waiting for connection drain.
    pub fn dispose(&mut self) {
        self.shared.shutdown.set();
        close_listener(&self.shared);
        self.drain_tx.take();
        self.accept_tasks.clear();
        self.shared.states.dispose();
    }

    /// Snapshot of the transmission-buffer pool counters.
    #[must_use]
    pub fn buffer_stats(&self) -> BufferPoolStats {
        self.shared.buffers.stats()
    }

    /// Completion state objects currently parked in the pool.
    #[must_use]
    pub fn idle_state_objects(&self) -> usize {
        self.shared.states.idle_objects()
    }
}

impl Drop for FramedReader {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// One acceptor: keeps a single accept operation outstanding, handing each
/// accepted socket to its own connection task and immediately re-arming.
///
/// The listener is fetched from the shared slot per iteration rather than
/// held for the task's lifetime, so closing it there is what unblocks a
/// pending accept at the OS level.
async fn accept_loop(id: u16, shared: Rc<ReaderShared>, drain: flume::Sender<()>) {
    use futures::{pin_mut, select, FutureExt};

    loop {
        if shared.shutdown.is_set() {
            break;
        }
        let Some(listener) = shared.listener.borrow().clone() else {
            break;
        };

        let accepted = {
            let accept = listener.accept().fuse();
            let stop = shared.shutdown.wait().fuse();
            pin_mut!(accept, stop);
            select! {
                res = accept => Some(res),
                _ = stop => None,
            }
        };
        let Some(result) = accepted else { break };

        match result {
            Ok((stream, peer)) => {
                trace!("[FramedReader] acceptor {id}: connection from {peer}");
                compio::runtime::spawn(serve_connection(
                    stream,
                    peer,
                    shared.clone(),
                    drain.clone(),
                ))
                .detach();
            }
            Err(e) => {
                let err = LongeronError::from(e);
                if err.is_cancellation() || shared.shutdown.is_set() {
                    break;
                }
                if err.is_connection_reset() {
                    // Half-open probe died in the backlog; not an error.
                    trace!("[FramedReader] acceptor {id}: reset during accept, re-arming");
                    continue;
                }
                if is_listener_fatal(&err) {
                    // The listening socket itself is dead. Stop accepting
                    // reader-wide; in-flight connections drain and `stop`
                    // still resolves.
                    warn!("[FramedReader] acceptor {id}: listener failed: {err}; stopping accepts");
                    shared.shutdown.set();
                    close_listener(&shared);
                    break;
                }
                // Transient accept failures (e.g. fd exhaustion) are logged
                // and retried; the acceptor never gives up on its own.
                warn!("[FramedReader] acceptor {id}: accept failed: {err}; retrying");
                compio::time::sleep(Duration::from_millis(10)).await;
            }
        }
    }
    trace!("[FramedReader] acceptor {id} exited");
}

/// Take the shared listener and shut its socket down, failing any accept
/// still pending in the kernel. Idempotent.
fn close_listener(shared: &ReaderShared) {
    if let Some(listener) = shared.listener.borrow_mut().take() {
        if let Err(e) = tcp::shutdown_listener(&listener, Shutdown::Both) {
            trace!("[FramedReader] listener shutdown: {e}");
        }
    }
}

/// Errors that mean the listening socket itself is unusable, as opposed to
/// a per-attempt failure worth retrying.
fn is_listener_fatal(err: &LongeronError) -> bool {
    match err {
        LongeronError::Transport(e) => matches!(
            e.kind(),
            ErrorKind::InvalidInput | ErrorKind::NotConnected
        ),
        _ => false,
    }
}

/// Own one accepted socket for its lifetime.
async fn serve_connection(
    mut stream: TcpStream,
    peer: SocketAddr,
    shared: Rc<ReaderShared>,
    _drain: flume::Sender<()>,
) {
    if shared.options.nodelay {
        if let Err(e) = tcp::enable_nodelay(&stream) {
            warn!("[FramedReader] failed to set TCP_NODELAY for {peer}: {e}");
        }
    }

    let mut state = shared.states.rent();
    state.token = UserToken::ServerTransmission {
        frames: 0,
        total_bytes: 0,
    };
    state.remote = peer;

    // Race the exchange loop against the shutdown signal so a connection
    // idling between frames cannot hold `stop` hostage; the abandoned OS
    // call is cancelled when its future drops.
    let result = {
        use futures::{pin_mut, select, FutureExt};
        let work = connection_loop(&mut stream, peer, &shared, &mut state).fuse();
        let stop = shared.shutdown.wait().fuse();
        pin_mut!(work, stop);
        select! {
            r = work => r,
            _ = stop => Err(LongeronError::Shutdown),
        }
    };

    match result {
        Ok(()) => debug!("[FramedReader] connection {peer} closed"),
        Err(e) if e.is_cancellation() => {
            debug!("[FramedReader] connection {peer} released on shutdown");
        }
        Err(e) => debug!("[FramedReader] connection {peer} dropped: {e}"),
    }

    // A forced teardown can abandon the loop between exchanges with a
    // buffer still attached.
    release_attached(&shared, &mut state);
    shared.states.give_back(state);
    // Dropping the stream closes the socket; dropping the drain guard
    // releases this connection from `stop`.
}

/// Drive `accept → receive-header → receive-body → dispatch →
/// send-response → receive-header …` until the peer leaves, an error closes
/// the connection, or shutdown is observed.
async fn connection_loop(
    stream: &mut TcpStream,
    peer: SocketAddr,
    shared: &Rc<ReaderShared>,
    state: &mut OperationState,
) -> Result<()> {
    let packet_size = shared.options.max_message_size;
    let frame_capacity = total_frame_size(packet_size);

    loop {
        if shared.shutdown.is_set() {
            return Ok(());
        }

        let request = shared.buffers.rent(frame_capacity)?;
        state.buffer = Some(request);

        // A peer that closes between frames is a clean goodbye; mid-frame
        // EOF is not. The token's byte counter tells the two apart.
        let bytes_before_header = transferred(state);
        if let Err(e) =
            exchange::recv_exact(stream, state, 0, HEADER_SIZE, &shared.shutdown).await
        {
            release_attached(shared, state);
            return match e {
                LongeronError::PeerClosed if transferred(state) == bytes_before_header => Ok(()),
                other => Err(other),
            };
        }

        let payload_len = {
            let buf = state.buffer.as_ref().expect("buffer attached after recv");
            let mut header = [0u8; HEADER_SIZE];
            header.copy_from_slice(&buf[..HEADER_SIZE]);
            match decode_header(&header, packet_size) {
                Ok(len) => len,
                Err(e) => {
                    release_attached(shared, state);
                    return Err(e);
                }
            }
        };

        if let Err(e) = exchange::recv_exact(
            stream,
            state,
            HEADER_SIZE,
            total_frame_size(payload_len),
            &shared.shutdown,
        )
        .await
        {
            release_attached(shared, state);
            return Err(e);
        }

        // Dispatch. The handler gets the payload and a response slot of
        // exactly `packet_size` bytes after the reserved header prefix.
        let mut response = shared.buffers.rent(frame_capacity)?;
        let verdict = {
            let buf = state.buffer.as_ref().expect("buffer attached after recv");
            let request_payload = &buf[HEADER_SIZE..total_frame_size(payload_len)];
            let response_slot = &mut response[HEADER_SIZE..HEADER_SIZE + packet_size];
            let handler = &shared.handler;
            catch_unwind(AssertUnwindSafe(|| {
                handler.handle(peer, request_payload, response_slot)
            }))
        };

        // The request buffer is done either way.
        release_attached(shared, state);

        match verdict {
            Err(_) => {
                warn!("[FramedReader] handler panicked for {peer}; closing connection");
                shared.buffers.give_back(response, false);
                return Ok(());
            }
            Ok(None) => {
                // Fire-and-forget exchange.
                shared.buffers.give_back(response, false);
            }
            Ok(Some(n)) if n > packet_size => {
                shared.buffers.give_back(response, false);
                return Err(LongeronError::BufferTooLarge {
                    size: n,
                    max: packet_size,
                });
            }
            Ok(Some(0)) => {
                // A zero-length response frame is never legal on the wire.
                shared.buffers.give_back(response, false);
                return Err(LongeronError::MalformedHeader {
                    len: 0,
                    max: packet_size,
                });
            }
            Ok(Some(n)) => {
                let mut header = [0u8; HEADER_SIZE];
                encode_header(n, &mut header);
                response[..HEADER_SIZE].copy_from_slice(&header);

                state.buffer = Some(response);
                let sent = exchange::send_exact(
                    stream,
                    state,
                    0,
                    total_frame_size(n),
                    &shared.shutdown,
                )
                .await;
                release_attached(shared, state);
                sent?;
            }
        }

        state.token.complete_frame();
    }
}

fn transferred(state: &OperationState) -> usize {
    match state.token {
        UserToken::ServerTransmission { total_bytes, .. } => total_bytes,
        _ => 0,
    }
}

/// Return the state's attached buffer, if any, to the buffer pool.
fn release_attached(shared: &Rc<ReaderShared>, state: &mut OperationState) {
    if let Some(buf) = state.take_buffer() {
        shared.buffers.give_back(buf, false);
    }
}
