//! Shared scaffolding for the end-to-end tests: a reader on its own runtime
//! thread, plus framed-client helpers. Each thread runs its own compio
//! runtime, mirroring a thread-per-core deployment.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::thread::JoinHandle;

use longeron::{
    init_tracing, BufferPoolStats, EndpointOptions, FramedReader, FramedWriter, RequestHandler,
};

/// Trivial request handler that copies the request into the response.
pub fn echo_handler(_peer: SocketAddr, request: &[u8], response: &mut [u8]) -> Option<usize> {
    response[..request.len()].copy_from_slice(request);
    Some(request.len())
}

/// Pool accounting captured after the reader stopped.
pub struct ReaderReport {
    pub buffer_stats: BufferPoolStats,
    pub idle_state_objects: usize,
}

/// A reader running on a dedicated thread until [`ReaderHarness::stop`].
pub struct ReaderHarness {
    pub addr: SocketAddr,
    stop_tx: flume::Sender<()>,
    handle: JoinHandle<ReaderReport>,
}

impl ReaderHarness {
    /// Bind on an ephemeral localhost port and start accepting.
    pub fn spawn<H: RequestHandler>(
        options: EndpointOptions,
        concurrent_accepts: u16,
        handler: H,
    ) -> Self {
        init_tracing();

        let (addr_tx, addr_rx) = flume::bounded(1);
        let (stop_tx, stop_rx) = flume::bounded::<()>(1);

        let handle = std::thread::spawn(move || {
            let rt = compio::runtime::Runtime::new().unwrap();
            rt.block_on(async move {
                let mut reader = FramedReader::bind(options, handler).await.unwrap();
                reader.start(concurrent_accepts).unwrap();
                addr_tx.send(reader.local_addr()).unwrap();

                let _ = stop_rx.recv_async().await;
                reader.stop().await;
                ReaderReport {
                    buffer_stats: reader.buffer_stats(),
                    idle_state_objects: reader.idle_state_objects(),
                }
            })
        });

        let addr = addr_rx.recv().expect("reader failed to start");
        Self {
            addr,
            stop_tx,
            handle,
        }
    }

    /// Echo reader with default options.
    pub fn spawn_echo(concurrent_accepts: u16) -> Self {
        Self::spawn(EndpointOptions::default(), concurrent_accepts, echo_handler)
    }

    /// Signal the reader to stop and wait for it to quiesce.
    pub fn stop(self) -> ReaderReport {
        let _ = self.stop_tx.send(());
        self.handle.join().expect("reader thread panicked")
    }
}

/// Connect a fresh writer with default options.
pub async fn connect_writer(addr: SocketAddr) -> FramedWriter {
    let mut writer = FramedWriter::new(EndpointOptions::default()).unwrap();
    writer.connect(addr).await.unwrap();
    writer
}

/// One write/read round trip, asserting the echo matches.
pub async fn roundtrip(writer: &mut FramedWriter, addr: SocketAddr, payload: &[u8]) {
    let sent = writer.write(addr, payload).await.unwrap();
    assert_eq!(sent.bytes_transferred, payload.len());

    let mut reply = vec![0u8; payload.len()];
    let received = writer.read(addr, &mut reply).await.unwrap();
    assert_eq!(received.bytes_transferred, payload.len());
    assert_eq!(&reply[..], payload, "echoed payload differs");
}
