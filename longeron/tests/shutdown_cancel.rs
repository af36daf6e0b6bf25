//! Lifecycle: cooperative cancellation on the writer, reader quiescence on
//! stop, and pool accounting after both.

mod common;

use common::{connect_writer, roundtrip, ReaderHarness};
use longeron::{EndpointOptions, FramedWriter, LongeronError, Signal};

#[test]
fn preset_cancellation_resolves_cancelled_without_leaks() {
    let harness = ReaderHarness::spawn_echo(1);
    let addr = harness.addr;

    let rt = compio::runtime::Runtime::new().unwrap();
    rt.block_on(async move {
        let mut writer = connect_writer(addr).await;

        let cancel = Signal::new();
        cancel.set();

        let err = writer
            .write_with_cancel(addr, b"never sent", &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, LongeronError::Cancelled));

        let mut reply = vec![0u8; 16];
        let err = writer
            .read_with_cancel(addr, &mut reply, &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, LongeronError::Cancelled));

        // The cancellation fired before any byte hit the wire, so the
        // connection is intact and the pools balance.
        roundtrip(&mut writer, addr, b"connection survived").await;

        let stats = writer.buffer_stats();
        assert_eq!(stats.rents, stats.returns + stats.discards);

        writer.disconnect(false).await.unwrap();
    });

    harness.stop();
}

#[test]
fn stop_quiesces_pools_after_clean_disconnects() {
    let options = EndpointOptions::default().with_preallocated_state_objects(4);
    let harness = ReaderHarness::spawn(options, 2, common::echo_handler);
    let addr = harness.addr;

    for _ in 0..3 {
        let rt = compio::runtime::Runtime::new().unwrap();
        rt.block_on(async move {
            let mut writer = connect_writer(addr).await;
            roundtrip(&mut writer, addr, b"quiescence probe").await;
            writer.disconnect(false).await.unwrap();
        });
    }

    let report = harness.stop();

    // Every rented buffer went back (or was trimmed); every connection's
    // state object returned to the idle set.
    let stats = report.buffer_stats;
    assert_eq!(stats.rents, stats.returns + stats.discards);
    assert_eq!(report.idle_state_objects, 4);
}

#[test]
fn stop_releases_an_idle_connection() {
    let harness = ReaderHarness::spawn_echo(1);
    let addr = harness.addr;

    // The client completes one exchange, then stays connected and silent;
    // the connection task is parked waiting for the next header.
    let rt = compio::runtime::Runtime::new().unwrap();
    let report = rt.block_on(async move {
        let mut writer = connect_writer(addr).await;
        roundtrip(&mut writer, addr, b"only frame").await;

        // stop() must resolve even though the peer never disconnects.
        let report = harness.stop();

        // The reader tore the connection down; the writer finds out on its
        // next operation.
        let mut reply = vec![0u8; 16];
        assert!(writer.read(addr, &mut reply).await.is_err());
        report
    });

    assert_eq!(report.idle_state_objects, 32);
}

#[test]
fn disconnect_with_reuse_allows_reconnect() {
    let harness = ReaderHarness::spawn_echo(1);
    let addr = harness.addr;

    let rt = compio::runtime::Runtime::new().unwrap();
    rt.block_on(async move {
        let mut writer = connect_writer(addr).await;
        roundtrip(&mut writer, addr, b"first life").await;

        writer.disconnect(true).await.unwrap();
        assert!(!writer.is_connected());

        writer.connect(addr).await.unwrap();
        roundtrip(&mut writer, addr, b"second life").await;

        writer.disconnect(false).await.unwrap();
        let err = writer.connect(addr).await.unwrap_err();
        assert!(matches!(err, LongeronError::Shutdown));
    });

    harness.stop();
}

#[test]
fn disposed_writer_refuses_all_operations() {
    let rt = compio::runtime::Runtime::new().unwrap();
    rt.block_on(async {
        let mut writer = FramedWriter::new(EndpointOptions::default()).unwrap();
        writer.dispose();

        let addr = "127.0.0.1:12377".parse().unwrap();
        assert!(matches!(
            writer.connect(addr).await,
            Err(LongeronError::Shutdown)
        ));
        assert!(matches!(
            writer.write(addr, b"x").await,
            Err(LongeronError::Shutdown)
        ));
    });
}
