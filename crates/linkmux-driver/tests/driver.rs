//! End-to-end driver behavior over in-memory links.

use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use linkmux_codec::{ByteOrder, Field, Schema, Value};
use linkmux_driver::{
    ConnectRetry, DriverError, LinkReceiver, LinkSender, Operation, ReceiveOptions, Registry,
    SendOptions,
};
use linkmux_frame::Frame;
use linkmux_transport::MockLink;

fn u8_pair() -> Schema {
    Schema::new([Field::U8, Field::U8], ByteOrder::Little)
}

fn fast_retry() -> ConnectRetry {
    ConnectRetry::runtime().with_backoff(Duration::from_millis(1))
}

/// Poll `cond` for up to two seconds; dispatch loops run on their own
/// threads and need a moment to pick frames up.
fn wait_until(cond: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    false
}

#[test]
fn sender_registers_connects_and_counts() {
    let registry = Arc::new(Registry::new());
    let (link, handle) = MockLink::new("mock0");

    let sender = LinkSender::open(
        "telemetry-tx",
        u8_pair(),
        link,
        registry.clone(),
        SendOptions::default().with_identifier(0x10),
    )
    .unwrap();

    assert!(handle.is_connected());
    assert_eq!(sender.send(&[Value::UInt(1), Value::UInt(2)]).unwrap(), 1);
    assert_eq!(sender.send(&[Value::UInt(3), Value::UInt(4)]).unwrap(), 2);
    assert_eq!(sender.count(), 2);

    let sent = handle.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].id, Some(0x10));
    assert_eq!(sent[0].payload.as_ref(), [1, 2]);

    let info = registry.instance("telemetry-tx").unwrap();
    assert_eq!(info.operation, Operation::Send);
    assert!(info.running);
    assert_eq!(info.message_count, 2);
}

#[test]
fn duplicate_name_is_rejected_before_connecting() {
    let registry = Arc::new(Registry::new());
    let (first, _h1) = MockLink::new("mock0");
    LinkSender::open(
        "dup",
        u8_pair(),
        first,
        registry.clone(),
        SendOptions::default().with_identifier(1),
    )
    .unwrap();

    let (second, h2) = MockLink::new("mock1");
    let err = LinkSender::open(
        "dup",
        u8_pair(),
        second,
        registry,
        SendOptions::default().with_identifier(2),
    )
    .unwrap_err();
    assert!(matches!(err, DriverError::DuplicateName(_)));
    // The doomed instance never touched its link.
    assert_eq!(h2.connect_attempts(), 0);
}

#[test]
fn oversize_layout_is_refused_outright() {
    let registry = Arc::new(Registry::new());
    let (link, handle) = MockLink::new("mock0");
    let link = link.with_max_payload(8);

    let imu = Schema::repeated(Field::F32, 6, ByteOrder::Little);
    let err = LinkSender::open("imu-tx", imu, link, registry, SendOptions::default()).unwrap_err();
    assert!(matches!(
        err,
        DriverError::OversizePayload { width: 24, max: 8 }
    ));
    assert_eq!(handle.connect_attempts(), 0);
}

#[test]
fn two_receivers_share_one_dispatch_loop() {
    let registry = Arc::new(Registry::new());
    let (link, handle) = MockLink::new("mock0");

    let rx_a = LinkReceiver::open(
        "rx-a",
        u8_pair(),
        link,
        registry.clone(),
        ReceiveOptions::default().with_identifier(0xA),
    )
    .unwrap();

    // The second receiver's link shares the channel state but is never
    // connected; the running loop already owns the channel.
    let second = MockLink::new("mock0").0;
    let rx_b = LinkReceiver::open(
        "rx-b",
        u8_pair(),
        second,
        registry.clone(),
        ReceiveOptions::default().with_identifier(0xB),
    )
    .unwrap();

    assert!(registry.dispatch_running("mock0"));
    assert_eq!(handle.connect_attempts(), 1);

    handle.push_incoming(Frame::new(0xA, Bytes::from_static(&[1, 2])));
    handle.push_incoming(Frame::new(0xB, Bytes::from_static(&[3, 4])));
    // Unclaimed identifier: dropped silently.
    handle.push_incoming(Frame::new(0xC, Bytes::from_static(&[9, 9])));

    assert!(wait_until(|| handle.pending_incoming() == 0));
    assert!(wait_until(|| rx_a.receive_raw().unwrap().is_some()));
    assert!(wait_until(|| rx_b.receive_raw().unwrap().is_some()));

    let values = rx_a.receive().unwrap().unwrap();
    assert_eq!(values, [Value::UInt(1), Value::UInt(2)]);
    assert_eq!(rx_b.receive_raw().unwrap().unwrap().as_ref(), [3, 4]);

    assert!(rx_a.shutdown_dispatch());
    assert!(!registry.dispatch_running("mock0"));
}

#[test]
fn newer_frame_overwrites_and_count_tracks_the_wire() {
    let registry = Arc::new(Registry::new());
    let (link, handle) = MockLink::new("mock0");

    let rx = LinkReceiver::open(
        "rx",
        u8_pair(),
        link,
        registry,
        ReceiveOptions::default().with_identifier(7),
    )
    .unwrap();

    handle.push_incoming(Frame::new(7, Bytes::from_static(&[1, 1])));
    handle.push_incoming(Frame::new(7, Bytes::from_static(&[2, 2])));
    assert!(wait_until(|| rx.count() == 2));

    // Reads are non-destructive and see only the latest payload.
    assert_eq!(rx.receive_raw().unwrap().unwrap().as_ref(), [2, 2]);
    assert_eq!(rx.receive_raw().unwrap().unwrap().as_ref(), [2, 2]);

    rx.shutdown_dispatch();
}

#[test]
fn read_failure_invalidates_buffers_then_recovers() {
    let registry = Arc::new(Registry::new());
    let (link, handle) = MockLink::new("mock0");

    let rx = LinkReceiver::open(
        "rx",
        u8_pair(),
        link,
        registry,
        ReceiveOptions::default()
            .with_identifier(7)
            .with_runtime(fast_retry()),
    )
    .unwrap();

    handle.push_incoming(Frame::new(7, Bytes::from_static(&[1, 1])));
    assert!(wait_until(|| rx.receive_raw().unwrap().is_some()));

    // A failed read drops the connection and must wipe the stale payload.
    handle.fail_reads(1);
    assert!(wait_until(|| rx.receive_raw().unwrap().is_none()));

    // After the loop reconnects, fresh frames flow again.
    assert!(wait_until(|| handle.is_connected()));
    handle.push_incoming(Frame::new(7, Bytes::from_static(&[2, 2])));
    assert!(wait_until(
        || rx.receive_raw().unwrap().map(|p| p.as_ref() == [2, 2]) == Some(true)
    ));

    rx.shutdown_dispatch();
}

#[test]
fn send_times_out_when_the_link_stays_down() {
    let registry = Arc::new(Registry::new());
    let (link, handle) = MockLink::new("mock0");

    let sender = LinkSender::open(
        "tx",
        u8_pair(),
        link,
        registry.clone(),
        SendOptions::default()
            .with_identifier(1)
            .with_send_timeout(Duration::from_millis(50))
            .with_runtime(fast_retry()),
    )
    .unwrap();

    // Seed a buffered payload so the failure's invalidation is observable.
    registry.register(linkmux_driver::InstanceInfo {
        name: "rx".to_string(),
        protocol: "mock".to_string(),
        channel: "mock0".to_string(),
        operation: Operation::Receive,
        identifier: Some(2),
        running: false,
        message_count: 0,
    })
    .unwrap();
    registry.record_received("mock0", Some(2), Bytes::from_static(&[9]));

    handle.fail_writes(u32::MAX);
    handle.fail_connects(u32::MAX);
    let err = sender.send(&[Value::UInt(1), Value::UInt(2)]).unwrap_err();
    assert!(matches!(err, DriverError::SendTimeout { .. }));

    // Counters only move on success; buffers were invalidated.
    assert_eq!(sender.count(), 0);
    assert_eq!(registry.read_latest("mock0", Some(2)), None);
}

#[test]
fn concurrent_send_fails_fast_with_busy() {
    let registry = Arc::new(Registry::new());
    let (link, handle) = MockLink::new("mock0");

    let sender = Arc::new(
        LinkSender::open(
            "tx",
            u8_pair(),
            link,
            registry,
            SendOptions::default()
                .with_identifier(1)
                .with_send_timeout(Duration::from_millis(400))
                .with_runtime(ConnectRetry::runtime().with_backoff(Duration::from_millis(20))),
        )
        .unwrap(),
    );

    // First send gets stuck reconnecting and holds the link.
    handle.fail_writes(u32::MAX);
    handle.fail_connects(u32::MAX);
    let stuck = {
        let sender = sender.clone();
        std::thread::spawn(move || sender.send(&[Value::UInt(0), Value::UInt(0)]))
    };

    std::thread::sleep(Duration::from_millis(100));
    let err = sender.send(&[Value::UInt(1), Value::UInt(1)]).unwrap_err();
    assert!(matches!(err, DriverError::SendBusy));

    let err = stuck.join().unwrap().unwrap_err();
    assert!(matches!(err, DriverError::SendTimeout { .. }));
}

#[test]
fn stopped_instances_refuse_operations_but_stay_registered() {
    let registry = Arc::new(Registry::new());
    let (link, _handle) = MockLink::new("mock0");

    let sender = LinkSender::open(
        "tx",
        u8_pair(),
        link,
        registry.clone(),
        SendOptions::default().with_identifier(1),
    )
    .unwrap();

    sender.stop().unwrap();
    let err = sender.send(&[Value::UInt(1), Value::UInt(2)]).unwrap_err();
    assert!(matches!(err, DriverError::Stopped(_)));

    // The slot survives as an audit trail and the identifier stays claimed.
    let info = registry.instance("tx").unwrap();
    assert!(!info.running);
    let (other, _h) = MockLink::new("mock0");
    let err = LinkSender::open(
        "tx2",
        u8_pair(),
        other,
        registry,
        SendOptions::default().with_identifier(1),
    )
    .unwrap_err();
    assert!(matches!(err, DriverError::IdentifierConflict { id: 1, .. }));
}

#[test]
fn anonymous_channel_carries_raw_payloads() {
    let registry = Arc::new(Registry::new());
    let (link, handle) = MockLink::new("mock0");

    let rx = LinkReceiver::open(
        "raw-rx",
        Schema::new([], ByteOrder::Little),
        link,
        registry.clone(),
        ReceiveOptions::default(),
    )
    .unwrap();

    // A second instance on the anonymous channel cannot be told apart.
    let second = MockLink::new("mock0").0;
    let err = LinkReceiver::open(
        "raw-rx2",
        Schema::new([], ByteOrder::Little),
        second,
        registry,
        ReceiveOptions::default().with_identifier(5),
    )
    .unwrap_err();
    assert!(matches!(err, DriverError::AnonymousConflict { .. }));

    handle.push_incoming(Frame::new(None, Bytes::from_static(b"status ok")));
    assert!(wait_until(|| rx.receive_raw().unwrap().is_some()));
    assert_eq!(rx.receive_raw().unwrap().unwrap().as_ref(), b"status ok");

    rx.shutdown_dispatch();
}
