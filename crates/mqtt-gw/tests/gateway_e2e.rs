// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! End-to-end tests for the gateway.
//!
//! Configuration and topic table are written to temporary files, loaded the
//! way the CLI loads them, and the gateway runs against the in-process
//! [`LocalBus`] and [`LoopbackClient`].

use mqtt_gw::{
    BusMessage, Gateway, GatewayConfig, GatewayError, InboundMessage, LocalBus, LoopbackClient,
    MsgId, Qos, RatePayload, SoftwareBus, TableError,
};
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

const BASE: MsgId = 0x0900;

const TABLE: &str = r#"{
  "topics": [
    { "name": "sat/rate",         "direction": "pub", "offset": 0, "codec": "rate" },
    { "name": "gnd/rate/cmd",     "direction": "sub", "offset": 1, "codec": "rate" },
    { "name": "gnd/rate/cmd/alt", "direction": "sub", "offset": 2, "codec": "rate" }
  ]
}"#;

fn write_files(dir: &Path, table: &str, extra: &str) -> GatewayConfig {
    let table_path = dir.join("topics.json");
    std::fs::write(&table_path, table).expect("write table");

    let config_path = dir.join("gateway.toml");
    let config = format!(
        r#"
name = "e2e"
base_msg_id = {}
max_topics = 8
bus_pend_time_ms = 10
client_yield_time_ms = 5
inbound_queue_depth = 4
topic_table = '{}'
{}
"#,
        BASE,
        table_path.display(),
        extra
    );
    std::fs::write(&config_path, config).expect("write config");

    GatewayConfig::from_file(&config_path).expect("load config")
}

fn wait_for(mut done: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if done() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    done()
}

fn rig(config: GatewayConfig) -> (Gateway, Arc<LocalBus>, Arc<LoopbackClient>) {
    let bus = Arc::new(LocalBus::new(config.topic_pipe_name.clone(), 16));
    let client = Arc::new(LoopbackClient::new());
    let (gateway, report) =
        Gateway::from_config(config, bus.clone(), client.clone()).expect("gateway");
    assert!(report.is_complete(), "load failed: {:?}", report.error);
    (gateway, bus, client)
}

#[test]
fn test_end_to_end_both_directions() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = write_files(dir.path(), TABLE, "publish_qos = \"at_least_once\"");
    let (gateway, bus, client) = rig(config);
    let monitor = bus.monitor();
    let handle = gateway.start().expect("start");

    // bus -> external
    bus.transmit(BusMessage::new(BASE, RatePayload::new(0.5, -1.0, 2.0).to_bytes()))
        .expect("transmit");
    assert!(wait_for(|| !client.published().is_empty()));
    let published = client.take_published();
    assert_eq!(published[0].topic, "sat/rate");
    assert_eq!(published[0].qos, Qos::AtLeastOnce);
    assert_eq!(
        String::from_utf8(published[0].payload.clone()).unwrap(),
        r#"{"rate":{"x":0.500000,"y":-1.000000,"z":2.000000}}"#
    );

    // external -> bus; the longer name shares a prefix with the shorter one
    client.inject("gnd/rate/cmd", br#"{"rate":{"x":1,"y":2,"z":3}}"#);
    let first = monitor
        .recv_timeout(Duration::from_secs(2))
        .expect("first transmit");
    // skip the bus message transmitted above
    let cmd = if first.msg_id == BASE {
        monitor
            .recv_timeout(Duration::from_secs(2))
            .expect("command transmit")
    } else {
        first
    };
    assert_eq!(cmd.msg_id, BASE + 1);
    assert!(cmd.timestamp.is_some());
    assert_eq!(
        RatePayload::from_bytes(&cmd.payload),
        Some(RatePayload::new(1.0, 2.0, 3.0))
    );

    // incomplete JSON and an unknown topic are dropped
    let queue = handle.inbound_sender();
    queue.offer(InboundMessage::from_raw(r#"gnd/rate/cmd{"rate":{"x":1,"y":2}}"#));
    queue.offer(InboundMessage::from_raw("sat/unknown{}"));
    assert!(wait_for(|| handle.snapshot().external_to_bus.dropped() == 2));

    let snap = handle.snapshot();
    assert_eq!(snap.external_to_bus.forwarded, 1);
    assert_eq!(snap.external_to_bus.codec_errors, 1);
    assert_eq!(snap.external_to_bus.lookup_errors, 1);
    assert_eq!(snap.bus_to_external.forwarded, 1);
    assert!(monitor.try_recv().is_err());

    handle.join();
}

#[test]
fn test_first_in_table_order_shadows_longer_name() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = write_files(dir.path(), TABLE, "");
    let (gateway, bus, _client) = rig(config);
    let monitor = bus.monitor();
    let queue = gateway.inbound_sender();
    let handle = gateway.start().expect("start");

    queue.offer(InboundMessage::from_raw(
        r#"gnd/rate/cmd/alt{"rate":{"x":1,"y":2,"z":3}}"#,
    ));

    // "gnd/rate/cmd" (index 1) matches first and the payload starts at "/alt"
    assert!(wait_for(|| handle.snapshot().external_to_bus.dropped() == 1));
    assert_eq!(handle.snapshot().external_to_bus.codec_errors, 1);
    assert!(monitor.try_recv().is_err());
    handle.join();
}

#[test]
fn test_longest_match_resolves_longer_name() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = write_files(dir.path(), TABLE, "prefix_policy = \"longest_match\"");
    let (gateway, bus, _client) = rig(config);
    let monitor = bus.monitor();
    let queue = gateway.inbound_sender();
    let handle = gateway.start().expect("start");

    queue.offer(InboundMessage::from_raw(
        r#"gnd/rate/cmd/alt{"rate":{"x":1,"y":2,"z":3}}"#,
    ));

    let msg = monitor
        .recv_timeout(Duration::from_secs(2))
        .expect("transmitted");
    assert_eq!(msg.msg_id, BASE + 2);
    handle.join();
}

#[test]
fn test_partial_table_keeps_leading_rows() {
    let dir = tempfile::tempdir().expect("tempdir");
    let table = r#"{"topics":[
        {"name":"a","direction":"pub","offset":0,"codec":"rate"},
        {"name":"b","direction":"sub","offset":1,"codec":"rate"},
        {"name":"c","direction":"sub","offset":1,"codec":"rate"},
        {"name":"d","direction":"sub","offset":3,"codec":"rate"}
    ]}"#;
    let config = write_files(dir.path(), table, "");

    let bus = Arc::new(LocalBus::new("PIPE", 4));
    let client = Arc::new(LoopbackClient::new());
    let (mut gateway, report) =
        Gateway::from_config(config, bus.clone(), client.clone()).expect("gateway");

    assert_eq!(report.declared, 4);
    assert_eq!(report.loaded, 2);
    assert!(matches!(
        report.error,
        Some(TableError::DuplicateOffset { row: 2, .. })
    ));

    let summary = gateway.bootstrap();
    assert_eq!(summary.attempted, 2);
    assert!(bus.is_subscribed(BASE));
    assert_eq!(client.subscriptions().len(), 1);
}

#[test]
fn test_missing_table_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = write_files(dir.path(), TABLE, "").topic_table(dir.path().join("nope.json"));

    let result = Gateway::from_config(
        config,
        Arc::new(LocalBus::new("PIPE", 4)),
        Arc::new(LoopbackClient::new()),
    );
    assert!(matches!(result, Err(GatewayError::Table(TableError::Io(_)))));
}

#[test]
fn test_inbound_overflow_counted_and_reset() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = write_files(dir.path(), TABLE, "");
    let (gateway, _bus, _client) = rig(config);

    // not started: nothing drains the queue (depth 4)
    let queue = gateway.inbound_sender();
    let accepted = (0..6)
        .filter(|_| queue.offer(InboundMessage::from_raw("gnd/rate/cmd{}")))
        .count();
    assert_eq!(accepted, 4);
    assert_eq!(gateway.snapshot().inbound_dropped, 2);
    assert!(gateway.snapshot().format_summary().contains("queue_full=2"));

    gateway.reset_status();
    assert_eq!(gateway.snapshot().inbound_dropped, 0);
}
