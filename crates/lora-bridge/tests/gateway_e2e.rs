// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! End-to-end tests for the gateway bridge.
//!
//! A simulated radio medium feeds the real reception thread and delivery task;
//! a recording transport stands in for the broker.

use std::sync::Arc;
use std::time::Duration;

use lora_bridge::gateway::{
    BridgeBuilder, BridgeHandle, ConnectionState, FixedClock, MemoryTransport,
};
use lora_bridge::radio::{LinkQuality, SimAir};
use serde_json::json;

const NOW: u64 = 1_700_000_000;

const REFERENCE: &[u8] = br#"{"id":"lathe_01","t":67.3,"v":0.012,"r":3200}"#;

const LINK: LinkQuality = LinkQuality {
    rssi: -45,
    snr: 9.5,
};

fn start(air: &Arc<SimAir>, broker: &MemoryTransport) -> BridgeHandle {
    BridgeBuilder::new()
        .enable_stats(false)
        .reconnect_backoff(Duration::from_millis(20))
        .rx_poll_interval(Duration::from_millis(10))
        .clock(Arc::new(FixedClock::new(NOW)))
        .build()
        .unwrap()
        .start(air.radio(LINK), broker.clone())
        .unwrap()
}

async fn wait_until(what: &str, mut condition: impl FnMut() -> bool) {
    let reached = tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(reached.is_ok(), "timed out waiting for {}", what);
}

async fn wait_connected(handle: &BridgeHandle) {
    wait_until("upstream connection", || {
        handle.connection_state() == ConnectionState::Connected
    })
    .await;
}

#[tokio::test]
async fn test_reference_packet_end_to_end() {
    let air = SimAir::new();
    let broker = MemoryTransport::new();
    let handle = start(&air, &broker);
    wait_connected(&handle).await;

    air.inject(REFERENCE, LINK);
    wait_until("publish", || broker.published().len() == 1).await;

    let message = &broker.published()[0];
    assert_eq!(message.topic, "factory/lathe_01");

    let payload: serde_json::Value = serde_json::from_slice(&message.payload).unwrap();
    assert_eq!(
        payload,
        json!({
            "machine_id": "lathe_01",
            "timestamp": NOW,
            "temperature": 67.3,
            "vibration": 0.012,
            "rpm": 3200,
            "rssi": -45,
            "snr": 9.5
        })
    );

    handle.join().await;
}

#[tokio::test]
async fn test_missing_identity_never_published() {
    let air = SimAir::new();
    let broker = MemoryTransport::new();
    let handle = start(&air, &broker);
    let stats = handle.stats();
    wait_connected(&handle).await;

    air.inject(br#"{"t":67.3,"v":0.012,"r":3200}"#, LINK);
    wait_until("discard", || {
        stats.snapshot().discarded_missing_identity == 1
    })
    .await;

    air.inject(REFERENCE, LINK);
    wait_until("publish", || broker.published().len() == 1).await;

    assert_eq!(broker.publish_calls(), 1);
    assert_eq!(broker.published()[0].topic, "factory/lathe_01");
    handle.join().await;
}

#[tokio::test]
async fn test_bad_packets_do_not_stop_reception() {
    let air = SimAir::new();
    let broker = MemoryTransport::new();
    let handle = start(&air, &broker);
    let stats = handle.stats();
    wait_connected(&handle).await;

    air.inject(b"{\"id\":\"lathe_01\",\"t\":", LINK);
    air.inject(b"\x00\x01\x02", LINK);
    air.inject(br#"{"id":"lathe 01","t":1.0,"v":0.0,"r":0}"#, LINK);
    wait_until("discards", || stats.snapshot().discarded() == 3).await;

    air.inject(REFERENCE, LINK);
    wait_until("publish", || broker.published().len() == 1).await;

    let snap = stats.snapshot();
    assert_eq!(snap.discarded_malformed, 2);
    assert_eq!(snap.discarded_invalid_identity, 1);
    assert_eq!(snap.published, 1);
    handle.join().await;
}

#[tokio::test]
async fn test_readings_dropped_while_disconnected_then_resume() {
    let air = SimAir::new();
    let broker = MemoryTransport::unreachable();
    let handle = start(&air, &broker);
    let stats = handle.stats();
    wait_until("first connect attempt", || broker.connect_attempts() >= 1).await;

    air.inject(REFERENCE, LINK);
    air.inject(REFERENCE, LINK);
    wait_until("two drops", || {
        stats.snapshot().dropped_disconnected == 2
    })
    .await;
    assert_eq!(broker.publish_calls(), 0);

    broker.set_reachable(true);
    wait_connected(&handle).await;

    air.inject(REFERENCE, LINK);
    wait_until("publish", || broker.published().len() == 1).await;

    assert_eq!(broker.publish_calls(), 1);
    handle.join().await;
}

#[tokio::test]
async fn test_broker_restart_recovers() {
    let air = SimAir::new();
    let broker = MemoryTransport::new();
    let handle = start(&air, &broker);
    wait_connected(&handle).await;

    broker.drop_connection();
    wait_until("reconnect", || broker.connect_attempts() >= 2).await;
    wait_connected(&handle).await;

    air.inject(REFERENCE, LINK);
    wait_until("publish", || broker.published().len() == 1).await;
    handle.join().await;
}
