// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Upstream delivery loop
//!
//! ```text
//! Disconnected --connect--> Connecting --ok--> Connected
//!      ^                        |                  |
//!      +------ backoff <--------+ fail   publish error / link lost
//!      +-------------------------------------------+
//! ```
//!
//! The loop is the only writer of the session's connection state. Readings
//! still queued when the link drops are discarded: after a reconnect only
//! fresh readings go out.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use super::session::{ConnectionState, GatewaySession, PublishResult};
use super::stats::GatewayStats;
use super::transport::PublishTransport;
use crate::codec::{derive_topic, CanonicalReading};

/// How often a connected loop checks the transport for a silent drop
const LINK_CHECK_INTERVAL: Duration = Duration::from_millis(250);

enum ServeExit {
    Shutdown,
    LinkLost,
}

/// Delivery side of the gateway
pub struct DeliveryLoop<T: PublishTransport> {
    transport: T,
    rx: mpsc::Receiver<CanonicalReading>,
    session: Arc<GatewaySession>,
    stats: Arc<GatewayStats>,
    topic_prefix: String,
    backoff: Duration,
    shutdown: watch::Receiver<bool>,
}

impl<T: PublishTransport> DeliveryLoop<T> {
    /// Create a delivery loop
    pub fn new(
        transport: T,
        rx: mpsc::Receiver<CanonicalReading>,
        session: Arc<GatewaySession>,
        stats: Arc<GatewayStats>,
        topic_prefix: impl Into<String>,
        backoff: Duration,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            transport,
            rx,
            session,
            stats,
            topic_prefix: topic_prefix.into(),
            backoff,
            shutdown,
        }
    }

    fn shutdown_requested(&self) -> bool {
        *self.shutdown.borrow()
    }

    fn set_state(&self, state: ConnectionState) {
        if self.session.connection_state() != state {
            debug!(%state, "Upstream state");
            self.session.set_connection_state(state);
        }
    }

    /// Drop whatever is still queued from before the current connection
    fn discard_stale(&mut self) {
        let mut dropped = 0usize;
        while self.rx.try_recv().is_ok() {
            self.stats.record_dropped_disconnected();
            dropped += 1;
        }
        if dropped > 0 {
            debug!(dropped, "Discarded readings queued before reconnect");
        }
    }

    /// Run until shutdown. Returns the transport.
    pub async fn run(mut self) -> T {
        while !self.shutdown_requested() {
            self.set_state(ConnectionState::Connecting);

            match self.transport.connect().await {
                Ok(()) => {
                    self.stats.record_connect(true);
                    self.discard_stale();
                    self.set_state(ConnectionState::Connected);
                    info!(prefix = %self.topic_prefix, "Connected upstream");

                    match self.serve().await {
                        ServeExit::Shutdown => break,
                        ServeExit::LinkLost => {
                            self.set_state(ConnectionState::Disconnected);
                            self.discard_stale();
                            warn!(
                                backoff_ms = self.backoff.as_millis() as u64,
                                "Upstream link lost, reconnecting"
                            );
                        }
                    }
                }
                Err(e) => {
                    self.stats.record_connect(false);
                    self.set_state(ConnectionState::Disconnected);
                    warn!(
                        error = %e,
                        backoff_ms = self.backoff.as_millis() as u64,
                        "Upstream connect failed"
                    );
                }
            }

            let handle_gone = tokio::select! {
                _ = tokio::time::sleep(self.backoff) => false,
                changed = self.shutdown.changed() => changed.is_err(),
            };
            if handle_gone {
                break;
            }
        }

        self.set_state(ConnectionState::Disconnected);
        info!("Delivery loop stopped");
        self.transport
    }

    async fn serve(&mut self) -> ServeExit {
        let mut link_check = tokio::time::interval(LINK_CHECK_INTERVAL);
        link_check.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                changed = self.shutdown.changed() => {
                    if changed.is_err() || *self.shutdown.borrow() {
                        return ServeExit::Shutdown;
                    }
                }
                reading = self.rx.recv() => {
                    let Some(reading) = reading else {
                        return ServeExit::Shutdown;
                    };
                    if !self.deliver(&reading).await {
                        return ServeExit::LinkLost;
                    }
                }
                _ = link_check.tick() => {
                    if !self.transport.is_connected() {
                        return ServeExit::LinkLost;
                    }
                }
            }
        }
    }

    /// Publish one reading. `false` means the link must be re-established.
    async fn deliver(&mut self, reading: &CanonicalReading) -> bool {
        let topic = derive_topic(&self.topic_prefix, reading.machine_id());
        let payload = match reading.to_json() {
            Ok(payload) => payload,
            Err(e) => {
                warn!(topic = %topic, error = %e, "Reading not serializable, dropped");
                return true;
            }
        };

        match self.transport.publish(&topic, payload).await {
            Ok(()) => {
                self.stats.record_published();
                self.session.record_publish(PublishResult::Published);
                debug!(
                    topic = %topic,
                    rssi = reading.rssi(),
                    snr = reading.snr(),
                    "Published"
                );
                true
            }
            Err(e) => {
                self.stats.record_publish_failure();
                self.session.record_publish(PublishResult::Failed);
                warn!(topic = %topic, error = %e, "Publish failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::CompactReading;
    use crate::gateway::handoff::{handoff, Handoff, HandoffOutcome};
    use crate::gateway::memory::MemoryTransport;
    use crate::radio::LinkQuality;
    use tokio::task::JoinHandle;

    const BACKOFF: Duration = Duration::from_millis(20);

    fn reading(id: &str) -> CanonicalReading {
        CanonicalReading::enrich(
            &CompactReading::new(id, 67.3, 0.012, 3200),
            LinkQuality {
                rssi: -45,
                snr: 9.5,
            },
            1_700_000_000,
        )
    }

    struct Harness {
        handoff: Handoff,
        session: Arc<GatewaySession>,
        stats: Arc<GatewayStats>,
        shutdown: watch::Sender<bool>,
        task: JoinHandle<MemoryTransport>,
    }

    fn start(transport: MemoryTransport) -> Harness {
        let session = Arc::new(GatewaySession::new());
        let stats = Arc::new(GatewayStats::new());
        let (handoff, rx) = handoff(1, Arc::clone(&session));
        let (shutdown, shutdown_rx) = watch::channel(false);
        let delivery = DeliveryLoop::new(
            transport,
            rx,
            Arc::clone(&session),
            Arc::clone(&stats),
            "factory",
            BACKOFF,
            shutdown_rx,
        );
        Harness {
            handoff,
            session,
            stats,
            shutdown,
            task: tokio::spawn(delivery.run()),
        }
    }

    async fn wait_for(mut condition: impl FnMut() -> bool) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !condition() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("condition not reached in time");
    }

    #[tokio::test]
    async fn test_publishes_to_derived_topic() {
        let broker = MemoryTransport::new();
        let h = start(broker.clone());
        let session = Arc::clone(&h.session);
        wait_for(|| session.is_connected()).await;

        assert_eq!(h.handoff.offer(reading("lathe_01")), HandoffOutcome::Queued);
        wait_for(|| broker.published().len() == 1).await;

        let message = &broker.published()[0];
        assert_eq!(message.topic, "factory/lathe_01");
        assert_eq!(message.payload, reading("lathe_01").to_json().unwrap());
        assert_eq!(h.session.last_publish_result(), PublishResult::Published);

        h.shutdown.send(true).unwrap();
        h.task.await.unwrap();
        assert_eq!(h.session.connection_state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_reconnect_drops_then_resumes() {
        let broker = MemoryTransport::unreachable();
        let h = start(broker.clone());
        wait_for(|| broker.connect_attempts() >= 2).await;

        // Two readings while down: both dropped at the handoff
        assert_eq!(
            h.handoff.offer(reading("lathe_01")),
            HandoffOutcome::DroppedDisconnected
        );
        assert_eq!(
            h.handoff.offer(reading("lathe_01")),
            HandoffOutcome::DroppedDisconnected
        );

        broker.set_reachable(true);
        let session = Arc::clone(&h.session);
        wait_for(|| session.is_connected()).await;

        assert_eq!(h.handoff.offer(reading("lathe_01")), HandoffOutcome::Queued);
        wait_for(|| broker.published().len() == 1).await;

        assert_eq!(broker.publish_calls(), 1);
        assert!(h.stats.snapshot().connect_failures >= 1);

        h.shutdown.send(true).unwrap();
        h.task.await.unwrap();
    }

    #[tokio::test]
    async fn test_publish_failure_triggers_reconnect() {
        let broker = MemoryTransport::new();
        let h = start(broker.clone());
        let session = Arc::clone(&h.session);
        wait_for(|| session.is_connected()).await;

        broker.fail_next_publish();
        assert_eq!(h.handoff.offer(reading("a")), HandoffOutcome::Queued);
        wait_for(|| broker.connect_attempts() >= 2).await;
        wait_for(|| session.is_connected()).await;

        assert_eq!(h.handoff.offer(reading("b")), HandoffOutcome::Queued);
        wait_for(|| broker.published().len() == 1).await;
        assert_eq!(broker.published()[0].topic, "factory/b");

        let snap = h.stats.snapshot();
        assert_eq!(snap.publish_failures, 1);
        assert_eq!(snap.published, 1);
        assert_eq!(snap.connects, 2);

        h.shutdown.send(true).unwrap();
        h.task.await.unwrap();
    }

    #[tokio::test]
    async fn test_silent_link_loss_detected() {
        let broker = MemoryTransport::new();
        let h = start(broker.clone());
        let session = Arc::clone(&h.session);
        wait_for(|| session.is_connected()).await;

        broker.set_reachable(false);
        wait_for(|| !session.is_connected()).await;
        assert_eq!(
            h.handoff.offer(reading("a")),
            HandoffOutcome::DroppedDisconnected
        );

        broker.set_reachable(true);
        wait_for(|| session.is_connected()).await;

        h.shutdown.send(true).unwrap();
        h.task.await.unwrap();
        assert_eq!(broker.publish_calls(), 0);
    }

    #[tokio::test]
    async fn test_shutdown_while_backing_off() {
        let broker = MemoryTransport::unreachable();
        let h = start(broker.clone());
        wait_for(|| broker.connect_attempts() >= 1).await;

        h.shutdown.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(2), h.task)
            .await
            .unwrap()
            .unwrap();
    }
}
