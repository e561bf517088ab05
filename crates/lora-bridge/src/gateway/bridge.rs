// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! LoRa -> MQTT bridge
//!
//! Wires the reception thread, the handoff and the delivery task together
//! and hands back a [`BridgeHandle`] to observe and stop them.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::clock::{Clock, SystemClock};
use super::config::{ConfigError, GatewayConfig};
use super::delivery::DeliveryLoop;
use super::handoff::handoff;
use super::receiver::PacketReceiver;
use super::session::{ConnectionState, GatewaySession, PublishResult};
use super::stats::GatewayStats;
use super::transport::PublishTransport;
use crate::radio::{Radio, RadioConfig, RadioError};

/// Bridge errors
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Configuration rejected
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Gateway radio could not be brought up
    #[error("radio error: {0}")]
    Radio(#[from] RadioError),

    /// Reception thread could not be spawned
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// `start` called outside a Tokio runtime
    #[error("no Tokio runtime: {0}")]
    Runtime(String),
}

/// Gateway bridge, ready to start
pub struct Bridge {
    config: GatewayConfig,
    clock: Arc<dyn Clock>,
    stats: Arc<GatewayStats>,
    session: Arc<GatewaySession>,
    reconnect_backoff: Duration,
    rx_poll: Duration,
}

impl Bridge {
    /// Create a bridge from a configuration
    pub fn new(config: GatewayConfig) -> Result<Self, BridgeError> {
        BridgeBuilder::new().config(config).build()
    }

    /// Effective configuration
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Get statistics reference
    pub fn stats(&self) -> Arc<GatewayStats> {
        Arc::clone(&self.stats)
    }

    /// Get session reference
    pub fn session(&self) -> Arc<GatewaySession> {
        Arc::clone(&self.session)
    }

    /// Bring the radio up and start reception and delivery
    ///
    /// Must be called from within a Tokio runtime. Reception runs on its own
    /// thread (`lora-rx`) because radio receives block.
    pub fn start<R, T>(self, mut radio: R, transport: T) -> Result<BridgeHandle, BridgeError>
    where
        R: Radio + Send + 'static,
        T: PublishTransport + 'static,
    {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| BridgeError::Runtime(e.to_string()))?;

        radio.init(&self.config.radio)?;

        let (handoff, rx) = handoff(self.config.gateway.handoff_capacity, self.session());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let running = Arc::new(AtomicBool::new(true));

        let receiver = PacketReceiver::new(handoff, Arc::clone(&self.clock), self.stats());
        let rx_running = Arc::clone(&running);
        let rx_poll = self.rx_poll;
        let rx_thread = thread::Builder::new()
            .name("lora-rx".into())
            .spawn(move || receiver.run(&mut radio, &rx_running, rx_poll))?;

        let delivery = DeliveryLoop::new(
            transport,
            rx,
            self.session(),
            self.stats(),
            self.config.gateway.topic_prefix.clone(),
            self.reconnect_backoff,
            shutdown_rx.clone(),
        );
        let delivery_task = runtime.spawn(async move {
            drop(delivery.run().await);
        });

        if self.config.gateway.enable_stats {
            let interval = Duration::from_secs(self.config.gateway.stats_interval_secs);
            runtime.spawn(log_stats(self.stats(), interval, shutdown_rx));
        }

        info!(
            name = %self.config.gateway.name,
            prefix = %self.config.gateway.topic_prefix,
            broker = %format!("{}:{}", self.config.mqtt.host, self.config.mqtt.port),
            frequency_mhz = self.config.radio.frequency_mhz,
            sf = self.config.radio.spreading_factor.value(),
            "Gateway started"
        );

        Ok(BridgeHandle {
            running,
            shutdown: shutdown_tx,
            session: self.session,
            stats: self.stats,
            rx_thread: Some(rx_thread),
            delivery: Some(delivery_task),
        })
    }
}

async fn log_stats(
    stats: Arc<GatewayStats>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(interval);
    // First tick fires immediately
    ticker.tick().await;
    loop {
        tokio::select! {
            _ = ticker.tick() => info!("{}", stats.format_summary()),
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
}

/// Handle to a running bridge
pub struct BridgeHandle {
    running: Arc<AtomicBool>,
    shutdown: watch::Sender<bool>,
    session: Arc<GatewaySession>,
    stats: Arc<GatewayStats>,
    rx_thread: Option<thread::JoinHandle<()>>,
    delivery: Option<JoinHandle<()>>,
}

impl BridgeHandle {
    /// Check if bridge is running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Upstream connection state
    pub fn connection_state(&self) -> ConnectionState {
        self.session.connection_state()
    }

    /// Result of the last publish
    pub fn last_publish_result(&self) -> PublishResult {
        self.session.last_publish_result()
    }

    /// Get statistics reference
    pub fn stats(&self) -> Arc<GatewayStats> {
        Arc::clone(&self.stats)
    }

    /// Signal bridge to stop
    pub fn stop(&self) {
        self.running.store(false, Ordering::Relaxed);
        self.shutdown.send_replace(true);
    }

    /// Stop and wait for reception and delivery to finish
    pub async fn join(mut self) {
        self.stop();
        if let Some(delivery) = self.delivery.take() {
            if let Err(e) = delivery.await {
                warn!(error = %e, "Delivery task ended abnormally");
            }
        }
        if let Some(rx_thread) = self.rx_thread.take() {
            match tokio::task::spawn_blocking(move || rx_thread.join()).await {
                Ok(Ok(())) => {}
                _ => warn!("Reception thread ended abnormally"),
            }
        }
        info!("Gateway stopped");
    }
}

impl Drop for BridgeHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Bridge builder for easier configuration
pub struct BridgeBuilder {
    config: GatewayConfig,
    clock: Option<Arc<dyn Clock>>,
    reconnect_backoff: Option<Duration>,
    rx_poll: Option<Duration>,
}

impl BridgeBuilder {
    /// Create a new builder with default config
    pub fn new() -> Self {
        Self {
            config: GatewayConfig::default(),
            clock: None,
            reconnect_backoff: None,
            rx_poll: None,
        }
    }

    /// Replace the whole configuration
    pub fn config(mut self, config: GatewayConfig) -> Self {
        self.config = config;
        self
    }

    /// Set topic prefix
    pub fn topic_prefix(mut self, prefix: &str) -> Self {
        self.config.gateway.topic_prefix = prefix.to_string();
        self
    }

    /// Set handoff capacity
    pub fn handoff_capacity(mut self, capacity: usize) -> Self {
        self.config.gateway.handoff_capacity = capacity;
        self
    }

    /// Set radio channel
    pub fn radio(mut self, radio: RadioConfig) -> Self {
        self.config.radio = radio;
        self
    }

    /// Enable or disable stats
    pub fn enable_stats(mut self, enable: bool) -> Self {
        self.config.gateway.enable_stats = enable;
        self
    }

    /// Reconnect backoff, overriding `reconnect_backoff_secs`
    pub fn reconnect_backoff(mut self, backoff: Duration) -> Self {
        self.reconnect_backoff = Some(backoff);
        self
    }

    /// Radio poll interval, overriding `rx_timeout_ms`
    pub fn rx_poll_interval(mut self, poll: Duration) -> Self {
        self.rx_poll = Some(poll);
        self
    }

    /// Timestamp source (defaults to the system clock)
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Build the bridge
    pub fn build(self) -> Result<Bridge, BridgeError> {
        self.config.validate()?;

        let reconnect_backoff = self
            .reconnect_backoff
            .unwrap_or_else(|| self.config.mqtt.reconnect_backoff());
        if reconnect_backoff.is_zero() {
            return Err(
                ConfigError::Invalid("reconnect backoff must be greater than 0".into()).into(),
            );
        }
        let rx_poll = self
            .rx_poll
            .unwrap_or_else(|| Duration::from_millis(u64::from(self.config.radio.rx_timeout_ms)));

        Ok(Bridge {
            config: self.config,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            stats: Arc::new(GatewayStats::new()),
            session: Arc::new(GatewaySession::new()),
            reconnect_backoff,
            rx_poll,
        })
    }
}

impl Default for BridgeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::clock::FixedClock;
    use crate::gateway::memory::MemoryTransport;
    use crate::radio::{LinkQuality, SimAir};

    const LINK: LinkQuality = LinkQuality {
        rssi: -45,
        snr: 9.5,
    };

    fn builder() -> BridgeBuilder {
        BridgeBuilder::new()
            .enable_stats(false)
            .reconnect_backoff(Duration::from_millis(20))
            .rx_poll_interval(Duration::from_millis(10))
            .clock(Arc::new(FixedClock::new(1_700_000_000)))
    }

    #[test]
    fn test_bridge_creation() {
        let bridge = Bridge::new(GatewayConfig::default()).unwrap();
        assert_eq!(bridge.config().gateway.topic_prefix, "factory");
        assert_eq!(
            bridge.session().connection_state(),
            ConnectionState::Disconnected
        );
    }

    #[test]
    fn test_builder_validates() {
        assert!(matches!(
            BridgeBuilder::new().topic_prefix("").build(),
            Err(BridgeError::Config(ConfigError::Invalid(_)))
        ));
        assert!(matches!(
            BridgeBuilder::new().handoff_capacity(0).build(),
            Err(BridgeError::Config(ConfigError::Invalid(_)))
        ));
        assert!(matches!(
            BridgeBuilder::new().reconnect_backoff(Duration::ZERO).build(),
            Err(BridgeError::Config(ConfigError::Invalid(_)))
        ));
    }

    #[test]
    fn test_start_requires_runtime() {
        let air = SimAir::new();
        let bridge = builder().build().unwrap();
        let result = bridge.start(air.radio(LINK), MemoryTransport::new());
        assert!(matches!(result, Err(BridgeError::Runtime(_))));
    }

    #[tokio::test]
    async fn test_radio_init_failure_reported() {
        let air = SimAir::new();
        let bridge = builder().build().unwrap();
        let result = bridge.start(air.radio(LINK).with_init_failure(), MemoryTransport::new());
        assert!(matches!(
            result,
            Err(BridgeError::Radio(RadioError::NotResponding))
        ));
    }

    #[tokio::test]
    async fn test_start_publish_stop() {
        let air = SimAir::new();
        let broker = MemoryTransport::new();
        let handle = builder()
            .build()
            .unwrap()
            .start(air.radio(LINK), broker.clone())
            .unwrap();
        assert!(handle.is_running());

        tokio::time::timeout(Duration::from_secs(5), async {
            while handle.connection_state() != ConnectionState::Connected {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        air.inject(br#"{"id":"lathe_01","t":67.3,"v":0.012,"r":3200}"#, LINK);
        tokio::time::timeout(Duration::from_secs(5), async {
            while broker.published().is_empty() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        assert_eq!(broker.published()[0].topic, "factory/lathe_01");
        assert_eq!(handle.last_publish_result(), PublishResult::Published);
        let stats = handle.stats();

        handle.join().await;
        assert_eq!(stats.snapshot().published, 1);
    }
}
