// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! MQTT transport (rumqttc)
//!
//! `connect` opens a fresh client, waits for CONNACK, then hands the event
//! loop to a driver task. The driver clears the connected flag on the first
//! connection error instead of letting rumqttc reconnect on its own, so the
//! delivery loop stays in charge of backoff and of dropping stale readings.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use rumqttc::{
    AsyncClient, ClientError, ConnectReturnCode, Event, EventLoop, MqttOptions, Packet, QoS,
};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::config::MqttConfig;
use super::transport::{PublishError, PublishTransport};

/// Outgoing requests buffered inside the client
const REQUEST_CAPACITY: usize = 10;

/// rumqttc-backed publish transport
pub struct MqttTransport {
    config: MqttConfig,
    client: Option<AsyncClient>,
    connected: Arc<AtomicBool>,
    driver: Option<JoinHandle<()>>,
}

impl MqttTransport {
    /// Transport for the configured broker. Nothing is opened until `connect`.
    pub fn new(config: MqttConfig) -> Self {
        Self {
            config,
            client: None,
            connected: Arc::new(AtomicBool::new(false)),
            driver: None,
        }
    }

    fn options(&self) -> MqttOptions {
        let mut options =
            MqttOptions::new(&self.config.client_id, &self.config.host, self.config.port);
        options.set_keep_alive(self.config.keep_alive());
        options.set_clean_session(true);
        options
    }

    fn teardown(&mut self) {
        self.connected.store(false, Ordering::Release);
        if let Some(client) = self.client.take() {
            let _ = client.try_disconnect();
        }
        if let Some(driver) = self.driver.take() {
            driver.abort();
        }
    }
}

async fn wait_for_connack(eventloop: &mut EventLoop) -> Result<(), PublishError> {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                return if ack.code == ConnectReturnCode::Success {
                    Ok(())
                } else {
                    Err(PublishError::Connect(format!(
                        "broker refused: {:?}",
                        ack.code
                    )))
                };
            }
            Ok(_) => {}
            Err(e) => return Err(PublishError::Connect(e.to_string())),
        }
    }
}

async fn drive(mut eventloop: EventLoop, connected: Arc<AtomicBool>) {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::Disconnect)) => {
                warn!("Broker closed the session");
                break;
            }
            Ok(Event::Incoming(Packet::PubAck(ack))) => {
                debug!(pkid = ack.pkid, "PUBACK");
            }
            Ok(_) => {}
            Err(e) => {
                warn!(error = %e, "MQTT connection lost");
                break;
            }
        }
    }
    connected.store(false, Ordering::Release);
}

#[async_trait]
impl PublishTransport for MqttTransport {
    async fn connect(&mut self) -> Result<(), PublishError> {
        self.teardown();

        let (client, mut eventloop) = AsyncClient::new(self.options(), REQUEST_CAPACITY);
        tokio::time::timeout(
            self.config.connect_timeout(),
            wait_for_connack(&mut eventloop),
        )
        .await
        .map_err(|_| PublishError::Connect("timed out waiting for CONNACK".into()))??;

        self.connected.store(true, Ordering::Release);
        self.driver = Some(tokio::spawn(drive(eventloop, Arc::clone(&self.connected))));
        self.client = Some(client);
        Ok(())
    }

    async fn publish(&mut self, topic: &str, payload: Vec<u8>) -> Result<(), PublishError> {
        if !self.is_connected() {
            return Err(PublishError::NotConnected);
        }
        let client = self.client.as_ref().ok_or(PublishError::NotConnected)?;

        // try_publish fails instead of waiting when the request queue is full
        client
            .try_publish(topic, QoS::AtLeastOnce, false, payload)
            .map_err(|e| match e {
                ClientError::TryRequest(_) => PublishError::Backpressure,
                other => PublishError::Client(other.to_string()),
            })
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }
}

impl Drop for MqttTransport {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_publish_before_connect() {
        let mut transport = MqttTransport::new(MqttConfig::default());
        assert!(!transport.is_connected());
        assert_eq!(
            transport.publish("factory/x", b"{}".to_vec()).await,
            Err(PublishError::NotConnected)
        );
    }

    #[tokio::test]
    async fn test_connect_to_closed_port_fails() {
        // Bind then release a port so nothing is listening on it
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();

        let mut transport = MqttTransport::new(MqttConfig {
            port,
            connect_timeout_secs: 2,
            ..MqttConfig::default()
        });

        let result = tokio::time::timeout(Duration::from_secs(5), transport.connect())
            .await
            .unwrap();
        assert!(matches!(result, Err(PublishError::Connect(_))));
        assert!(!transport.is_connected());
    }
}
