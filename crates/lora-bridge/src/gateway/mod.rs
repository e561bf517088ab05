// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! LoRa -> MQTT gateway
//!
//! Bridges compact readings from LoRa sensor nodes to an MQTT broker.
//!
//! ## Architecture
//!
//! ```text
//!                                    +-----------------+
//!                                    |   MQTT broker   |
//!                                    +--------+--------+
//!                                             ^
//!                                             | publish <prefix>/<machine_id>
//! +-----------------+              +----------+----------+
//! |  Sensor node    |   LoRa 868   |  Gateway            |
//! |  (ESP32 + LoRa) | ~~~~~~~~~~~~ |  lora-rx -> handoff |
//! |                 |              |        -> delivery  |
//! +-----------------+              +---------------------+
//! ```
//!
//! ## Features
//!
//! - Reception on a dedicated thread, decode + enrich with per-packet RSSI/SNR
//! - Single-slot handoff: readings are dropped, never queued, while upstream
//!   is down or busy
//! - Delivery with fixed-backoff reconnect over any [`PublishTransport`]
//! - Statistics monitoring

mod bridge;
mod clock;
mod config;
mod delivery;
mod handoff;
mod memory;
mod mqtt;
mod receiver;
mod session;
mod stats;
mod transport;

pub use bridge::{Bridge, BridgeBuilder, BridgeError, BridgeHandle};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{ConfigError, GatewayConfig, GatewaySettings, MqttConfig};
pub use delivery::DeliveryLoop;
pub use handoff::{handoff, Handoff, HandoffOutcome};
pub use memory::{MemoryTransport, PublishedMessage};
pub use mqtt::MqttTransport;
pub use receiver::{PacketReceiver, ReceptionOutcome};
pub use session::{ConnectionState, GatewaySession, PublishResult};
pub use stats::{GatewayStats, StatsSnapshot};
pub use transport::{PublishError, PublishTransport};
