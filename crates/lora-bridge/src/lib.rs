// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # LoRa Bridge - sensor node scheduler and LoRa -> MQTT gateway
//!
//! Two cooperating state machines share one compact radio format:
//!
//! - the **sensor node** samples telemetry, encodes it into a compact JSON
//!   packet, transmits it once and goes back to deep sleep;
//! - the **gateway** receives those packets, validates them, enriches them with
//!   the per-packet RSSI/SNR and publishes a canonical JSON reading to an MQTT
//!   broker under `<prefix>/<machine_id>`.
//!
//! ## Architecture
//!
//! ```text
//! +-------------------+   LoRa 868   +-------------------------------------+
//! |  Sensor node      | ~~~~~~~~~~~~ |  Gateway                            |
//! |  sample/encode    |  one-way,    |  rx thread --handoff(1)--> delivery |
//! |  transmit/sleep   |  no ack      |  decode/enrich        MQTT publish  |
//! +-------------------+              +------------------+------------------+
//!                                                       |
//!                                                       v
//!                                              +-----------------+
//!                                              |  MQTT broker    |
//!                                              +-----------------+
//! ```
//!
//! ## Modules
//!
//! - [`codec`] -- compact (radio) and canonical (broker) payloads
//! - [`radio`] -- Radio capability, SX127x driver, simulated and UDP radios
//! - [`node`] -- duty-cycled node scheduler and retained session
//! - [`gateway`] -- reception loop, handoff, delivery session, MQTT transport

#![deny(unsafe_code)]
#![warn(missing_docs)]

/// Compact and canonical reading codecs
pub mod codec;

/// Gateway bridge: reception, delivery, MQTT transport
pub mod gateway;

/// Sensor node scheduler
pub mod node;

/// Radio capability and drivers
pub mod radio;

pub use crate::codec::{CanonicalReading, CompactReading, DecodeError};
pub use crate::gateway::{Bridge, BridgeBuilder, BridgeHandle, ConnectionState, GatewayConfig};
pub use crate::node::{NodeConfig, NodeScheduler, NodeSession};
pub use crate::radio::{LinkQuality, Radio, RadioConfig, ReceivedPacket};

/// Version of the bridge crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
