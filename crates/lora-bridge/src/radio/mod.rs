// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Radio capability
//!
//! Both the node and the gateway talk to the air through the [`Radio`] trait:
//!
//! - [`Sx127x`] -- SX1276/SX1278 register driver over a platform SPI bus
//! - [`SimAir`] / [`SimRadio`] -- in-process shared medium (tests, demos)
//! - [`UdpRadio`] -- datagram radio for bench setups on a LAN
//!
//! ## Design Principles
//!
//! - **Blocking I/O** with explicit timeouts (embedded friendly)
//! - **Link quality travels with the packet**: RSSI/SNR are captured in the
//!   same step as the payload, never read back later from shared registers
//! - **No acknowledgment**: `send` only reports that the hardware accepted
//!   the packet

use std::time::Duration;

use thiserror::Error;

mod config;
mod sim;
mod sx127x;
mod udp;

pub use config::{Bandwidth, CodingRate, LoRaProfile, RadioConfig, SpreadingFactor};
pub use sim::{SimAir, SimRadio};
pub use sx127x::{SpiDevice, Sx127x};
pub use udp::UdpRadio;

/// Maximum LoRa packet size (hardware limit)
pub const LORA_MAX_PACKET: usize = 255;

/// Radio errors
#[derive(Debug, Error)]
pub enum RadioError {
    /// Transceiver did not answer or reported an unexpected chip version
    #[error("radio not responding")]
    NotResponding,

    /// Bus or socket failure
    #[error("radio transport error: {0}")]
    Transport(String),

    /// Packet does not fit the hardware FIFO or the caller's buffer
    #[error("packet of {0} bytes does not fit")]
    BufferTooSmall(usize),

    /// Operation did not complete in time
    #[error("radio operation timed out")]
    Timeout,

    /// Packet received with CRC error or bad framing
    #[error("invalid packet received")]
    InvalidData,

    /// Configuration value outside the supported range
    #[error("invalid radio parameter: {0}")]
    InvalidParameter(String),

    /// Radio used before `init`
    #[error("radio not initialized")]
    NotInitialized,
}

/// Per-packet link quality measured by the receiver
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinkQuality {
    /// Received signal strength (dBm)
    pub rssi: i16,
    /// Signal-to-noise ratio (dB)
    pub snr: f32,
}

/// A packet together with the link quality it was received with
#[derive(Debug, Clone, PartialEq)]
pub struct ReceivedPacket {
    /// Raw payload bytes
    pub payload: Vec<u8>,
    /// Link quality of this packet
    pub link: LinkQuality,
}

/// Radio capability shared by nodes and gateways
pub trait Radio {
    /// Bring the transceiver up and apply the channel configuration.
    ///
    /// Failure means the hardware is not usable in its current state.
    fn init(&mut self, config: &RadioConfig) -> Result<(), RadioError>;

    /// Transmit one packet. Best effort, no acknowledgment.
    fn send(&mut self, data: &[u8]) -> Result<(), RadioError>;

    /// Wait up to `timeout` for one packet.
    ///
    /// Returns `Ok(None)` when nothing arrived in time.
    fn receive(&mut self, timeout: Duration) -> Result<Option<ReceivedPacket>, RadioError>;

    /// Put the transceiver in its lowest power mode
    fn sleep(&mut self) -> Result<(), RadioError>;

    /// Largest payload accepted by `send`
    fn max_payload(&self) -> usize {
        LORA_MAX_PACKET
    }
}

impl<R: Radio + ?Sized> Radio for Box<R> {
    fn init(&mut self, config: &RadioConfig) -> Result<(), RadioError> {
        (**self).init(config)
    }

    fn send(&mut self, data: &[u8]) -> Result<(), RadioError> {
        (**self).send(data)
    }

    fn receive(&mut self, timeout: Duration) -> Result<Option<ReceivedPacket>, RadioError> {
        (**self).receive(timeout)
    }

    fn sleep(&mut self) -> Result<(), RadioError> {
        (**self).sleep()
    }

    fn max_payload(&self) -> usize {
        (**self).max_payload()
    }
}
