// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! SX1276/SX1278 LoRa transceiver driver
//!
//! Platform-agnostic driver over a minimal SPI trait. Reception keeps the
//! modem in continuous RX so no packet is lost between `receive` calls; the
//! per-packet RSSI/SNR registers are read together with the FIFO, before the
//! RxDone flag is cleared and the next packet can overwrite them.

use std::thread;
use std::time::{Duration, Instant};

use super::config::{Bandwidth, CodingRate, RadioConfig, SpreadingFactor};
use super::{LinkQuality, Radio, RadioError, ReceivedPacket, LORA_MAX_PACKET};

/// SPI device abstraction
///
/// Platform implementations (ESP32, RP2040, Raspberry Pi spidev) provide this trait.
pub trait SpiDevice {
    /// Transfer data (full-duplex SPI)
    ///
    /// Writes `tx` bytes while simultaneously reading into `rx`.
    /// Both slices must have the same length.
    fn transfer(&mut self, tx: &[u8], rx: &mut [u8]) -> Result<(), RadioError>;

    /// Write bytes (ignoring read data)
    fn write(&mut self, data: &[u8]) -> Result<(), RadioError>;
}

// SX127x Register addresses
#[allow(dead_code)]
mod regs {
    pub const REG_FIFO: u8 = 0x00;
    pub const REG_OP_MODE: u8 = 0x01;
    pub const REG_FRF_MSB: u8 = 0x06;
    pub const REG_FRF_MID: u8 = 0x07;
    pub const REG_FRF_LSB: u8 = 0x08;
    pub const REG_PA_CONFIG: u8 = 0x09;
    pub const REG_FIFO_ADDR_PTR: u8 = 0x0D;
    pub const REG_FIFO_TX_BASE_ADDR: u8 = 0x0E;
    pub const REG_FIFO_RX_BASE_ADDR: u8 = 0x0F;
    pub const REG_FIFO_RX_CURRENT_ADDR: u8 = 0x10;
    pub const REG_IRQ_FLAGS: u8 = 0x12;
    pub const REG_RX_NB_BYTES: u8 = 0x13;
    pub const REG_PKT_SNR_VALUE: u8 = 0x19;
    pub const REG_PKT_RSSI_VALUE: u8 = 0x1A;
    pub const REG_MODEM_CONFIG_1: u8 = 0x1D;
    pub const REG_MODEM_CONFIG_2: u8 = 0x1E;
    pub const REG_PREAMBLE_MSB: u8 = 0x20;
    pub const REG_PREAMBLE_LSB: u8 = 0x21;
    pub const REG_PAYLOAD_LENGTH: u8 = 0x22;
    pub const REG_MODEM_CONFIG_3: u8 = 0x26;
    pub const REG_DETECTION_OPTIMIZE: u8 = 0x31;
    pub const REG_DETECTION_THRESHOLD: u8 = 0x37;
    pub const REG_SYNC_WORD: u8 = 0x39;
    pub const REG_DIO_MAPPING_1: u8 = 0x40;
    pub const REG_VERSION: u8 = 0x42;
    pub const REG_PA_DAC: u8 = 0x4D;
}

// Operating modes
#[allow(dead_code)]
mod modes {
    pub const MODE_SLEEP: u8 = 0x00;
    pub const MODE_STANDBY: u8 = 0x01;
    pub const MODE_TX: u8 = 0x03;
    pub const MODE_RX_CONTINUOUS: u8 = 0x05;
    pub const MODE_LORA: u8 = 0x80;
}

// IRQ flags
mod irq {
    pub const IRQ_TX_DONE: u8 = 0x08;
    pub const IRQ_CRC_ERROR: u8 = 0x20;
    pub const IRQ_RX_DONE: u8 = 0x40;
}

/// Expected silicon revision in `REG_VERSION`
const CHIP_VERSION: u8 = 0x12;

/// Delay between IRQ register polls
const POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Margin added to the computed time on air before a TX is declared stuck
const TX_TIMEOUT_MARGIN: Duration = Duration::from_millis(250);

/// SX1276/SX1278 LoRa transceiver driver
pub struct Sx127x<SPI: SpiDevice> {
    spi: SPI,
    /// Current operating mode
    mode: u8,
    /// Frequency offset correction (in Hz, for crystal calibration)
    freq_offset: i32,
    /// Channel configuration applied by `init`
    config: Option<RadioConfig>,
}

impl<SPI: SpiDevice> Sx127x<SPI> {
    /// Create a new SX127x driver
    pub fn new(spi: SPI) -> Self {
        Self {
            spi,
            mode: modes::MODE_SLEEP,
            freq_offset: 0,
            config: None,
        }
    }

    /// Check chip presence and enter sleep mode
    ///
    /// Note: Hardware reset via RST pin should be done by platform code.
    pub fn reset(&mut self) -> Result<(), RadioError> {
        self.set_mode_sleep()?;

        let version = self.read_register(regs::REG_VERSION)?;
        if version != CHIP_VERSION {
            return Err(RadioError::NotResponding);
        }

        Ok(())
    }

    /// Set sleep mode (lowest power)
    pub fn set_mode_sleep(&mut self) -> Result<(), RadioError> {
        self.set_mode(modes::MODE_SLEEP)
    }

    /// Set standby mode
    pub fn set_mode_standby(&mut self) -> Result<(), RadioError> {
        self.set_mode(modes::MODE_STANDBY)
    }

    fn set_mode(&mut self, mode: u8) -> Result<(), RadioError> {
        self.write_register(regs::REG_OP_MODE, modes::MODE_LORA | mode)?;
        self.mode = mode;
        Ok(())
    }

    /// Set carrier frequency
    pub fn set_frequency(&mut self, center_mhz: f32) -> Result<(), RadioError> {
        // F_RF = (frf * 32MHz) / 2^19
        let rf_hz = (center_mhz as f64 * 1_000_000.0) as i64 + self.freq_offset as i64;
        let frf = ((rf_hz as u64) << 19) / 32_000_000;

        self.write_register(regs::REG_FRF_MSB, ((frf >> 16) & 0xFF) as u8)?;
        self.write_register(regs::REG_FRF_MID, ((frf >> 8) & 0xFF) as u8)?;
        self.write_register(regs::REG_FRF_LSB, (frf & 0xFF) as u8)?;

        Ok(())
    }

    /// Set spreading factor
    pub fn set_spreading_factor(&mut self, sf: SpreadingFactor) -> Result<(), RadioError> {
        let sf_val = sf.value();

        let config2 = self.read_register(regs::REG_MODEM_CONFIG_2)?;
        self.write_register(regs::REG_MODEM_CONFIG_2, (config2 & 0x0F) | (sf_val << 4))?;

        self.write_register(regs::REG_DETECTION_OPTIMIZE, 0xC3)?;
        self.write_register(regs::REG_DETECTION_THRESHOLD, 0x0A)?;

        // LowDataRateOptimize for SF11/SF12
        let mut config3 = self.read_register(regs::REG_MODEM_CONFIG_3)?;
        if sf_val >= 11 {
            config3 |= 0x08;
        } else {
            config3 &= !0x08;
        }
        self.write_register(regs::REG_MODEM_CONFIG_3, config3)?;

        Ok(())
    }

    /// Set bandwidth
    pub fn set_bandwidth(&mut self, bw: Bandwidth) -> Result<(), RadioError> {
        let config1 = self.read_register(regs::REG_MODEM_CONFIG_1)?;
        self.write_register(regs::REG_MODEM_CONFIG_1, (config1 & 0x0F) | (bw.value() << 4))
    }

    /// Set coding rate
    pub fn set_coding_rate(&mut self, cr: CodingRate) -> Result<(), RadioError> {
        let config1 = self.read_register(regs::REG_MODEM_CONFIG_1)?;
        self.write_register(regs::REG_MODEM_CONFIG_1, (config1 & 0xF1) | (cr.value() << 1))
    }

    /// Set TX power (2-20 dBm)
    pub fn set_tx_power(&mut self, power_dbm: i8) -> Result<(), RadioError> {
        let power = power_dbm.clamp(2, 20);

        if power > 17 {
            // PA_BOOST with +20dBm
            self.write_register(regs::REG_PA_DAC, 0x87)?;
            self.write_register(regs::REG_PA_CONFIG, 0x80 | ((power - 5) as u8))
        } else {
            self.write_register(regs::REG_PA_DAC, 0x84)?;
            self.write_register(regs::REG_PA_CONFIG, 0x80 | ((power - 2) as u8))
        }
    }

    /// Set preamble length
    pub fn set_preamble_length(&mut self, length: u16) -> Result<(), RadioError> {
        self.write_register(regs::REG_PREAMBLE_MSB, (length >> 8) as u8)?;
        self.write_register(regs::REG_PREAMBLE_LSB, (length & 0xFF) as u8)
    }

    /// Enable/disable CRC
    pub fn set_crc_enabled(&mut self, enabled: bool) -> Result<(), RadioError> {
        let mut config2 = self.read_register(regs::REG_MODEM_CONFIG_2)?;
        if enabled {
            config2 |= 0x04;
        } else {
            config2 &= !0x04;
        }
        self.write_register(regs::REG_MODEM_CONFIG_2, config2)
    }

    /// Set sync word (0x12 for private networks, 0x34 for LoRaWAN)
    pub fn set_sync_word(&mut self, sync_word: u8) -> Result<(), RadioError> {
        self.write_register(regs::REG_SYNC_WORD, sync_word)
    }

    /// Set frequency offset for crystal calibration
    pub fn set_frequency_offset(&mut self, offset_hz: i32) {
        self.freq_offset = offset_hz;
    }

    /// Enter continuous receive (no-op if already receiving)
    fn start_rx(&mut self) -> Result<(), RadioError> {
        if self.mode == modes::MODE_RX_CONTINUOUS {
            return Ok(());
        }
        self.set_mode_standby()?;

        // DIO0 -> RxDone
        self.write_register(regs::REG_DIO_MAPPING_1, 0x00)?;
        self.write_register(regs::REG_FIFO_RX_BASE_ADDR, 0x00)?;
        self.write_register(regs::REG_FIFO_ADDR_PTR, 0x00)?;
        self.write_register(regs::REG_IRQ_FLAGS, 0xFF)?;

        self.set_mode(modes::MODE_RX_CONTINUOUS)
    }

    /// Read one completed packet and its link quality
    fn read_packet(&mut self) -> Result<ReceivedPacket, RadioError> {
        let len = self.read_register(regs::REG_RX_NB_BYTES)? as usize;
        let fifo_addr = self.read_register(regs::REG_FIFO_RX_CURRENT_ADDR)?;
        self.write_register(regs::REG_FIFO_ADDR_PTR, fifo_addr)?;

        let mut payload = vec![0u8; len];
        for byte in payload.iter_mut() {
            *byte = self.read_register(regs::REG_FIFO)?;
        }

        let link = self.read_packet_link()?;
        Ok(ReceivedPacket { payload, link })
    }

    /// RSSI/SNR of the packet currently in the FIFO
    fn read_packet_link(&mut self) -> Result<LinkQuality, RadioError> {
        // SNR register is two's complement in quarter dB
        let snr = (self.read_register(regs::REG_PKT_SNR_VALUE)? as i8) as f32 / 4.0;
        let raw_rssi = self.read_register(regs::REG_PKT_RSSI_VALUE)? as i16;

        let base = if self.is_high_frequency() { -157 } else { -164 };
        let mut rssi = base + raw_rssi;
        if snr < 0.0 {
            rssi += snr.floor() as i16;
        }

        Ok(LinkQuality { rssi, snr })
    }

    fn is_high_frequency(&self) -> bool {
        self.config
            .as_ref()
            .map_or(true, |c| c.frequency_mhz >= 779.0)
    }

    fn tx_timeout(&self, len: usize) -> Duration {
        let toa = self
            .config
            .as_ref()
            .map_or(0, |c| c.time_on_air_ms(len));
        Duration::from_millis(toa as u64) + TX_TIMEOUT_MARGIN
    }

    // ---- Low-level register access ----

    fn read_register(&mut self, addr: u8) -> Result<u8, RadioError> {
        let tx = [addr & 0x7F, 0x00]; // Read: MSB = 0
        let mut rx = [0u8; 2];
        self.spi.transfer(&tx, &mut rx)?;
        Ok(rx[1])
    }

    fn write_register(&mut self, addr: u8, value: u8) -> Result<(), RadioError> {
        let tx = [addr | 0x80, value]; // Write: MSB = 1
        self.spi.write(&tx)
    }
}

impl<SPI: SpiDevice> Radio for Sx127x<SPI> {
    fn init(&mut self, config: &RadioConfig) -> Result<(), RadioError> {
        config.validate()?;
        self.config = None;

        self.reset()?;
        self.set_frequency(config.frequency_mhz)?;
        self.set_spreading_factor(config.spreading_factor)?;
        self.set_bandwidth(config.bandwidth)?;
        self.set_coding_rate(config.coding_rate)?;
        self.set_tx_power(config.tx_power_dbm)?;
        self.set_preamble_length(config.preamble_length)?;
        self.set_crc_enabled(config.crc_enabled)?;
        self.set_sync_word(config.sync_word)?;
        self.set_mode_standby()?;

        self.config = Some(config.clone());
        Ok(())
    }

    fn send(&mut self, data: &[u8]) -> Result<(), RadioError> {
        if self.config.is_none() {
            return Err(RadioError::NotInitialized);
        }
        if data.len() > LORA_MAX_PACKET {
            return Err(RadioError::BufferTooSmall(data.len()));
        }

        self.set_mode_standby()?;

        // DIO0 -> TxDone
        self.write_register(regs::REG_DIO_MAPPING_1, 0x40)?;
        self.write_register(regs::REG_FIFO_TX_BASE_ADDR, 0x00)?;
        self.write_register(regs::REG_FIFO_ADDR_PTR, 0x00)?;

        for &byte in data {
            self.write_register(regs::REG_FIFO, byte)?;
        }
        self.write_register(regs::REG_PAYLOAD_LENGTH, data.len() as u8)?;
        self.write_register(regs::REG_IRQ_FLAGS, 0xFF)?;

        self.set_mode(modes::MODE_TX)?;

        let deadline = Instant::now() + self.tx_timeout(data.len());
        loop {
            let flags = self.read_register(regs::REG_IRQ_FLAGS)?;
            if flags & irq::IRQ_TX_DONE != 0 {
                break;
            }
            if Instant::now() >= deadline {
                self.set_mode_standby()?;
                return Err(RadioError::Timeout);
            }
            thread::sleep(POLL_INTERVAL);
        }

        self.write_register(regs::REG_IRQ_FLAGS, irq::IRQ_TX_DONE)?;
        self.set_mode_standby()
    }

    fn receive(&mut self, timeout: Duration) -> Result<Option<ReceivedPacket>, RadioError> {
        if self.config.is_none() {
            return Err(RadioError::NotInitialized);
        }
        self.start_rx()?;

        let deadline = Instant::now() + timeout;
        loop {
            let flags = self.read_register(regs::REG_IRQ_FLAGS)?;

            if flags & irq::IRQ_RX_DONE != 0 {
                if flags & irq::IRQ_CRC_ERROR != 0 {
                    self.write_register(regs::REG_IRQ_FLAGS, irq::IRQ_CRC_ERROR | irq::IRQ_RX_DONE)?;
                    return Err(RadioError::InvalidData);
                }

                let packet = self.read_packet()?;
                self.write_register(regs::REG_IRQ_FLAGS, irq::IRQ_RX_DONE)?;
                return Ok(Some(packet));
            }

            if Instant::now() >= deadline {
                return Ok(None);
            }
            thread::sleep(POLL_INTERVAL);
        }
    }

    fn sleep(&mut self) -> Result<(), RadioError> {
        self.set_mode_sleep()
    }
}
