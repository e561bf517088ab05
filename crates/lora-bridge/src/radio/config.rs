// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! LoRa channel configuration
//!
//! Every node and the gateway sharing a channel must agree on frequency,
//! bandwidth, spreading factor, coding rate and sync word.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::RadioError;

/// Spreading Factor (SF7-SF12)
///
/// Higher SF = longer range but slower data rate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
#[repr(u8)]
pub enum SpreadingFactor {
    /// SF7: Fastest, shortest range
    Sf7 = 7,
    /// SF8
    Sf8 = 8,
    /// SF9
    #[default]
    Sf9 = 9,
    /// SF10
    Sf10 = 10,
    /// SF11
    Sf11 = 11,
    /// SF12: Slowest, longest range
    Sf12 = 12,
}

impl SpreadingFactor {
    /// Get register value
    pub const fn value(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for SpreadingFactor {
    type Error = RadioError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            7 => Ok(Self::Sf7),
            8 => Ok(Self::Sf8),
            9 => Ok(Self::Sf9),
            10 => Ok(Self::Sf10),
            11 => Ok(Self::Sf11),
            12 => Ok(Self::Sf12),
            other => Err(RadioError::InvalidParameter(format!(
                "spreading factor {} (expected 7-12)",
                other
            ))),
        }
    }
}

impl From<SpreadingFactor> for u8 {
    fn from(sf: SpreadingFactor) -> u8 {
        sf.value()
    }
}

/// Bandwidth
///
/// Serialized as kHz (`125`, `250`, `7.8`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "f32", into = "f32")]
#[repr(u8)]
pub enum Bandwidth {
    /// 7.8 kHz
    Bw7_8 = 0,
    /// 10.4 kHz
    Bw10_4 = 1,
    /// 15.6 kHz
    Bw15_6 = 2,
    /// 20.8 kHz
    Bw20_8 = 3,
    /// 31.25 kHz
    Bw31_25 = 4,
    /// 41.7 kHz
    Bw41_7 = 5,
    /// 62.5 kHz
    Bw62_5 = 6,
    /// 125 kHz (most common)
    #[default]
    Bw125 = 7,
    /// 250 kHz
    Bw250 = 8,
    /// 500 kHz
    Bw500 = 9,
}

impl Bandwidth {
    const ALL: [Bandwidth; 10] = [
        Self::Bw7_8,
        Self::Bw10_4,
        Self::Bw15_6,
        Self::Bw20_8,
        Self::Bw31_25,
        Self::Bw41_7,
        Self::Bw62_5,
        Self::Bw125,
        Self::Bw250,
        Self::Bw500,
    ];

    /// Get register value
    pub const fn value(self) -> u8 {
        self as u8
    }

    /// Get bandwidth in Hz
    pub const fn hz(self) -> u32 {
        match self {
            Self::Bw7_8 => 7_800,
            Self::Bw10_4 => 10_400,
            Self::Bw15_6 => 15_600,
            Self::Bw20_8 => 20_800,
            Self::Bw31_25 => 31_250,
            Self::Bw41_7 => 41_700,
            Self::Bw62_5 => 62_500,
            Self::Bw125 => 125_000,
            Self::Bw250 => 250_000,
            Self::Bw500 => 500_000,
        }
    }
}

impl TryFrom<f32> for Bandwidth {
    type Error = RadioError;

    fn try_from(khz: f32) -> Result<Self, Self::Error> {
        Self::ALL
            .into_iter()
            .find(|bw| (bw.hz() as f32 / 1000.0 - khz).abs() < 0.05)
            .ok_or_else(|| RadioError::InvalidParameter(format!("bandwidth {} kHz", khz)))
    }
}

impl From<Bandwidth> for f32 {
    fn from(bw: Bandwidth) -> f32 {
        bw.hz() as f32 / 1000.0
    }
}

/// Coding Rate (error correction)
///
/// Serialized as the denominator of 4/x (`5`..`8`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
#[repr(u8)]
pub enum CodingRate {
    /// 4/5 - least overhead
    #[default]
    Cr4_5 = 1,
    /// 4/6
    Cr4_6 = 2,
    /// 4/7
    Cr4_7 = 3,
    /// 4/8 - most error correction
    Cr4_8 = 4,
}

impl CodingRate {
    /// Get register value
    pub const fn value(self) -> u8 {
        self as u8
    }

    /// Denominator of the 4/x ratio
    pub const fn denominator(self) -> u8 {
        self as u8 + 4
    }
}

impl TryFrom<u8> for CodingRate {
    type Error = RadioError;

    fn try_from(denominator: u8) -> Result<Self, Self::Error> {
        match denominator {
            5 => Ok(Self::Cr4_5),
            6 => Ok(Self::Cr4_6),
            7 => Ok(Self::Cr4_7),
            8 => Ok(Self::Cr4_8),
            other => Err(RadioError::InvalidParameter(format!(
                "coding rate 4/{} (expected 4/5-4/8)",
                other
            ))),
        }
    }
}

impl From<CodingRate> for u8 {
    fn from(cr: CodingRate) -> u8 {
        cr.denominator()
    }
}

/// Sync word for private networks (LoRaWAN uses 0x34)
pub const PRIVATE_SYNC_WORD: u8 = 0x12;

/// LoRa channel configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RadioConfig {
    /// Center frequency in MHz (e.g., 868.0 for EU, 915.0 for US)
    pub frequency_mhz: f32,

    /// Spreading factor
    pub spreading_factor: SpreadingFactor,

    /// Bandwidth
    #[serde(rename = "bandwidth_khz")]
    pub bandwidth: Bandwidth,

    /// Coding rate
    pub coding_rate: CodingRate,

    /// Sync word
    pub sync_word: u8,

    /// TX power in dBm (2-20, hardware dependent)
    pub tx_power_dbm: i8,

    /// Preamble length (symbols)
    pub preamble_length: u16,

    /// Enable CRC
    pub crc_enabled: bool,

    /// Single-receive timeout in milliseconds
    pub rx_timeout_ms: u32,
}

impl RadioConfig {
    /// Create configuration from profile
    pub fn from_profile(profile: LoRaProfile, frequency_mhz: f32) -> Self {
        let (spreading_factor, bandwidth, coding_rate, tx_power_dbm, preamble_length) =
            match profile {
                LoRaProfile::Fast => (
                    SpreadingFactor::Sf7,
                    Bandwidth::Bw250,
                    CodingRate::Cr4_5,
                    14,
                    8,
                ),
                LoRaProfile::Balanced => (
                    SpreadingFactor::Sf9,
                    Bandwidth::Bw125,
                    CodingRate::Cr4_5,
                    14,
                    8,
                ),
                LoRaProfile::LongRange => (
                    SpreadingFactor::Sf12,
                    Bandwidth::Bw125,
                    CodingRate::Cr4_8,
                    20,
                    12,
                ),
            };

        Self {
            frequency_mhz,
            spreading_factor,
            bandwidth,
            coding_rate,
            sync_word: PRIVATE_SYNC_WORD,
            tx_power_dbm,
            preamble_length,
            crc_enabled: true,
            rx_timeout_ms: 1000,
        }
    }

    /// EU 868 MHz band (863-870 MHz)
    pub fn eu868(profile: LoRaProfile) -> Self {
        Self::from_profile(profile, 868.0)
    }

    /// US 915 MHz band (902-928 MHz)
    pub fn us915(profile: LoRaProfile) -> Self {
        Self::from_profile(profile, 915.0)
    }

    /// EU 433 MHz band (433.05-434.79 MHz)
    pub fn eu433(profile: LoRaProfile) -> Self {
        Self::from_profile(profile, 433.175)
    }

    /// Reject values the SX127x family cannot be programmed with
    pub fn validate(&self) -> Result<(), RadioError> {
        if !(137.0..=1020.0).contains(&self.frequency_mhz) {
            return Err(RadioError::InvalidParameter(format!(
                "frequency {} MHz outside 137-1020 MHz",
                self.frequency_mhz
            )));
        }
        if !(2..=20).contains(&self.tx_power_dbm) {
            return Err(RadioError::InvalidParameter(format!(
                "tx power {} dBm outside 2-20 dBm",
                self.tx_power_dbm
            )));
        }
        if self.preamble_length < 6 {
            return Err(RadioError::InvalidParameter(format!(
                "preamble length {} (minimum 6)",
                self.preamble_length
            )));
        }
        Ok(())
    }

    /// Calculate time on air for a packet (in milliseconds)
    ///
    /// Based on Semtech LoRa modem designer's guide formulas.
    pub fn time_on_air_ms(&self, payload_bytes: usize) -> u32 {
        let sf = self.spreading_factor.value() as u32;
        let bw = self.bandwidth.hz();
        let cr = self.coding_rate.value() as u32;
        let preamble = self.preamble_length as u32;
        let payload = payload_bytes as u32;

        // Symbol duration in microseconds = 2^SF * 1_000_000 / BW
        let t_sym_us = ((1u64 << sf) * 1_000_000) / (bw as u64);

        // n_preamble = preamble_length + 4.25 symbols (using 4 for integer math)
        let t_preamble_us = (preamble as u64 + 4) * t_sym_us;

        // LowDataRateOptimize for SF11/SF12
        let de = if sf >= 11 { 1u32 } else { 0 };
        let header_bits = 20u32;
        let crc_bits = if self.crc_enabled { 16u32 } else { 0 };

        // n_payload = 8 + max(ceil((8*PL - 4*SF + 28 + 16) / (4*(SF - 2*DE))) * (CR + 4), 0)
        let numerator = (8 * payload + header_bits + crc_bits).saturating_sub(4 * sf);
        let denominator = 4 * (sf.saturating_sub(2 * de));

        let n_payload = if denominator > 0 && numerator > 0 {
            8 + numerator.div_ceil(denominator) * (cr + 4)
        } else {
            8
        };

        let t_payload_us = n_payload as u64 * t_sym_us;

        ((t_preamble_us + t_payload_us) / 1000) as u32
    }

    /// Fraction of `interval` spent transmitting one packet of `payload_bytes`
    pub fn duty_cycle(&self, payload_bytes: usize, interval: Duration) -> f64 {
        let interval_ms = interval.as_millis();
        if interval_ms == 0 {
            return 1.0;
        }
        f64::from(self.time_on_air_ms(payload_bytes)) / interval_ms as f64
    }
}

impl Default for RadioConfig {
    fn default() -> Self {
        Self::eu868(LoRaProfile::Balanced)
    }
}

/// Pre-defined LoRa profiles
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoRaProfile {
    /// Fast: SF7, 250kHz - ~11 kbps, short range
    Fast,
    /// Balanced: SF9, 125kHz - ~3 kbps, medium range
    Balanced,
    /// Long Range: SF12, 125kHz - ~300 bps, maximum range
    LongRange,
}

impl std::str::FromStr for LoRaProfile {
    type Err = RadioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fast" => Ok(Self::Fast),
            "balanced" => Ok(Self::Balanced),
            "long-range" | "longrange" | "long_range" => Ok(Self::LongRange),
            other => Err(RadioError::InvalidParameter(format!("profile {:?}", other))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spreading_factor_values() {
        assert_eq!(SpreadingFactor::Sf7.value(), 7);
        assert_eq!(SpreadingFactor::Sf12.value(), 12);
        assert!(SpreadingFactor::try_from(6u8).is_err());
    }

    #[test]
    fn test_bandwidth_khz_conversion() {
        assert_eq!(Bandwidth::try_from(125.0f32).unwrap(), Bandwidth::Bw125);
        assert_eq!(Bandwidth::try_from(7.8f32).unwrap(), Bandwidth::Bw7_8);
        assert!(Bandwidth::try_from(100.0f32).is_err());
        assert_eq!(f32::from(Bandwidth::Bw250), 250.0);
    }

    #[test]
    fn test_coding_rate_denominator() {
        assert_eq!(CodingRate::try_from(5u8).unwrap(), CodingRate::Cr4_5);
        assert_eq!(CodingRate::Cr4_8.denominator(), 8);
        assert!(CodingRate::try_from(4u8).is_err());
    }

    #[test]
    fn test_profile_configs() {
        let fast = RadioConfig::from_profile(LoRaProfile::Fast, 868.0);
        assert_eq!(fast.spreading_factor, SpreadingFactor::Sf7);
        assert_eq!(fast.bandwidth, Bandwidth::Bw250);
        assert_eq!(fast.sync_word, PRIVATE_SYNC_WORD);

        let long = RadioConfig::from_profile(LoRaProfile::LongRange, 915.0);
        assert_eq!(long.spreading_factor, SpreadingFactor::Sf12);
        assert_eq!(long.tx_power_dbm, 20);
        assert!(long.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_out_of_band() {
        let config = RadioConfig {
            frequency_mhz: 2400.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_time_on_air() {
        let config = RadioConfig::eu868(LoRaProfile::Balanced);
        let toa = config.time_on_air_ms(50);

        // SF9, 125kHz, 50 bytes: preamble ~49 ms + ~80 payload symbols * 4.096 ms
        assert!(toa > 100 && toa < 600, "ToA was {} ms, expected 100-600", toa);

        let long = RadioConfig::eu868(LoRaProfile::LongRange);
        assert!(long.time_on_air_ms(50) > toa);
    }

    #[test]
    fn test_duty_cycle() {
        let config = RadioConfig::eu868(LoRaProfile::Fast);
        let dc = config.duty_cycle(48, Duration::from_secs(300));
        assert!(dc > 0.0 && dc < 0.01, "duty cycle {}", dc);
        assert_eq!(config.duty_cycle(48, Duration::ZERO), 1.0);
    }

    #[test]
    fn test_toml_roundtrip_uses_human_units() {
        let toml_src = r#"
            frequency_mhz = 915.0
            spreading_factor = 10
            bandwidth_khz = 250
            coding_rate = 6
            sync_word = 0x34
        "#;
        let config: RadioConfig = toml::from_str(toml_src).unwrap();
        assert_eq!(config.spreading_factor, SpreadingFactor::Sf10);
        assert_eq!(config.bandwidth, Bandwidth::Bw250);
        assert_eq!(config.coding_rate, CodingRate::Cr4_6);
        assert_eq!(config.sync_word, 0x34);
        assert_eq!(config.preamble_length, 8);
    }
}
