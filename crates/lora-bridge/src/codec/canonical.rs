// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Canonical broker payload

use serde::{Deserialize, Serialize};

use super::compact::CompactReading;
use crate::radio::LinkQuality;

/// Reading as delivered to the broker
///
/// Built once by [`CanonicalReading::enrich`] and never modified afterwards:
/// fields are private and only exposed through accessors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalReading {
    machine_id: String,
    timestamp: u64,
    temperature: f64,
    vibration: f64,
    rpm: u32,
    rssi: i16,
    snr: f32,
}

impl CanonicalReading {
    /// Combine a validated compact reading with the link quality of the packet
    /// that carried it. `timestamp` is the gateway clock in seconds.
    pub fn enrich(reading: &CompactReading, link: LinkQuality, timestamp: u64) -> Self {
        Self {
            machine_id: reading.identity.clone(),
            timestamp,
            temperature: reading.temperature,
            vibration: reading.vibration,
            rpm: reading.rpm,
            rssi: link.rssi,
            snr: link.snr,
        }
    }

    /// Machine (node) identity
    pub fn machine_id(&self) -> &str {
        &self.machine_id
    }

    /// Gateway-assigned timestamp (seconds)
    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    /// Temperature (°C)
    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    /// Vibration (g)
    pub fn vibration(&self) -> f64 {
        self.vibration
    }

    /// Rotational speed (rpm)
    pub fn rpm(&self) -> u32 {
        self.rpm
    }

    /// Packet RSSI (dBm)
    pub fn rssi(&self) -> i16 {
        self.rssi
    }

    /// Packet SNR (dB)
    pub fn snr(&self) -> f32 {
        self.snr
    }

    /// Canonical JSON encoding
    pub fn to_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

/// Topic for a machine: `<prefix>/<machine_id>`
///
/// `machine_id` is used verbatim. The identity policy keeps MQTT separators
/// and wildcards out of it.
pub fn derive_topic(prefix: &str, machine_id: &str) -> String {
    format!("{}/{}", prefix, machine_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn link() -> LinkQuality {
        LinkQuality {
            rssi: -45,
            snr: 9.5,
        }
    }

    #[test]
    fn test_enrich_reference_reading() {
        let reading = CompactReading::new("lathe_01", 67.3, 0.012, 3200);
        let canonical = CanonicalReading::enrich(&reading, link(), 1_700_000_000);

        assert_eq!(canonical.machine_id(), "lathe_01");
        assert_eq!(canonical.timestamp(), 1_700_000_000);
        assert_eq!(canonical.temperature(), 67.3);
        assert_eq!(canonical.vibration(), 0.012);
        assert_eq!(canonical.rpm(), 3200);
        assert_eq!(canonical.rssi(), -45);
        assert_eq!(canonical.snr(), 9.5);
    }

    #[test]
    fn test_enrich_is_pure() {
        let reading = CompactReading::new("lathe_01", 67.3, 0.012, 3200);
        let before = reading.clone();

        let a = CanonicalReading::enrich(&reading, link(), 42);
        let b = CanonicalReading::enrich(&reading, link(), 42);

        assert_eq!(a, b);
        assert_eq!(reading, before);
    }

    #[test]
    fn test_canonical_json_fields() {
        let reading = CompactReading::new("lathe_01", 67.3, 0.012, 3200);
        let json = CanonicalReading::enrich(&reading, link(), 100).to_json().unwrap();

        assert_eq!(
            json,
            br#"{"machine_id":"lathe_01","timestamp":100,"temperature":67.3,"vibration":0.012,"rpm":3200,"rssi":-45,"snr":9.5}"#
        );
    }

    #[test]
    fn test_derive_topic() {
        assert_eq!(derive_topic("factory", "lathe_01"), "factory/lathe_01");
        assert_eq!(derive_topic("site/a", "m-1"), "site/a/m-1");
    }
}
