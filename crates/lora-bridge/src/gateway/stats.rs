// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Gateway statistics

// Use AtomicU64 on 64-bit, AtomicU32 on 32-bit (Pi Zero, etc.)
#[cfg(not(target_pointer_width = "64"))]
use std::sync::atomic::AtomicU32 as AtomicCounter;
#[cfg(target_pointer_width = "64")]
use std::sync::atomic::AtomicU64 as AtomicCounter;

#[cfg(target_pointer_width = "64")]
type CounterValue = u64;
#[cfg(not(target_pointer_width = "64"))]
type CounterValue = u32;

use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

use crate::codec::DecodeError;

/// Gateway statistics
///
/// Shared between the reception thread and the delivery task.
#[derive(Debug)]
pub struct GatewayStats {
    /// Packets received from LoRa
    pub packets_received: AtomicCounter,
    /// Bytes received from LoRa
    pub bytes_received: AtomicCounter,
    /// Packets that decoded into a valid reading
    pub packets_decoded: AtomicCounter,
    /// Packets discarded: not a compact payload
    pub discarded_malformed: AtomicCounter,
    /// Packets discarded: identity absent or empty
    pub discarded_missing_identity: AtomicCounter,
    /// Packets discarded: identity outside the policy
    pub discarded_invalid_identity: AtomicCounter,
    /// Packets discarded: too long
    pub discarded_oversized: AtomicCounter,
    /// Radio receive errors (CRC, bus)
    pub radio_errors: AtomicCounter,
    /// Readings published upstream
    pub published: AtomicCounter,
    /// Readings dropped because the upstream link was down
    pub dropped_disconnected: AtomicCounter,
    /// Readings dropped because the handoff was full
    pub dropped_backpressure: AtomicCounter,
    /// Publish calls that failed
    pub publish_failures: AtomicCounter,
    /// Successful upstream connects
    pub connects: AtomicCounter,
    /// Failed upstream connect attempts
    pub connect_failures: AtomicCounter,
    /// Start time
    start_time: Instant,
}

impl GatewayStats {
    /// Create new statistics tracker
    pub fn new() -> Self {
        Self {
            packets_received: AtomicCounter::new(0),
            bytes_received: AtomicCounter::new(0),
            packets_decoded: AtomicCounter::new(0),
            discarded_malformed: AtomicCounter::new(0),
            discarded_missing_identity: AtomicCounter::new(0),
            discarded_invalid_identity: AtomicCounter::new(0),
            discarded_oversized: AtomicCounter::new(0),
            radio_errors: AtomicCounter::new(0),
            published: AtomicCounter::new(0),
            dropped_disconnected: AtomicCounter::new(0),
            dropped_backpressure: AtomicCounter::new(0),
            publish_failures: AtomicCounter::new(0),
            connects: AtomicCounter::new(0),
            connect_failures: AtomicCounter::new(0),
            start_time: Instant::now(),
        }
    }

    /// Record a packet off the air
    pub fn record_packet(&self, bytes: usize) {
        self.packets_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received
            .fetch_add(bytes as CounterValue, Ordering::Relaxed);
    }

    /// Record a successful decode
    pub fn record_decoded(&self) {
        self.packets_decoded.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a discarded packet under its reason
    pub fn record_discard(&self, reason: &DecodeError) {
        let counter = match reason {
            DecodeError::MalformedPayload(_) => &self.discarded_malformed,
            DecodeError::MissingIdentity => &self.discarded_missing_identity,
            DecodeError::InvalidIdentity { .. } => &self.discarded_invalid_identity,
            DecodeError::Oversized(_) => &self.discarded_oversized,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a radio receive error
    pub fn record_radio_error(&self) {
        self.radio_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a successful publish
    pub fn record_published(&self) {
        self.published.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a reading dropped while disconnected
    pub fn record_dropped_disconnected(&self) {
        self.dropped_disconnected.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a reading dropped on a full handoff
    pub fn record_dropped_backpressure(&self) {
        self.dropped_backpressure.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a failed publish
    pub fn record_publish_failure(&self) {
        self.publish_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a connect attempt
    pub fn record_connect(&self, success: bool) {
        if success {
            self.connects.fetch_add(1, Ordering::Relaxed);
        } else {
            self.connect_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Get uptime
    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Get snapshot of all stats
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            packets_received: self.packets_received.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            packets_decoded: self.packets_decoded.load(Ordering::Relaxed),
            discarded_malformed: self.discarded_malformed.load(Ordering::Relaxed),
            discarded_missing_identity: self.discarded_missing_identity.load(Ordering::Relaxed),
            discarded_invalid_identity: self.discarded_invalid_identity.load(Ordering::Relaxed),
            discarded_oversized: self.discarded_oversized.load(Ordering::Relaxed),
            radio_errors: self.radio_errors.load(Ordering::Relaxed),
            published: self.published.load(Ordering::Relaxed),
            dropped_disconnected: self.dropped_disconnected.load(Ordering::Relaxed),
            dropped_backpressure: self.dropped_backpressure.load(Ordering::Relaxed),
            publish_failures: self.publish_failures.load(Ordering::Relaxed),
            connects: self.connects.load(Ordering::Relaxed),
            connect_failures: self.connect_failures.load(Ordering::Relaxed),
            uptime_secs: self.start_time.elapsed().as_secs(),
        }
    }

    /// Format stats as string
    pub fn format_summary(&self) -> String {
        let snap = self.snapshot();
        format!(
            "Gateway Stats (uptime: {}s)\n\
             LoRa:    RX {} pkts ({} bytes), decoded {}, radio errors {}\n\
             Discard: malformed={}, missing_id={}, invalid_id={}, oversized={}\n\
             MQTT:    published {}, failures {}, connects {} (failed {})\n\
             Drops:   disconnected={}, backpressure={}",
            snap.uptime_secs,
            snap.packets_received,
            snap.bytes_received,
            snap.packets_decoded,
            snap.radio_errors,
            snap.discarded_malformed,
            snap.discarded_missing_identity,
            snap.discarded_invalid_identity,
            snap.discarded_oversized,
            snap.published,
            snap.publish_failures,
            snap.connects,
            snap.connect_failures,
            snap.dropped_disconnected,
            snap.dropped_backpressure
        )
    }
}

impl Default for GatewayStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Statistics snapshot (immutable copy of current stats)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Packets received from LoRa
    pub packets_received: CounterValue,
    /// Bytes received from LoRa
    pub bytes_received: CounterValue,
    /// Packets that decoded into a valid reading
    pub packets_decoded: CounterValue,
    /// Packets discarded: not a compact payload
    pub discarded_malformed: CounterValue,
    /// Packets discarded: identity absent or empty
    pub discarded_missing_identity: CounterValue,
    /// Packets discarded: identity outside the policy
    pub discarded_invalid_identity: CounterValue,
    /// Packets discarded: too long
    pub discarded_oversized: CounterValue,
    /// Radio receive errors
    pub radio_errors: CounterValue,
    /// Readings published upstream
    pub published: CounterValue,
    /// Readings dropped because the upstream link was down
    pub dropped_disconnected: CounterValue,
    /// Readings dropped because the handoff was full
    pub dropped_backpressure: CounterValue,
    /// Publish calls that failed
    pub publish_failures: CounterValue,
    /// Successful upstream connects
    pub connects: CounterValue,
    /// Failed upstream connect attempts
    pub connect_failures: CounterValue,
    /// Uptime in seconds
    pub uptime_secs: u64,
}

impl StatsSnapshot {
    /// Total packets discarded at decode
    pub fn discarded(&self) -> CounterValue {
        self.discarded_malformed
            + self.discarded_missing_identity
            + self.discarded_invalid_identity
            + self.discarded_oversized
    }

    /// Total readings dropped after a successful decode
    pub fn dropped(&self) -> CounterValue {
        self.dropped_disconnected + self.dropped_backpressure
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::IdentityError;

    #[test]
    fn test_stats_creation() {
        let stats = GatewayStats::new();
        let snap = stats.snapshot();
        assert_eq!(snap.packets_received, 0);
        assert_eq!(snap.published, 0);
    }

    #[test]
    fn test_stats_recording() {
        let stats = GatewayStats::new();

        stats.record_packet(46);
        stats.record_packet(50);
        stats.record_decoded();
        stats.record_published();
        stats.record_dropped_disconnected();
        stats.record_connect(true);
        stats.record_connect(false);

        let snap = stats.snapshot();
        assert_eq!(snap.packets_received, 2);
        assert_eq!(snap.bytes_received, 96);
        assert_eq!(snap.packets_decoded, 1);
        assert_eq!(snap.published, 1);
        assert_eq!(snap.dropped(), 1);
        assert_eq!(snap.connects, 1);
        assert_eq!(snap.connect_failures, 1);
    }

    #[test]
    fn test_discard_reasons() {
        let stats = GatewayStats::new();
        stats.record_discard(&DecodeError::MalformedPayload("eof".into()));
        stats.record_discard(&DecodeError::MissingIdentity);
        stats.record_discard(&DecodeError::MissingIdentity);
        stats.record_discard(&DecodeError::InvalidIdentity {
            identity: "a/b".into(),
            reason: IdentityError::ForbiddenChar('/'),
        });
        stats.record_discard(&DecodeError::Oversized(300));

        let snap = stats.snapshot();
        assert_eq!(snap.discarded_malformed, 1);
        assert_eq!(snap.discarded_missing_identity, 2);
        assert_eq!(snap.discarded_invalid_identity, 1);
        assert_eq!(snap.discarded_oversized, 1);
        assert_eq!(snap.discarded(), 5);
    }

    #[test]
    fn test_format_summary() {
        let stats = GatewayStats::new();
        stats.record_packet(10);
        stats.record_dropped_backpressure();

        let summary = stats.format_summary();
        assert!(summary.contains("RX 1 pkts (10 bytes)"));
        assert!(summary.contains("backpressure=1"));
    }
}
