// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Radio reception loop
//!
//! `Idle -> PacketAvailable -> Decoding -> (Valid: enrich + hand off |
//! Invalid: discard)`. A bad packet never stops the loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::{debug, info, trace, warn};

use super::clock::Clock;
use super::handoff::{Handoff, HandoffOutcome};
use super::stats::GatewayStats;
use crate::codec::{self, CanonicalReading, DecodeError};
use crate::radio::{Radio, RadioError, ReceivedPacket};

/// Pause after a hard radio error before polling again
const RADIO_ERROR_PAUSE: Duration = Duration::from_millis(100);

/// What reception did with one packet
#[derive(Debug, Clone, PartialEq)]
pub enum ReceptionOutcome {
    /// Decoded and offered to delivery
    Handed(HandoffOutcome),
    /// Rejected at decode
    Discarded(DecodeError),
}

/// Decodes packets, enriches them and feeds the handoff
pub struct PacketReceiver {
    handoff: Handoff,
    clock: Arc<dyn Clock>,
    stats: Arc<GatewayStats>,
}

impl PacketReceiver {
    /// Create a receiver
    pub fn new(handoff: Handoff, clock: Arc<dyn Clock>, stats: Arc<GatewayStats>) -> Self {
        Self {
            handoff,
            clock,
            stats,
        }
    }

    /// Handle one packet
    pub fn process(&self, packet: ReceivedPacket) -> ReceptionOutcome {
        self.stats.record_packet(packet.payload.len());

        let compact = match codec::decode(&packet.payload) {
            Ok(reading) => reading,
            Err(e) => {
                self.stats.record_discard(&e);
                match e {
                    DecodeError::MissingIdentity | DecodeError::InvalidIdentity { .. } => {
                        warn!(rssi = packet.link.rssi, error = %e, "Discarding packet")
                    }
                    _ => debug!(rssi = packet.link.rssi, error = %e, "Discarding packet"),
                }
                return ReceptionOutcome::Discarded(e);
            }
        };
        self.stats.record_decoded();

        let reading = CanonicalReading::enrich(&compact, packet.link, self.clock.now_secs());
        trace!(
            machine_id = reading.machine_id(),
            rssi = reading.rssi(),
            snr = reading.snr(),
            "Reading decoded"
        );

        let outcome = self.handoff.offer(reading);
        match outcome {
            HandoffOutcome::Queued => {}
            HandoffOutcome::DroppedDisconnected => {
                self.stats.record_dropped_disconnected();
                debug!(machine_id = %compact.identity, "Upstream down, reading dropped");
            }
            HandoffOutcome::DroppedBackpressure => {
                self.stats.record_dropped_backpressure();
                warn!(machine_id = %compact.identity, "Delivery busy, reading dropped");
            }
            HandoffOutcome::Closed => {
                debug!(machine_id = %compact.identity, "Delivery closed, reading dropped");
            }
        }
        ReceptionOutcome::Handed(outcome)
    }

    /// Receive until `running` clears or delivery goes away
    ///
    /// `poll` bounds each radio wait, and so the shutdown latency.
    pub fn run<R: Radio>(&self, radio: &mut R, running: &AtomicBool, poll: Duration) {
        info!("Reception loop started");

        while running.load(Ordering::Relaxed) {
            match radio.receive(poll) {
                Ok(Some(packet)) => {
                    if self.process(packet) == ReceptionOutcome::Handed(HandoffOutcome::Closed) {
                        break;
                    }
                }
                Ok(None) => {}
                Err(RadioError::InvalidData) => {
                    self.stats.record_radio_error();
                    debug!("Packet failed CRC, ignored");
                }
                Err(e) => {
                    self.stats.record_radio_error();
                    warn!(error = %e, "Radio receive error");
                    thread::sleep(RADIO_ERROR_PAUSE);
                }
            }
        }

        if let Err(e) = radio.sleep() {
            debug!(error = %e, "Radio did not enter sleep mode");
        }
        info!("Reception loop stopped");
    }
}
