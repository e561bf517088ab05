// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Reception -> delivery handoff
//!
//! A bounded channel plus the session's connection flag. The sending side
//! never waits: a reading that cannot be delivered right now is dropped.

use std::sync::Arc;

use tokio::sync::mpsc::{self, error::TrySendError};

use super::session::GatewaySession;
use crate::codec::CanonicalReading;

/// What happened to an offered reading
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandoffOutcome {
    /// Queued for delivery
    Queued,
    /// Upstream not connected, reading dropped
    DroppedDisconnected,
    /// Handoff full, reading dropped
    DroppedBackpressure,
    /// Delivery side is gone
    Closed,
}

/// Sending half, owned by the reception loop
#[derive(Debug, Clone)]
pub struct Handoff {
    tx: mpsc::Sender<CanonicalReading>,
    session: Arc<GatewaySession>,
}

/// Create a handoff of `capacity` slots (at least 1)
pub fn handoff(
    capacity: usize,
    session: Arc<GatewaySession>,
) -> (Handoff, mpsc::Receiver<CanonicalReading>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (Handoff { tx, session }, rx)
}

impl Handoff {
    /// Offer a reading without blocking
    pub fn offer(&self, reading: CanonicalReading) -> HandoffOutcome {
        if !self.session.is_connected() {
            return HandoffOutcome::DroppedDisconnected;
        }
        match self.tx.try_send(reading) {
            Ok(()) => HandoffOutcome::Queued,
            Err(TrySendError::Full(_)) => HandoffOutcome::DroppedBackpressure,
            Err(TrySendError::Closed(_)) => HandoffOutcome::Closed,
        }
    }
}
