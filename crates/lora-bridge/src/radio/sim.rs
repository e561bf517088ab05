// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! In-process simulated radio medium
//!
//! [`SimAir`] is a shared channel; every [`SimRadio`] attached to it can send
//! into it and receive from it. Each transmitter carries the link quality the
//! receiver will observe, so tests can assert on RSSI/SNR propagation.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use super::{LinkQuality, Radio, RadioConfig, RadioError, ReceivedPacket, LORA_MAX_PACKET};

/// Shared simulated medium
#[derive(Default)]
pub struct SimAir {
    queue: Mutex<VecDeque<ReceivedPacket>>,
    available: Condvar,
}

impl SimAir {
    /// Create an empty medium
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Attach a radio whose transmissions are received with `link`
    pub fn radio(self: &Arc<Self>, link: LinkQuality) -> SimRadio {
        SimRadio {
            air: Arc::clone(self),
            link,
            config: None,
            asleep: false,
            fail_init: false,
            fail_send: false,
            sent: 0,
        }
    }

    /// Place a raw packet on the air, bypassing any transmitter
    pub fn inject(&self, payload: &[u8], link: LinkQuality) {
        self.lock().push_back(ReceivedPacket {
            payload: payload.to_vec(),
            link,
        });
        self.available.notify_all();
    }

    /// Number of packets waiting to be received
    pub fn pending(&self) -> usize {
        self.lock().len()
    }

    /// Remove and return every packet waiting on the air
    pub fn drain(&self) -> Vec<ReceivedPacket> {
        self.lock().drain(..).collect()
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<ReceivedPacket>> {
        // The queue holds plain packets; a poisoned lock is still consistent
        self.queue.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn wait_for_packet(&self, timeout: Duration) -> Option<ReceivedPacket> {
        let deadline = Instant::now() + timeout;
        let mut queue = self.lock();
        loop {
            if let Some(packet) = queue.pop_front() {
                return Some(packet);
            }
            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            queue = match self.available.wait_timeout(queue, deadline - now) {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
    }
}

/// Radio endpoint attached to a [`SimAir`]
pub struct SimRadio {
    air: Arc<SimAir>,
    link: LinkQuality,
    config: Option<RadioConfig>,
    asleep: bool,
    fail_init: bool,
    fail_send: bool,
    sent: usize,
}

impl SimRadio {
    /// Make every `init` fail as if the transceiver did not answer
    pub fn with_init_failure(mut self) -> Self {
        self.fail_init = true;
        self
    }

    /// Make every `send` fail at the hardware level
    pub fn with_send_failure(mut self) -> Self {
        self.fail_send = true;
        self
    }

    /// Link quality attached to this radio's transmissions
    pub fn set_link(&mut self, link: LinkQuality) {
        self.link = link;
    }

    /// Whether the radio is in its low-power mode
    pub fn is_asleep(&self) -> bool {
        self.asleep
    }

    /// Number of packets this radio put on the air
    pub fn sent(&self) -> usize {
        self.sent
    }

    fn ensure_ready(&mut self) -> Result<(), RadioError> {
        if self.config.is_none() {
            return Err(RadioError::NotInitialized);
        }
        self.asleep = false;
        Ok(())
    }
}

impl Radio for SimRadio {
    fn init(&mut self, config: &RadioConfig) -> Result<(), RadioError> {
        if self.fail_init {
            return Err(RadioError::NotResponding);
        }
        config.validate()?;
        self.config = Some(config.clone());
        self.asleep = false;
        Ok(())
    }

    fn send(&mut self, data: &[u8]) -> Result<(), RadioError> {
        self.ensure_ready()?;
        if data.len() > LORA_MAX_PACKET {
            return Err(RadioError::BufferTooSmall(data.len()));
        }
        if self.fail_send {
            return Err(RadioError::Timeout);
        }
        self.air.inject(data, self.link);
        self.sent += 1;
        Ok(())
    }

    fn receive(&mut self, timeout: Duration) -> Result<Option<ReceivedPacket>, RadioError> {
        self.ensure_ready()?;
        Ok(self.air.wait_for_packet(timeout))
    }

    fn sleep(&mut self) -> Result<(), RadioError> {
        self.asleep = true;
        Ok(())
    }
}
