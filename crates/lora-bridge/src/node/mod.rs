// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Duty-cycled sensor node
//!
//! One wake cycle walks a fixed sequence of states:
//!
//! ```text
//! Booting -> RadioInit -> Sampling -> Encoding -> Transmitting -> Sleeping
//!               |                                                   |
//!               +-- init failure: Restart        (wake) <-----------+
//! ```
//!
//! The scheduler never sleeps by itself. [`NodeScheduler::run_cycle`]
//! returns the [`PowerAction`] to apply together with the session to retain,
//! and [`NodeScheduler::run`] hands both to a platform [`PowerControl`].

use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::codec::{self, validate_identity, CompactReading, IdentityError, MAX_PAYLOAD_LEN};
use crate::radio::{Radio, RadioConfig, RadioError};

mod sensor;
mod session;

pub use sensor::{Sensor, SensorSample, SimulatedSensor};
pub use session::{NodeSession, SendResult, RETAINED_SIZE};

/// Default wake interval
pub const DEFAULT_WAKE_INTERVAL: Duration = Duration::from_secs(30);

/// Default airtime budget (EU868 g1 sub-band, 1%)
pub const DEFAULT_DUTY_CYCLE_LIMIT: f64 = 0.01;

/// Node configuration errors
#[derive(Debug, Error)]
pub enum NodeConfigError {
    /// Identity does not satisfy the identity policy
    #[error("invalid node identity: {0}")]
    Identity(#[from] IdentityError),

    /// Wake interval of zero
    #[error("wake interval must be greater than zero")]
    ZeroInterval,

    /// Radio parameters cannot be programmed
    #[error("invalid radio configuration: {0}")]
    Radio(#[from] RadioError),
}

/// Node configuration
#[derive(Debug, Clone)]
pub struct NodeConfig {
    identity: String,
    wake_interval: Duration,
    radio: RadioConfig,
    duty_cycle_limit: f64,
}

impl NodeConfig {
    /// Configuration with default interval and EU868 radio settings
    pub fn new(identity: impl Into<String>) -> Result<Self, NodeConfigError> {
        let identity = identity.into();
        validate_identity(&identity)?;
        Ok(Self {
            identity,
            wake_interval: DEFAULT_WAKE_INTERVAL,
            radio: RadioConfig::default(),
            duty_cycle_limit: DEFAULT_DUTY_CYCLE_LIMIT,
        })
    }

    /// Set the wake interval
    pub fn with_wake_interval(mut self, interval: Duration) -> Result<Self, NodeConfigError> {
        if interval.is_zero() {
            return Err(NodeConfigError::ZeroInterval);
        }
        self.wake_interval = interval;
        Ok(self)
    }

    /// Set the radio channel
    pub fn with_radio(mut self, radio: RadioConfig) -> Result<Self, NodeConfigError> {
        radio.validate()?;
        self.radio = radio;
        Ok(self)
    }

    /// Set the airtime budget (fraction, 0.01 = 1%)
    pub fn with_duty_cycle_limit(mut self, limit: f64) -> Self {
        self.duty_cycle_limit = limit;
        self
    }

    /// Node identity
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Wake interval
    pub fn wake_interval(&self) -> Duration {
        self.wake_interval
    }

    /// Radio channel
    pub fn radio(&self) -> &RadioConfig {
        &self.radio
    }

    /// Airtime fraction of one largest-possible packet per wake interval
    pub fn worst_case_duty_cycle(&self) -> f64 {
        self.radio.duty_cycle(MAX_PAYLOAD_LEN, self.wake_interval)
    }

    /// Whether the worst-case airtime fits the configured budget
    pub fn within_duty_cycle_budget(&self) -> bool {
        self.worst_case_duty_cycle() <= self.duty_cycle_limit
    }
}

/// Node lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    /// Woken up, session restored
    Booting,
    /// Bringing the transceiver up
    RadioInit,
    /// Reading the sensor
    Sampling,
    /// Building the compact payload
    Encoding,
    /// Handing the packet to the radio
    Transmitting,
    /// Peripherals down, waiting for the next wake
    Sleeping,
}

/// What the platform must do at the end of a cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerAction {
    /// Deep sleep for the given duration, keeping the retained session
    Sleep(Duration),
    /// Full restart (cold boot)
    Restart,
}

/// Result of one wake cycle
#[derive(Debug, Clone)]
pub struct CycleReport {
    /// Session to retain across the power action
    pub session: NodeSession,
    /// Reading that was encoded this cycle, as it went on the air
    pub reading: Option<CompactReading>,
    /// Power action to apply
    pub action: PowerAction,
}

/// Platform power management
pub trait PowerControl {
    /// Suspend everything for `duration`. Returns on wake.
    fn deep_sleep(&mut self, duration: Duration);

    /// Reboot the node. Retained memory is not preserved.
    fn restart(&mut self);
}

/// Single-threaded cycle driver for one node
pub struct NodeScheduler<R: Radio, S: Sensor> {
    config: NodeConfig,
    radio: R,
    sensor: S,
    state: NodeState,
}

impl<R: Radio, S: Sensor> NodeScheduler<R, S> {
    /// Create a scheduler
    pub fn new(config: NodeConfig, radio: R, sensor: S) -> Self {
        if !config.within_duty_cycle_budget() {
            warn!(
                identity = %config.identity,
                duty_cycle = config.worst_case_duty_cycle(),
                limit = config.duty_cycle_limit,
                "Wake interval exceeds the airtime budget"
            );
        }
        Self {
            config,
            radio,
            sensor,
            state: NodeState::Sleeping,
        }
    }

    /// Current state
    pub fn state(&self) -> NodeState {
        self.state
    }

    /// Node configuration
    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// Underlying radio
    pub fn radio(&self) -> &R {
        &self.radio
    }

    /// Mutable access to the underlying radio
    pub fn radio_mut(&mut self) -> &mut R {
        &mut self.radio
    }

    fn transition(&mut self, next: NodeState) {
        debug!(from = ?self.state, to = ?next, "Node state");
        self.state = next;
    }

    /// Read the sensor into a reading tagged with this node's identity
    pub fn sample(&mut self) -> CompactReading {
        let s = self.sensor.sample();
        CompactReading::new(self.config.identity.clone(), s.temperature, s.vibration, s.rpm)
    }

    /// Single best-effort send. `true` only means the radio accepted it.
    pub fn transmit(&mut self, bytes: &[u8]) -> bool {
        match self.radio.send(bytes) {
            Ok(()) => true,
            Err(e) => {
                warn!(identity = %self.config.identity, error = %e, "Transmit failed");
                false
            }
        }
    }

    /// Power the radio down ahead of deep sleep
    pub fn power_down(&mut self) {
        if let Err(e) = self.radio.sleep() {
            warn!(error = %e, "Radio did not enter sleep mode");
        }
    }

    /// Run one wake cycle
    pub fn run_cycle(&mut self, session: NodeSession) -> CycleReport {
        let mut session = session;
        session.boot_count = session.boot_count.wrapping_add(1);
        self.transition(NodeState::Booting);
        debug!(
            boot_count = session.boot_count,
            last_send = ?session.last_send_result,
            "Wake"
        );

        self.transition(NodeState::RadioInit);
        if let Err(e) = self.radio.init(&self.config.radio) {
            warn!(error = %e, "Radio init failed, restarting");
            return CycleReport {
                session,
                reading: None,
                action: PowerAction::Restart,
            };
        }

        self.transition(NodeState::Sampling);
        let reading = self.sample();

        self.transition(NodeState::Encoding);
        session.last_send_result = match codec::encode(&reading) {
            Ok(bytes) => {
                self.transition(NodeState::Transmitting);
                if self.transmit(&bytes) {
                    debug!(bytes = bytes.len(), "Packet handed to radio");
                    SendResult::Sent
                } else {
                    SendResult::Failed
                }
            }
            Err(e) => {
                warn!(error = %e, "Encoding failed, nothing transmitted");
                SendResult::Failed
            }
        };

        self.transition(NodeState::Sleeping);
        self.power_down();

        CycleReport {
            session,
            reading: Some(reading.rounded()),
            action: PowerAction::Sleep(self.config.wake_interval),
        }
    }

    /// Drive cycles forever, or `max_cycles` times when given
    ///
    /// Returns the session that would be retained after the last cycle.
    pub fn run<P: PowerControl>(
        &mut self,
        power: &mut P,
        session: NodeSession,
        max_cycles: Option<u64>,
    ) -> NodeSession {
        let mut session = session;
        let mut cycles = 0u64;
        info!(
            identity = %self.config.identity,
            interval_secs = self.config.wake_interval.as_secs_f64(),
            "Node started"
        );

        loop {
            let report = self.run_cycle(session);
            cycles += 1;
            let done = max_cycles.is_some_and(|max| cycles >= max);

            match report.action {
                PowerAction::Sleep(duration) => {
                    session = report.session;
                    if done {
                        return session;
                    }
                    power.deep_sleep(duration);
                }
                PowerAction::Restart => {
                    if done {
                        return report.session;
                    }
                    power.restart();
                    session = NodeSession::new();
                }
            }
        }
    }
}
