// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Upstream session state
//!
//! Written only by the delivery loop, read by anyone (reception thread,
//! handle, stats task). Both fields are single atomics so readers never
//! block the writer.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// Upstream connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectionState {
    /// No broker session
    Disconnected = 0,
    /// Connect in progress
    Connecting = 1,
    /// Broker session established, publishes allowed
    Connected = 2,
}

impl ConnectionState {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => ConnectionState::Connecting,
            2 => ConnectionState::Connected,
            _ => ConnectionState::Disconnected,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
        };
        f.write_str(s)
    }
}

/// Result of the most recent publish
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PublishResult {
    /// Nothing published yet
    None = 0,
    /// Transport accepted the message
    Published = 1,
    /// Transport rejected the message
    Failed = 2,
}

impl PublishResult {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => PublishResult::Published,
            2 => PublishResult::Failed,
            _ => PublishResult::None,
        }
    }
}

/// Process-lifetime gateway session
#[derive(Debug)]
pub struct GatewaySession {
    state: AtomicU8,
    last_publish: AtomicU8,
}

impl GatewaySession {
    /// New session, disconnected
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(ConnectionState::Disconnected as u8),
            last_publish: AtomicU8::new(PublishResult::None as u8),
        }
    }

    /// Current upstream connection state
    pub fn connection_state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Whether publishes are currently allowed
    pub fn is_connected(&self) -> bool {
        self.connection_state() == ConnectionState::Connected
    }

    /// Result of the last publish
    pub fn last_publish_result(&self) -> PublishResult {
        PublishResult::from_u8(self.last_publish.load(Ordering::Acquire))
    }

    pub(crate) fn set_connection_state(&self, state: ConnectionState) {
        self.state.store(state as u8, Ordering::Release);
    }

    pub(crate) fn record_publish(&self, result: PublishResult) {
        self.last_publish.store(result as u8, Ordering::Release);
    }
}

impl Default for GatewaySession {
    fn default() -> Self {
        Self::new()
    }
}
