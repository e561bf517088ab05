// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Node state retained across deep sleep
//!
//! Only diagnostics survive the sleep boundary. On hardware the session is
//! stored in RTC memory through [`NodeSession::to_retained`].

/// Outcome of the most recent transmit attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SendResult {
    /// No transmit attempted since cold boot
    #[default]
    Unsent,
    /// Radio accepted the packet
    Sent,
    /// Radio rejected the packet (or encoding failed)
    Failed,
}

impl SendResult {
    fn to_byte(self) -> u8 {
        match self {
            SendResult::Unsent => 0,
            SendResult::Sent => 1,
            SendResult::Failed => 2,
        }
    }

    fn from_byte(b: u8) -> Option<Self> {
        match b {
            0 => Some(SendResult::Unsent),
            1 => Some(SendResult::Sent),
            2 => Some(SendResult::Failed),
            _ => None,
        }
    }
}

/// Size of the retained representation
pub const RETAINED_SIZE: usize = 7;

const RETAINED_MAGIC: [u8; 2] = *b"LR";

/// Diagnostics carried from one wake cycle to the next
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NodeSession {
    /// Number of wake cycles since cold boot
    pub boot_count: u32,
    /// Result of the last transmit
    pub last_send_result: SendResult,
}

impl NodeSession {
    /// Fresh session after a cold boot
    pub fn new() -> Self {
        Self::default()
    }

    /// Serialize for retained memory
    ///
    /// Layout: magic `"LR"`, boot count (u32 BE), send result (u8).
    pub fn to_retained(&self) -> [u8; RETAINED_SIZE] {
        let mut buf = [0u8; RETAINED_SIZE];
        buf[0..2].copy_from_slice(&RETAINED_MAGIC);
        buf[2..6].copy_from_slice(&self.boot_count.to_be_bytes());
        buf[6] = self.last_send_result.to_byte();
        buf
    }

    /// Restore from retained memory
    ///
    /// Returns `None` when the memory holds no valid session (first power-up,
    /// brown-out), in which case the node starts from [`NodeSession::new`].
    pub fn from_retained(buf: &[u8]) -> Option<Self> {
        if buf.len() < RETAINED_SIZE || buf[0..2] != RETAINED_MAGIC {
            return None;
        }
        let boot_count = u32::from_be_bytes([buf[2], buf[3], buf[4], buf[5]]);
        let last_send_result = SendResult::from_byte(buf[6])?;
        Some(Self {
            boot_count,
            last_send_result,
        })
    }
}
