// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Upstream publish capability

use async_trait::async_trait;
use thiserror::Error;

/// Upstream publish errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PublishError {
    /// No broker session
    #[error("not connected to broker")]
    NotConnected,

    /// Transport queue full; the message was not accepted
    #[error("transport queue full")]
    Backpressure,

    /// Connect attempt failed
    #[error("connect failed: {0}")]
    Connect(String),

    /// Client-side failure while publishing
    #[error("client error: {0}")]
    Client(String),
}

/// Something readings can be published through
///
/// Owned by the delivery loop, which is the only caller.
#[async_trait]
pub trait PublishTransport: Send {
    /// Establish a broker session, replacing any previous one
    async fn connect(&mut self) -> Result<(), PublishError>;

    /// Queue one message. An error means the message was not accepted.
    async fn publish(&mut self, topic: &str, payload: Vec<u8>) -> Result<(), PublishError>;

    /// Whether the broker session is still up
    fn is_connected(&self) -> bool;
}

#[async_trait]
impl<T: PublishTransport + ?Sized> PublishTransport for Box<T> {
    async fn connect(&mut self) -> Result<(), PublishError> {
        (**self).connect().await
    }

    async fn publish(&mut self, topic: &str, payload: Vec<u8>) -> Result<(), PublishError> {
        (**self).publish(topic, payload).await
    }

    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }
}
