// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! In-process recording transport
//!
//! Stands in for the broker in tests and dry runs. Clones share state, so a
//! test keeps one clone to steer reachability and inspect what was published
//! while the delivery loop owns the other.

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use super::transport::{PublishError, PublishTransport};

/// One message accepted by the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedMessage {
    /// Topic
    pub topic: String,
    /// Payload bytes
    pub payload: Vec<u8>,
}

#[derive(Debug)]
struct MemoryState {
    reachable: bool,
    connected: bool,
    fail_next_publish: bool,
    connect_attempts: usize,
    publish_calls: usize,
    published: Vec<PublishedMessage>,
}

/// Recording transport
#[derive(Debug, Clone)]
pub struct MemoryTransport {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryTransport {
    /// Transport with a reachable broker
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MemoryState {
                reachable: true,
                connected: false,
                fail_next_publish: false,
                connect_attempts: 0,
                publish_calls: 0,
                published: Vec::new(),
            })),
        }
    }

    /// Transport whose broker starts unreachable
    pub fn unreachable() -> Self {
        let transport = Self::new();
        transport.set_reachable(false);
        transport
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Make the broker reachable or not. Going unreachable drops the session.
    pub fn set_reachable(&self, reachable: bool) {
        let mut state = self.lock();
        state.reachable = reachable;
        if !reachable {
            state.connected = false;
        }
    }

    /// Drop the current session (broker restart, network blip)
    pub fn drop_connection(&self) {
        self.lock().connected = false;
    }

    /// Reject the next publish and drop the session
    pub fn fail_next_publish(&self) {
        self.lock().fail_next_publish = true;
    }

    /// Messages accepted so far
    pub fn published(&self) -> Vec<PublishedMessage> {
        self.lock().published.clone()
    }

    /// Number of `publish` calls, accepted or not
    pub fn publish_calls(&self) -> usize {
        self.lock().publish_calls
    }

    /// Number of `connect` calls
    pub fn connect_attempts(&self) -> usize {
        self.lock().connect_attempts
    }
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PublishTransport for MemoryTransport {
    async fn connect(&mut self) -> Result<(), PublishError> {
        let mut state = self.lock();
        state.connect_attempts += 1;
        if !state.reachable {
            return Err(PublishError::Connect("broker unreachable".into()));
        }
        state.connected = true;
        Ok(())
    }

    async fn publish(&mut self, topic: &str, payload: Vec<u8>) -> Result<(), PublishError> {
        let mut state = self.lock();
        state.publish_calls += 1;
        if !state.connected {
            return Err(PublishError::NotConnected);
        }
        if state.fail_next_publish {
            state.fail_next_publish = false;
            state.connected = false;
            return Err(PublishError::Backpressure);
        }
        state.published.push(PublishedMessage {
            topic: topic.to_string(),
            payload,
        });
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.lock().connected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_requires_connect() {
        let mut transport = MemoryTransport::new();
        assert_eq!(
            transport.publish("t", b"x".to_vec()).await,
            Err(PublishError::NotConnected)
        );

        transport.connect().await.unwrap();
        transport.publish("t", b"x".to_vec()).await.unwrap();

        assert_eq!(transport.publish_calls(), 2);
        assert_eq!(
            transport.published(),
            vec![PublishedMessage {
                topic: "t".into(),
                payload: b"x".to_vec()
            }]
        );
    }

    #[tokio::test]
    async fn test_unreachable_broker() {
        let mut transport = MemoryTransport::unreachable();
        assert!(matches!(
            transport.connect().await,
            Err(PublishError::Connect(_))
        ));
        assert!(!transport.is_connected());

        transport.set_reachable(true);
        transport.connect().await.unwrap();
        assert!(transport.is_connected());
        assert_eq!(transport.connect_attempts(), 2);
    }

    #[tokio::test]
    async fn test_failed_publish_drops_session() {
        let mut transport = MemoryTransport::new();
        let observer = transport.clone();
        transport.connect().await.unwrap();

        observer.fail_next_publish();
        assert_eq!(
            transport.publish("t", b"x".to_vec()).await,
            Err(PublishError::Backpressure)
        );
        assert!(!transport.is_connected());
        assert!(observer.published().is_empty());
    }
}
