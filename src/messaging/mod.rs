//! Transport abstraction for publishing readings to the collector
//!
//! The transport owns its [`ConnectionState`]. Delivery code only reads it;
//! the transport itself flips it from publish outcomes and connection
//! probes.

pub mod http;

use async_trait::async_trait;
use std::sync::Mutex;
use thiserror::Error;
use tokio::sync::watch;

pub use http::{HttpTransport, HttpTransportConfig};

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Transport disconnected")]
    Disconnected,

    #[error("Publish failed: {0}")]
    PublishFailed(String),

    #[error("Publish timed out")]
    Timeout,

    #[error("Client error: {0}")]
    Client(String),
}

pub type Result<T> = std::result::Result<T, TransportError>;

/// Shared connection flag owned by a transport
///
/// Backed by a `watch` channel so observers can await changes while readers
/// get a cheap, thread-safe snapshot. Readers must tolerate the value
/// changing between a check and the following publish.
#[derive(Debug)]
pub struct ConnectionState {
    tx: watch::Sender<bool>,
}

impl ConnectionState {
    pub fn new(connected: bool) -> Self {
        let (tx, _rx) = watch::channel(connected);
        Self { tx }
    }

    pub fn is_connected(&self) -> bool {
        *self.tx.borrow()
    }

    /// Update the flag; returns `true` if the value changed
    pub fn set_connected(&self, connected: bool) -> bool {
        self.tx.send_if_modified(|current| {
            if *current == connected {
                false
            } else {
                *current = connected;
                true
            }
        })
    }

    /// Subscribe to connection changes
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

impl Default for ConnectionState {
    fn default() -> Self {
        Self::new(false)
    }
}

/// Message transport used to hand readings to the collector
#[async_trait]
pub trait Transport: Send + Sync {
    /// Connection state owned by this transport
    fn connection(&self) -> &ConnectionState;

    /// Publish a payload on a topic
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<()>;

    fn is_connected(&self) -> bool {
        self.connection().is_connected()
    }
}

/// A payload accepted by [`MockTransport`]
#[derive(Debug, Clone, PartialEq)]
pub struct PublishedMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

/// In-process transport for development and tests
///
/// Records every accepted payload. Failures can be injected after a number
/// of successful publishes to simulate the link dropping mid-batch.
#[derive(Debug, Default)]
pub struct MockTransport {
    state: ConnectionState,
    published: Mutex<Vec<PublishedMessage>>,
    fail_after: Mutex<Option<usize>>,
}

impl MockTransport {
    pub fn new(connected: bool) -> Self {
        Self {
            state: ConnectionState::new(connected),
            ..Default::default()
        }
    }

    pub fn set_connected(&self, connected: bool) {
        self.state.set_connected(connected);
    }

    /// Accept `count` more publishes, then fail every following one
    pub fn fail_after(&self, count: usize) {
        *self.fail_after.lock().unwrap_or_else(|e| e.into_inner()) = Some(count);
    }

    pub fn published(&self) -> Vec<PublishedMessage> {
        self.published
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Published payloads decoded as JSON
    pub fn published_json(&self) -> Vec<serde_json::Value> {
        self.published()
            .iter()
            .filter_map(|m| serde_json::from_slice(&m.payload).ok())
            .collect()
    }
}

#[async_trait]
impl Transport for MockTransport {
    fn connection(&self) -> &ConnectionState {
        &self.state
    }

    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<()> {
        if !self.state.is_connected() {
            return Err(TransportError::Disconnected);
        }

        {
            let mut remaining = self.fail_after.lock().unwrap_or_else(|e| e.into_inner());
            match remaining.as_mut() {
                Some(0) => {
                    return Err(TransportError::PublishFailed("injected failure".to_string()));
                }
                Some(n) => *n -= 1,
                None => {}
            }
        }

        tracing::debug!(topic, size = payload.len(), "Mock publish");
        self.published
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(PublishedMessage {
                topic: topic.to_string(),
                payload,
            });
        Ok(())
    }
}
