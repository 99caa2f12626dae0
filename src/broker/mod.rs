//! Broker Client Contract
//!
//! The external broker is reached through a deliberately small contract:
//! producers are connected, used for a single acknowledged send and
//! disconnected; consumers are created already subscribed to a topic pattern
//! and polled with a blocking call. Batching, partition assignment and offset
//! management stay inside the client implementation.
//!
//! Implementations:
//! - `InMemoryBroker`: retained in-process topic log, used by tests and the
//!   `memory` mode of the binary
//! - `KafkaBrokerClient` (feature `kafka`): librdkafka via `rdkafka`

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use crate::topic::TopicPattern;

#[cfg(feature = "kafka")]
mod kafka;
mod memory;

#[cfg(feature = "kafka")]
pub use kafka::KafkaBrokerClient;
pub use memory::{InMemoryBroker, MemoryConsumer, MemoryProducer};

/// Option key holding the broker bootstrap address list
pub const BOOTSTRAP_SERVERS: &str = "bootstrap_servers";

/// Bootstrap address used when configuration omits one
pub const DEFAULT_BOOTSTRAP_SERVERS: &str = "kafka";

/// Broker client options, keyed in the host's underscore style
pub type ClientOptions = BTreeMap<String, String>;

/// The wire-level unit exchanged with the broker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerMessage {
    pub topic: String,
    pub payload: Bytes,
}

impl BrokerMessage {
    pub fn new(topic: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }
}

/// Error type for broker client operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrokerError {
    /// Client options are unusable (bad address, unknown property)
    InvalidConfig(String),
    /// Connection to the broker failed or was lost
    Connection(String),
    /// Broker refused the write
    Rejected(String),
    /// Operation timed out
    Timeout,
    /// Client handle has been closed
    Closed,
    /// Other error
    Other(String),
}

impl BrokerError {
    /// Errors the client is expected to recover from on its own
    pub fn is_transient(&self) -> bool {
        matches!(self, BrokerError::Connection(_) | BrokerError::Timeout)
    }
}

impl fmt::Display for BrokerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BrokerError::InvalidConfig(msg) => write!(f, "Invalid config: {}", msg),
            BrokerError::Connection(msg) => write!(f, "Connection error: {}", msg),
            BrokerError::Rejected(msg) => write!(f, "Rejected: {}", msg),
            BrokerError::Timeout => write!(f, "Operation timed out"),
            BrokerError::Closed => write!(f, "Client closed"),
            BrokerError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for BrokerError {}

/// Factory for broker connections
#[async_trait]
pub trait BrokerClient: Send + Sync {
    /// Open a producer connection. The caller owns it until `disconnect`.
    async fn connect_producer(
        &self,
        options: &ClientOptions,
    ) -> Result<Box<dyn ProducerConnection>, BrokerError>;

    /// Create a consumer subscribed to every topic matching `pattern`.
    ///
    /// Blocking; configuration errors surface here rather than on poll.
    fn create_consumer(
        &self,
        options: &ClientOptions,
        pattern: &TopicPattern,
    ) -> Result<Box<dyn BrokerConsumer>, BrokerError>;
}

/// A producer connection scoped to one caller
#[async_trait]
pub trait ProducerConnection: Send {
    /// Send one message and wait for the broker acknowledgment
    async fn send_and_wait(&mut self, topic: &str, payload: Bytes) -> Result<(), BrokerError>;

    /// Flush and release the connection
    async fn disconnect(&mut self) -> Result<(), BrokerError>;
}

/// A blocking consumer handle owned by a single thread
pub trait BrokerConsumer: Send {
    /// Wait up to `timeout` for the next message; `Ok(None)` on timeout
    fn poll(&mut self, timeout: Duration) -> Result<Option<BrokerMessage>, BrokerError>;

    /// Leave the consumer group and release the handle
    fn close(self: Box<Self>);
}
