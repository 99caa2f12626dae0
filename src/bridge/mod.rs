//! Event Bus / Kafka Bridge
//!
//! Relays events between the host's in-process event bus and an external
//! broker in both directions:
//!
//! - **Outbound** (`Publisher`): subscribed to the bus under the outbound
//!   pattern; every matching event is JSON-encoded and sent to the broker
//!   under its translated topic (`::` becomes `-`), over a connection opened
//!   for that single send.
//! - **Inbound** (`ConsumerLoop`): polls the broker on a dedicated thread for
//!   topics matching the inbound pattern and re-emits decoded messages on the
//!   bus. Broker topics are used as-is for the host topic.
//! - **Lifecycle** (`BridgeLifecycle`): builds both sides from settings,
//!   registers them in the host registry and coordinates shutdown.
//!
//! Delivery is at-most-once outbound and at-least-once inbound. Failures on
//! one side are logged and never stall the other.
//!
//! # Example Configuration
//!
//! ```toml
//! [bridge]
//! bootstrap_servers = "kafka:9092"
//! outbound_pattern = "acapy-outbound-.*"
//! inbound_pattern = "acapy-inbound-.*"
//!
//! [bridge.consumer-config]
//! group_id = "agent-1"
//! ```

use std::fmt;

use crate::broker::BrokerError;
use crate::config::ConfigError;
use crate::host::RegistryError;

mod consumer;
mod lifecycle;
mod publisher;


pub use consumer::{decode_message, ConsumerLoop, ConsumerState};
pub use lifecycle::{BridgeLifecycle, BridgeState, BRIDGE_PROFILE};
pub use publisher::{encode_payload, Publisher};

/// Error type for bridge operations
#[derive(Debug)]
pub enum BridgeError {
    /// Settings could not be turned into a working bridge
    Config(ConfigError),
    /// Broker client failure
    Broker(BrokerError),
    /// Payload could not be serialized
    Encode(serde_json::Error),
    /// Inbound message body is not valid JSON
    Decode(serde_json::Error),
    /// `start`/`setup` called on something already running
    AlreadyStarted,
    /// `start` called after `stop`
    Stopped,
    /// No async runtime available, or the poll thread could not be spawned
    Runtime(String),
    /// Host registry lookup failed
    Registry(RegistryError),
    /// Consumer did not shut down cleanly
    Shutdown(String),
}

impl fmt::Display for BridgeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BridgeError::Config(e) => write!(f, "Configuration error: {}", e),
            BridgeError::Broker(e) => write!(f, "Broker error: {}", e),
            BridgeError::Encode(e) => write!(f, "Failed to encode payload: {}", e),
            BridgeError::Decode(e) => write!(f, "Failed to decode message: {}", e),
            BridgeError::AlreadyStarted => write!(f, "Already started"),
            BridgeError::Stopped => write!(f, "Already stopped"),
            BridgeError::Runtime(msg) => write!(f, "Runtime error: {}", msg),
            BridgeError::Registry(e) => write!(f, "Registry error: {}", e),
            BridgeError::Shutdown(msg) => write!(f, "Shutdown failed: {}", msg),
        }
    }
}

impl std::error::Error for BridgeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BridgeError::Config(e) => Some(e),
            BridgeError::Broker(e) => Some(e),
            BridgeError::Encode(e) | BridgeError::Decode(e) => Some(e),
            BridgeError::Registry(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigError> for BridgeError {
    fn from(e: ConfigError) -> Self {
        BridgeError::Config(e)
    }
}

impl From<BrokerError> for BridgeError {
    fn from(e: BrokerError) -> Self {
        BridgeError::Broker(e)
    }
}

impl From<RegistryError> for BridgeError {
    fn from(e: RegistryError) -> Self {
        BridgeError::Registry(e)
    }
}
