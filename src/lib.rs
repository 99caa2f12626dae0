//! kafka-events - bridge between a host event bus and a Kafka broker
//!
//! Host events matching the outbound pattern are JSON-encoded and produced to
//! the broker under a flattened topic name; broker messages matching the
//! inbound pattern are decoded and re-emitted on the host bus.

pub mod bridge;
pub mod broker;
pub mod config;
pub mod host;
pub mod metrics;
pub mod topic;

pub use bridge::{BridgeError, BridgeLifecycle, ConsumerLoop, Publisher};
pub use broker::{BrokerClient, BrokerError, BrokerMessage, InMemoryBroker};
#[cfg(feature = "kafka")]
pub use broker::KafkaBrokerClient;
pub use config::{BridgeConfig, BridgeSettings, Config};
pub use host::{Event, EventBus, EventHandler, LocalEventBus, Profile, Registry};
pub use metrics::{BridgeMetrics, MetricsServer};
pub use topic::{to_broker_topic, TopicPattern};
