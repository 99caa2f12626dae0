//! Topic naming and matching
//!
//! Host topics are hierarchical strings joined with `::`, for example
//! `acapy::record::connections::active`. Broker topics are flat names where
//! the separator has been replaced with `-`. This module owns the one-way
//! translation between the two and the anchored patterns that decide which
//! topics cross the bridge.

mod codec;
mod pattern;

pub use codec::{to_broker_topic, BROKER_SEPARATOR, HOST_SEPARATOR};
pub use pattern::{TopicPattern, DEFAULT_INBOUND_PATTERN, DEFAULT_OUTBOUND_PATTERN};
