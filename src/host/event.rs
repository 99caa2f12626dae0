//! Host event types

use std::fmt;

use serde_json::Value;

/// An event on the host bus
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    /// Hierarchical topic, e.g. `acapy::record::connections::active`
    pub topic: String,
    /// Opaque structured payload, never interpreted by the bridge
    pub payload: Value,
}

impl Event {
    pub fn new(topic: impl Into<String>, payload: Value) -> Self {
        Self {
            topic: topic.into(),
            payload,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Event(topic={}, payload={})", self.topic, self.payload)
    }
}

/// Identity of the runtime context an event was emitted from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    pub name: String,
}

impl Profile {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Default for Profile {
    fn default() -> Self {
        Self::new("default")
    }
}
