//! Anchored topic patterns

use std::fmt;

use regex::Regex;

/// Host topics matching this pattern are forwarded to the broker
pub const DEFAULT_OUTBOUND_PATTERN: &str = "acapy-outbound-.*";

/// Broker topics matching this pattern are re-emitted onto the host bus
pub const DEFAULT_INBOUND_PATTERN: &str = "acapy-inbound-.*";

/// A compiled regular expression tested against a whole topic string.
///
/// The source pattern is wrapped as `^(?:...)$`, so `acapy-.*` matches
/// `acapy-x` but not `my-acapy-x`.
#[derive(Debug, Clone)]
pub struct TopicPattern {
    source: String,
    regex: Regex,
}

impl TopicPattern {
    /// Compile a pattern
    pub fn new(source: &str) -> Result<Self, regex::Error> {
        let regex = Regex::new(&format!("^(?:{})$", source))?;
        Ok(Self {
            source: source.to_string(),
            regex,
        })
    }

    /// Check whether the full topic matches
    pub fn is_match(&self, topic: &str) -> bool {
        self.regex.is_match(topic)
    }

    /// The pattern as written, without anchors
    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl fmt::Display for TopicPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}
