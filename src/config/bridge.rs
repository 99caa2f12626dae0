//! Bridge Configuration
//!
//! Settings surface for the bridge and the per-role broker option maps
//! derived from it.
//!
//! ```toml
//! [bridge]
//! bootstrap_servers = "kafka:9092"   # shared, merged into both roles
//! outbound_pattern = "acapy-outbound-.*"
//! inbound_pattern = "acapy-inbound-.*"
//! poll_timeout = "100ms"
//!
//! [bridge.producer-config]
//! acks = "all"
//!
//! [bridge.consumer-config]
//! group_id = "agent-1"
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::Deserialize;

use super::ConfigError;
use crate::broker::{ClientOptions, BOOTSTRAP_SERVERS, DEFAULT_BOOTSTRAP_SERVERS};
use crate::topic::{TopicPattern, DEFAULT_INBOUND_PATTERN, DEFAULT_OUTBOUND_PATTERN};

/// Scalar broker option value.
///
/// TOML and typed environment overrides can produce numbers and booleans;
/// the broker client only ever sees strings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionValue::Bool(v) => write!(f, "{}", v),
            OptionValue::Integer(v) => write!(f, "{}", v),
            OptionValue::Float(v) => write!(f, "{}", v),
            OptionValue::String(v) => f.write_str(v),
        }
    }
}

impl From<&str> for OptionValue {
    fn from(value: &str) -> Self {
        OptionValue::String(value.to_string())
    }
}

/// Bridge settings as they appear in the host configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BridgeSettings {
    /// Producer-only broker options (override shared keys)
    #[serde(rename = "producer-config", alias = "producer_config")]
    pub producer_config: BTreeMap<String, OptionValue>,

    /// Consumer-only broker options (override shared keys)
    #[serde(rename = "consumer-config", alias = "consumer_config")]
    pub consumer_config: BTreeMap<String, OptionValue>,

    /// Host topics matching this pattern are sent to the broker
    pub outbound_pattern: String,

    /// Broker topics matching this pattern are re-emitted on the host bus
    pub inbound_pattern: String,

    /// Upper bound on a single consumer poll, which is also how long
    /// `stop()` may wait for the poll thread to notice the stop flag
    #[serde(with = "humantime_serde")]
    pub poll_timeout: Duration,

    /// Every other key: broker options shared by both roles
    #[serde(flatten)]
    pub shared: BTreeMap<String, OptionValue>,
}

fn default_poll_timeout() -> Duration {
    Duration::from_millis(100)
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            producer_config: BTreeMap::new(),
            consumer_config: BTreeMap::new(),
            outbound_pattern: DEFAULT_OUTBOUND_PATTERN.to_string(),
            inbound_pattern: DEFAULT_INBOUND_PATTERN.to_string(),
            poll_timeout: default_poll_timeout(),
            shared: BTreeMap::new(),
        }
    }
}

impl BridgeSettings {
    /// Compile the outbound pattern
    pub fn outbound(&self) -> Result<TopicPattern, ConfigError> {
        compile_pattern("outbound_pattern", &self.outbound_pattern)
    }

    /// Compile the inbound pattern
    pub fn inbound(&self) -> Result<TopicPattern, ConfigError> {
        compile_pattern("inbound_pattern", &self.inbound_pattern)
    }

    /// Merge shared options into each role's options
    pub fn bridge_config(&self) -> Result<BridgeConfig, ConfigError> {
        let config = BridgeConfig {
            producer_options: merge_options(&self.shared, &self.producer_config),
            consumer_options: merge_options(&self.shared, &self.consumer_config),
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate patterns, options and timeouts
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.outbound()?;
        self.inbound()?;
        self.bridge_config()?;

        if self.poll_timeout.is_zero() {
            return Err(ConfigError::Validation(
                "bridge.poll_timeout must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}

fn compile_pattern(name: &str, source: &str) -> Result<TopicPattern, ConfigError> {
    TopicPattern::new(source).map_err(|e| {
        ConfigError::Validation(format!("bridge.{} is not a valid pattern: {}", name, e))
    })
}

/// Role-specific keys win over shared keys of the same name; the bootstrap
/// address falls back to the built-in default.
fn merge_options(
    shared: &BTreeMap<String, OptionValue>,
    role: &BTreeMap<String, OptionValue>,
) -> ClientOptions {
    let mut options: ClientOptions = shared
        .iter()
        .chain(role.iter())
        .map(|(k, v)| (k.clone(), v.to_string()))
        .collect();

    options
        .entry(BOOTSTRAP_SERVERS.to_string())
        .or_insert_with(|| DEFAULT_BOOTSTRAP_SERVERS.to_string());

    options
}

/// Broker options for each side of the bridge, read-only once built
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeConfig {
    pub producer_options: ClientOptions,
    pub consumer_options: ClientOptions,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        let empty = BTreeMap::new();
        Self {
            producer_options: merge_options(&empty, &empty),
            consumer_options: merge_options(&empty, &empty),
        }
    }
}

impl BridgeConfig {
    /// Check that both roles can address the broker
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_bootstrap("producer", &self.producer_options)?;
        validate_bootstrap("consumer", &self.consumer_options)
    }
}

fn validate_bootstrap(role: &str, options: &ClientOptions) -> Result<(), ConfigError> {
    let servers = options
        .get(BOOTSTRAP_SERVERS)
        .map(|s| s.trim())
        .unwrap_or_default();

    if servers.is_empty() {
        return Err(ConfigError::Validation(format!(
            "{} {} must not be empty",
            role, BOOTSTRAP_SERVERS
        )));
    }

    for address in servers.split(',').map(str::trim) {
        parse_address(address).ok_or_else(|| {
            ConfigError::Validation(format!(
                "{} {} contains invalid address '{}'",
                role, BOOTSTRAP_SERVERS, address
            ))
        })?;
    }

    Ok(())
}

/// Parse `host[:port]`, returning the host and optional port
fn parse_address(address: &str) -> Option<(&str, Option<u16>)> {
    let (host, port) = match address.rsplit_once(':') {
        Some((host, port)) => (host, Some(port.parse::<u16>().ok()?)),
        None => (address, None),
    };

    if host.is_empty() || host.contains(char::is_whitespace) {
        return None;
    }

    Some((host, port))
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn values(pairs: &[(&str, &str)]) -> BTreeMap<String, OptionValue> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), OptionValue::from(*v)))
            .collect()
    }

    #[test_case("kafka", Some(("kafka", None)); "bare host")]
    #[test_case("kafka:9092", Some(("kafka", Some(9092))); "host and port")]
    #[test_case("10.0.0.1:19092", Some(("10.0.0.1", Some(19092))); "ip and port")]
    #[test_case("kafka:notaport", None; "bad port")]
    #[test_case("kafka:70000", None; "port out of range")]
    #[test_case(":9092", None; "missing host")]
    #[test_case("", None; "empty")]
    fn test_parse_address(input: &str, expected: Option<(&str, Option<u16>)>) {
        assert_eq!(parse_address(input), expected);
    }

    #[test]
    fn test_role_keys_override_shared_keys() {
        let shared = values(&[("bootstrap_servers", "shared:9092"), ("client_id", "shared")]);
        let role = values(&[("client_id", "producer"), ("acks", "all")]);

        let merged = merge_options(&shared, &role);

        assert_eq!(merged["bootstrap_servers"], "shared:9092");
        assert_eq!(merged["client_id"], "producer");
        assert_eq!(merged["acks"], "all");
    }

    #[test]
    fn test_default_bootstrap_is_substituted() {
        let merged = merge_options(&BTreeMap::new(), &values(&[("group_id", "g")]));
        assert_eq!(merged[BOOTSTRAP_SERVERS], DEFAULT_BOOTSTRAP_SERVERS);

        let config = BridgeConfig::default();
        assert_eq!(config.producer_options[BOOTSTRAP_SERVERS], "kafka");
        assert_eq!(config.consumer_options[BOOTSTRAP_SERVERS], "kafka");
    }

    #[test]
    fn test_scalar_values_are_stringified() {
        let mut shared = BTreeMap::new();
        shared.insert("linger_ms".to_string(), OptionValue::Integer(5));
        shared.insert("enable_idempotence".to_string(), OptionValue::Bool(true));

        let merged = merge_options(&shared, &BTreeMap::new());
        assert_eq!(merged["linger_ms"], "5");
        assert_eq!(merged["enable_idempotence"], "true");
    }

    #[test]
    fn test_invalid_bootstrap_is_rejected() {
        let settings = BridgeSettings {
            consumer_config: values(&[("bootstrap_servers", "kafka:1, :9092")]),
            ..Default::default()
        };

        let err = settings.bridge_config().unwrap_err();
        assert!(err.to_string().contains("consumer bootstrap_servers"));
    }

    #[test]
    fn test_invalid_pattern_is_rejected() {
        let settings = BridgeSettings {
            inbound_pattern: "acapy-(".to_string(),
            ..Default::default()
        };

        assert!(matches!(settings.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_zero_poll_timeout_is_rejected() {
        let settings = BridgeSettings {
            poll_timeout: Duration::ZERO,
            ..Default::default()
        };

        assert!(settings.validate().is_err());
    }
}
