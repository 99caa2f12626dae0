//! Metrics endpoint settings
//!
//! When enabled, the binary serves the bridge counters on `/metrics`, a
//! liveness check on `/health` and a readiness check on `/ready` that passes
//! only while the inbound consumer is polling.

use serde::Deserialize;
use std::net::SocketAddr;

/// Port the metrics endpoint binds to unless configured
pub const DEFAULT_METRICS_PORT: u16 = 9090;

/// `[metrics]` section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Serve the HTTP endpoint
    pub enabled: bool,
    /// Listen address, all interfaces on port 9090 by default
    pub bind: SocketAddr,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bind: SocketAddr::from(([0, 0, 0, 0], DEFAULT_METRICS_PORT)),
        }
    }
}
