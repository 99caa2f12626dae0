//! Prometheus metrics for the Kafka events bridge
//!
//! Exposes metrics at /metrics endpoint for monitoring and observability.
//! Every counter is also readable in-process, which the bridge tests use to
//! observe dropped messages and swallowed failures.

use prometheus::{Histogram, HistogramOpts, IntCounter, IntGauge, Opts, Registry};

mod server;

pub use server::MetricsServer;

/// All bridge metrics in one place
#[derive(Clone)]
pub struct BridgeMetrics {
    pub registry: Registry,

    // Outbound metrics
    pub outbound_published_total: IntCounter,
    pub outbound_failures_total: IntCounter,
    pub outbound_publish_seconds: Histogram,

    // Inbound metrics
    pub inbound_received_total: IntCounter,
    pub inbound_emitted_total: IntCounter,
    pub inbound_decode_failures_total: IntCounter,
    pub inbound_poll_errors_total: IntCounter,

    // Consumer state
    pub consumer_running: IntGauge,
}

fn counter(name: &str, help: &str) -> IntCounter {
    IntCounter::with_opts(Opts::new(name, help)).expect("valid counter options")
}

impl BridgeMetrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        // Outbound metrics
        let outbound_published_total = counter(
            "kafka_events_outbound_published_total",
            "Events acknowledged by the broker",
        );
        let outbound_failures_total = counter(
            "kafka_events_outbound_failures_total",
            "Events dropped because encoding, connecting or sending failed",
        );
        let outbound_publish_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "kafka_events_outbound_publish_seconds",
                "Time spent connecting, sending and disconnecting per event",
            )
            .buckets(vec![
                0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 5.0,
            ]),
        )
        .expect("valid histogram options");

        // Inbound metrics
        let inbound_received_total = counter(
            "kafka_events_inbound_received_total",
            "Messages received from the broker",
        );
        let inbound_emitted_total = counter(
            "kafka_events_inbound_emitted_total",
            "Inbound messages re-emitted on the host event bus",
        );
        let inbound_decode_failures_total = counter(
            "kafka_events_inbound_decode_failures_total",
            "Inbound messages dropped because the body was not valid JSON",
        );
        let inbound_poll_errors_total = counter(
            "kafka_events_inbound_poll_errors_total",
            "Broker errors returned while polling",
        );

        let consumer_running = IntGauge::with_opts(Opts::new(
            "kafka_events_consumer_running",
            "1 while the consumer poll loop is running",
        ))
        .expect("valid gauge options");

        // Register all metrics
        let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
            Box::new(outbound_published_total.clone()),
            Box::new(outbound_failures_total.clone()),
            Box::new(outbound_publish_seconds.clone()),
            Box::new(inbound_received_total.clone()),
            Box::new(inbound_emitted_total.clone()),
            Box::new(inbound_decode_failures_total.clone()),
            Box::new(inbound_poll_errors_total.clone()),
            Box::new(consumer_running.clone()),
        ];
        for collector in collectors {
            registry
                .register(collector)
                .expect("metric names are unique");
        }

        BridgeMetrics {
            registry,
            outbound_published_total,
            outbound_failures_total,
            outbound_publish_seconds,
            inbound_received_total,
            inbound_emitted_total,
            inbound_decode_failures_total,
            inbound_poll_errors_total,
            consumer_running,
        }
    }

    // Outbound helpers

    pub fn outbound_published(&self, elapsed_secs: f64) {
        self.outbound_published_total.inc();
        self.outbound_publish_seconds.observe(elapsed_secs);
    }

    pub fn outbound_failed(&self, elapsed_secs: f64) {
        self.outbound_failures_total.inc();
        self.outbound_publish_seconds.observe(elapsed_secs);
    }

    // Inbound helpers

    pub fn inbound_received(&self) {
        self.inbound_received_total.inc();
    }

    pub fn inbound_emitted(&self) {
        self.inbound_emitted_total.inc();
    }

    pub fn inbound_decode_failed(&self) {
        self.inbound_decode_failures_total.inc();
    }

    pub fn inbound_poll_failed(&self) {
        self.inbound_poll_errors_total.inc();
    }

    pub fn consumer_started(&self) {
        self.consumer_running.set(1);
    }

    pub fn consumer_stopped(&self) {
        self.consumer_running.set(0);
    }
}

impl Default for BridgeMetrics {
    fn default() -> Self {
        Self::new()
    }
}
