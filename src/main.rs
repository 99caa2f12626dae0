//! kafka-events - host event bus / Kafka bridge
//!
//! Usage:
//!   kafka-events [OPTIONS]
//!
//! Options:
//!   -c, --config <FILE>    Configuration file path
//!   -b, --broker <KIND>    Broker client: memory, kafka (default: memory)
//!   -l, --log-level        Log level (error, warn, info, debug, trace)
//!   -h, --help             Print help

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use clap::{Parser, ValueEnum};
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use kafka_events::broker::{BrokerClient, InMemoryBroker};
use kafka_events::config::Config;
use kafka_events::host::{Event, EventBus, EventHandler, LocalEventBus, Profile, Registry};
use kafka_events::{BridgeLifecycle, BridgeMetrics, MetricsServer};

/// Log level for CLI
#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum LogLevel {
    /// Only errors
    Error,
    /// Warnings and errors
    Warn,
    /// Informational messages
    #[default]
    Info,
    /// Debug messages
    Debug,
    /// Trace messages (very verbose)
    Trace,
}

impl LogLevel {
    fn to_tracing_level(self) -> Level {
        match self {
            LogLevel::Error => Level::ERROR,
            LogLevel::Warn => Level::WARN,
            LogLevel::Info => Level::INFO,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Trace => Level::TRACE,
        }
    }
}

/// Broker client implementation
#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum BrokerKind {
    /// In-process broker (loopback, no network)
    #[default]
    Memory,
    /// Kafka via librdkafka (requires the `kafka` feature)
    Kafka,
}

/// kafka-events - relay host events to and from Kafka
#[derive(Parser, Debug)]
#[command(name = "kafka-events")]
#[command(version)]
#[command(about = "Bridge between a host event bus and a Kafka broker")]
struct Args {
    /// Configuration file path (TOML format)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Broker client to use
    #[arg(short, long, value_enum, default_value_t = BrokerKind::Memory)]
    broker: BrokerKind,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, value_enum)]
    log_level: Option<LogLevel>,
}

/// Logs every inbound event that reaches the bus
struct InboundLogger;

#[async_trait]
impl EventHandler for InboundLogger {
    async fn handle(&self, profile: &Profile, event: &Event) {
        info!(profile = %profile.name, "Inbound {}", event);
    }
}

fn broker_client(kind: BrokerKind) -> Result<Arc<dyn BrokerClient>, String> {
    match kind {
        BrokerKind::Memory => Ok(Arc::new(InMemoryBroker::new())),
        #[cfg(feature = "kafka")]
        BrokerKind::Kafka => Ok(Arc::new(kafka_events::broker::KafkaBrokerClient::new())),
        #[cfg(not(feature = "kafka"))]
        BrokerKind::Kafka => Err("built without the `kafka` feature".to_string()),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Load configuration file if specified, otherwise defaults plus env overrides
    let loaded = match &args.config {
        Some(path) => Config::load(path),
        None => Config::from_env(),
    };
    let file_config = match loaded {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Error loading configuration: {}", e);
            std::process::exit(1);
        }
    };

    // Setup logging - CLI overrides config
    let log_level = args.log_level.unwrap_or_else(|| {
        match file_config.log.level.to_lowercase().as_str() {
            "error" => LogLevel::Error,
            "warn" => LogLevel::Warn,
            "debug" => LogLevel::Debug,
            "trace" => LogLevel::Trace,
            _ => LogLevel::Info,
        }
    });

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level.to_tracing_level())
        .with_target(false)
        .with_thread_ids(true)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    if let Some(path) = &args.config {
        info!("Loaded configuration from {:?}", path);
    }

    let client = match broker_client(args.broker) {
        Ok(client) => client,
        Err(e) => {
            eprintln!("Cannot use broker {:?}: {}", args.broker, e);
            std::process::exit(1);
        }
    };

    info!("Starting kafka-events bridge");
    info!("  Broker: {:?}", args.broker);
    info!("  Outbound pattern: {}", file_config.bridge.outbound_pattern);
    info!("  Inbound pattern: {}", file_config.bridge.inbound_pattern);

    let metrics = Arc::new(BridgeMetrics::new());
    if file_config.metrics.enabled {
        info!("  Metrics: enabled (http://{})", file_config.metrics.bind);

        let metrics_server = MetricsServer::new(metrics.clone(), file_config.metrics.bind);
        tokio::spawn(async move {
            if let Err(e) = metrics_server.run().await {
                error!("Metrics server error: {}", e);
            }
        });
    } else {
        info!("  Metrics: disabled");
    }

    let bus = Arc::new(LocalEventBus::new());
    let registry = Registry::new();
    bus.subscribe(file_config.bridge.inbound()?, Arc::new(InboundLogger));

    let lifecycle = BridgeLifecycle::new(client, metrics);
    if let Err(e) = lifecycle.setup(&file_config.bridge, bus.clone(), &registry) {
        error!("Bridge setup failed: {}", e);
        std::process::exit(1);
    }

    tokio::signal::ctrl_c().await?;
    info!("Received Ctrl+C, shutting down");

    if let Err(e) = lifecycle.teardown(&registry).await {
        error!("Bridge teardown failed: {}", e);
        std::process::exit(1);
    }

    Ok(())
}
