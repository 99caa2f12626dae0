//! Bridge Lifecycle
//!
//! Wires the publisher and consumer loop into the host at setup and stops the
//! consumer loop at teardown.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::info;

use super::consumer::ConsumerLoop;
use super::publisher::Publisher;
use super::BridgeError;
use crate::broker::BrokerClient;
use crate::config::BridgeSettings;
use crate::host::{EventBus, Profile, Registry};
use crate::metrics::BridgeMetrics;

/// Profile attached to events the bridge emits on the host bus
pub const BRIDGE_PROFILE: &str = "kafka-events";

/// Lifecycle state of the bridge as a whole
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeState {
    Uninitialized,
    Running,
    Stopped,
}

struct Components {
    publisher: Arc<Publisher>,
    consumer: Arc<ConsumerLoop>,
}

/// Owns both sides of the bridge for the life of the process
pub struct BridgeLifecycle {
    client: Arc<dyn BrokerClient>,
    metrics: Arc<BridgeMetrics>,
    state: Mutex<BridgeState>,
    components: Mutex<Option<Components>>,
}

impl BridgeLifecycle {
    pub fn new(client: Arc<dyn BrokerClient>, metrics: Arc<BridgeMetrics>) -> Self {
        Self {
            client,
            metrics,
            state: Mutex::new(BridgeState::Uninitialized),
            components: Mutex::new(None),
        }
    }

    pub fn state(&self) -> BridgeState {
        *self.state.lock()
    }

    pub fn metrics(&self) -> &Arc<BridgeMetrics> {
        &self.metrics
    }

    /// The running publisher, if set up
    pub fn publisher(&self) -> Option<Arc<Publisher>> {
        self.components.lock().as_ref().map(|c| c.publisher.clone())
    }

    /// The consumer loop, if set up
    pub fn consumer(&self) -> Option<Arc<ConsumerLoop>> {
        self.components.lock().as_ref().map(|c| c.consumer.clone())
    }

    /// Build both sides from `settings`, start the consumer loop, register
    /// both in `registry` and subscribe the publisher to `bus`.
    ///
    /// Configuration and broker errors abort setup and leave the bridge
    /// uninitialized. Must run inside a tokio runtime.
    pub fn setup(
        &self,
        settings: &BridgeSettings,
        bus: Arc<dyn EventBus>,
        registry: &Registry,
    ) -> Result<(), BridgeError> {
        let mut state = self.state.lock();
        if *state != BridgeState::Uninitialized {
            return Err(BridgeError::AlreadyStarted);
        }

        let config = settings.bridge_config()?;
        let outbound = settings.outbound()?;
        let inbound = settings.inbound()?;

        let publisher = Arc::new(Publisher::new(
            self.client.clone(),
            config.producer_options,
            self.metrics.clone(),
        ));
        let consumer = Arc::new(ConsumerLoop::new(
            self.client.clone(),
            config.consumer_options,
            inbound.clone(),
            bus.clone(),
            Profile::new(BRIDGE_PROFILE),
            settings.poll_timeout,
            self.metrics.clone(),
        ));

        consumer.start()?;

        registry.bind_instance(publisher.clone());
        registry.bind_instance(consumer.clone());
        bus.subscribe(outbound.clone(), publisher.clone());

        *self.components.lock() = Some(Components {
            publisher,
            consumer,
        });
        *state = BridgeState::Running;

        info!(outbound = %outbound, inbound = %inbound, "Kafka events bridge set up");
        Ok(())
    }

    /// Look up the consumer loop in `registry` and stop it.
    ///
    /// Unlike everything else in the bridge, failures here propagate so the
    /// host's shutdown sequence sees them. A second teardown is a no-op.
    pub async fn teardown(&self, registry: &Registry) -> Result<(), BridgeError> {
        if self.state() == BridgeState::Stopped {
            return Ok(());
        }

        let consumer = registry.inject::<ConsumerLoop>()?;
        consumer.stop().await?;

        *self.state.lock() = BridgeState::Stopped;
        info!("Kafka events bridge torn down");
        Ok(())
    }
}
