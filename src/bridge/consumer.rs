//! Inbound Bridge
//!
//! The broker consumer only offers a blocking poll, so it runs on its own
//! OS thread. Decoded events cross back to the host runtime over a bounded
//! channel drained by a single forwarder task, which is the only place that
//! calls `emit`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use super::BridgeError;
use crate::broker::{BrokerClient, BrokerConsumer, BrokerError, BrokerMessage, ClientOptions};
use crate::host::{Event, EventBus, Profile};
use crate::metrics::BridgeMetrics;
use crate::topic::TopicPattern;

/// Decoded events waiting for the forwarder
const HANDOFF_CAPACITY: usize = 1024;

/// Turn a broker message into a host event.
///
/// The broker topic is used unchanged: `-` cannot be mapped back to `::`
/// without guessing.
pub fn decode_message(message: &BrokerMessage) -> Result<Event, BridgeError> {
    let payload = serde_json::from_slice(&message.payload).map_err(BridgeError::Decode)?;
    Ok(Event::new(message.topic.clone(), payload))
}

/// Consumer loop state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumerState {
    Created,
    Started,
    Stopping,
    Stopped,
}

/// Outcome of a shutdown, `None` until it finishes
type ShutdownOutcome = Option<Result<(), String>>;

struct Workers {
    poller: thread::JoinHandle<()>,
    forwarder: tokio::task::JoinHandle<()>,
}

/// Polls the broker and re-emits inbound messages on the host bus
pub struct ConsumerLoop {
    client: Arc<dyn BrokerClient>,
    options: ClientOptions,
    pattern: TopicPattern,
    bus: Arc<dyn EventBus>,
    profile: Profile,
    poll_timeout: Duration,
    metrics: Arc<BridgeMetrics>,
    state: Arc<Mutex<ConsumerState>>,
    running: Arc<AtomicBool>,
    workers: Mutex<Option<Workers>>,
    shutdown: Mutex<Option<watch::Receiver<ShutdownOutcome>>>,
}

impl ConsumerLoop {
    pub fn new(
        client: Arc<dyn BrokerClient>,
        options: ClientOptions,
        pattern: TopicPattern,
        bus: Arc<dyn EventBus>,
        profile: Profile,
        poll_timeout: Duration,
        metrics: Arc<BridgeMetrics>,
    ) -> Self {
        Self {
            client,
            options,
            pattern,
            bus,
            profile,
            poll_timeout,
            metrics,
            state: Arc::new(Mutex::new(ConsumerState::Created)),
            running: Arc::new(AtomicBool::new(false)),
            workers: Mutex::new(None),
            shutdown: Mutex::new(None),
        }
    }

    /// Current state
    pub fn state(&self) -> ConsumerState {
        *self.state.lock()
    }

    /// Inbound pattern this loop subscribes to
    pub fn pattern(&self) -> &TopicPattern {
        &self.pattern
    }

    /// Create the broker consumer and start polling.
    ///
    /// Must be called from within a tokio runtime; the forwarder task is
    /// spawned on it. Broker configuration errors surface here, once.
    pub fn start(&self) -> Result<(), BridgeError> {
        let mut state = self.state.lock();
        match *state {
            ConsumerState::Created => {}
            ConsumerState::Started | ConsumerState::Stopping => {
                return Err(BridgeError::AlreadyStarted)
            }
            ConsumerState::Stopped => return Err(BridgeError::Stopped),
        }

        let runtime = Handle::try_current().map_err(|e| BridgeError::Runtime(e.to_string()))?;
        let consumer = self.client.create_consumer(&self.options, &self.pattern)?;
        let (tx, rx) = mpsc::channel(HANDOFF_CAPACITY);

        self.running.store(true, Ordering::SeqCst);
        let poll_loop = PollLoop {
            consumer,
            tx,
            running: self.running.clone(),
            poll_timeout: self.poll_timeout,
            metrics: self.metrics.clone(),
        };

        let poller = thread::Builder::new()
            .name("kafka-events-consumer".to_string())
            .spawn(move || poll_loop.run())
            .map_err(|e| {
                self.running.store(false, Ordering::SeqCst);
                BridgeError::Runtime(format!("failed to spawn poll thread: {}", e))
            })?;

        let forwarder = runtime.spawn(forward(
            rx,
            self.bus.clone(),
            self.profile.clone(),
            self.metrics.clone(),
        ));

        *self.workers.lock() = Some(Workers { poller, forwarder });
        *state = ConsumerState::Started;
        self.metrics.consumer_started();

        info!(pattern = %self.pattern, "Consumer loop started");
        Ok(())
    }

    /// Stop polling and wait for both workers to finish.
    ///
    /// Returns immediately if the loop never started or has already stopped.
    /// A call that finds a stop in progress waits for it and reports its
    /// outcome. The shutdown itself runs on its own task, so dropping this
    /// future does not abandon it. Once this returns, no further events are
    /// emitted.
    pub async fn stop(&self) -> Result<(), BridgeError> {
        let mut outcome = {
            let mut state = self.state.lock();
            match *state {
                ConsumerState::Created => {
                    *state = ConsumerState::Stopped;
                    return Ok(());
                }
                ConsumerState::Stopped => return Ok(()),
                ConsumerState::Stopping => {}
                ConsumerState::Started => {
                    *state = ConsumerState::Stopping;
                    self.spawn_shutdown();
                }
            }

            self.shutdown
                .lock()
                .clone()
                .ok_or_else(|| BridgeError::Shutdown("no shutdown in progress".to_string()))?
        };

        let result = outcome
            .wait_for(Option::is_some)
            .await
            .map_err(|_| BridgeError::Shutdown("shutdown task was lost".to_string()))?
            .clone();

        match result {
            Some(Err(msg)) => Err(BridgeError::Shutdown(msg)),
            _ => Ok(()),
        }
    }

    /// Clear the running flag and join the workers on a separate task.
    /// Called with the state lock held, on the transition to `Stopping`.
    fn spawn_shutdown(&self) {
        self.running.store(false, Ordering::SeqCst);

        let (tx, rx) = watch::channel(None);
        *self.shutdown.lock() = Some(rx);

        let workers = self.workers.lock().take();
        let state = self.state.clone();
        let metrics = self.metrics.clone();
        let pattern = self.pattern.clone();

        tokio::spawn(async move {
            let result = match workers {
                Some(workers) => join_workers(workers).await,
                None => Ok(()),
            };

            *state.lock() = ConsumerState::Stopped;
            metrics.consumer_stopped();

            match &result {
                Ok(()) => info!(pattern = %pattern, "Consumer loop stopped"),
                Err(e) => error!(pattern = %pattern, error = %e, "Consumer loop stopped uncleanly"),
            }
            tx.send_replace(Some(result));
        });
    }
}

impl Drop for ConsumerLoop {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

async fn join_workers(workers: Workers) -> Result<(), String> {
    let Workers { poller, forwarder } = workers;

    // The poll thread exits within one poll timeout of the flag clearing
    tokio::task::spawn_blocking(move || poller.join())
        .await
        .map_err(|e| e.to_string())?
        .map_err(|_| "consumer poll thread panicked".to_string())?;

    // Sender is gone; the forwarder drains what is left and ends
    forwarder.await.map_err(|e| e.to_string())
}

/// Everything the poll thread owns
struct PollLoop {
    consumer: Box<dyn BrokerConsumer>,
    tx: mpsc::Sender<Event>,
    running: Arc<AtomicBool>,
    poll_timeout: Duration,
    metrics: Arc<BridgeMetrics>,
}

impl PollLoop {
    fn run(mut self) {
        while self.running.load(Ordering::SeqCst) {
            match self.consumer.poll(self.poll_timeout) {
                Ok(Some(message)) => {
                    self.metrics.inbound_received();
                    if !self.hand_off(&message) {
                        break;
                    }
                }
                Ok(None) => {}
                Err(BrokerError::Closed) => {
                    warn!("Broker closed the consumer, poll loop exiting");
                    break;
                }
                Err(e) => {
                    // Only stop() ends the loop; back off and poll again
                    self.metrics.inbound_poll_failed();
                    if e.is_transient() {
                        warn!(error = %e, "Poll failed, client will retry");
                    } else {
                        error!(error = %e, "Poll failed with a non-transient error");
                    }
                    thread::sleep(self.poll_timeout);
                }
            }
        }

        self.consumer.close();
        debug!("Poll loop exited");
    }

    /// Returns false once the forwarder is gone
    fn hand_off(&self, message: &BrokerMessage) -> bool {
        match decode_message(message) {
            Ok(event) => {
                debug!(topic = %event.topic, "Received message");
                self.tx.blocking_send(event).is_ok()
            }
            Err(e) => {
                self.metrics.inbound_decode_failed();
                error!(topic = %message.topic, error = %e, "Dropping undecodable message");
                true
            }
        }
    }
}

async fn forward(
    mut rx: mpsc::Receiver<Event>,
    bus: Arc<dyn EventBus>,
    profile: Profile,
    metrics: Arc<BridgeMetrics>,
) {
    while let Some(event) = rx.recv().await {
        bus.emit(&profile, event).await;
        metrics.inbound_emitted();
    }
}
