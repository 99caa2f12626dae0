//! In-memory broker
//!
//! Keeps a retained log of every message and fans new messages out to live
//! consumers whose pattern matches. Consumers start from the beginning of the
//! log, like a Kafka consumer group with `auto.offset.reset=earliest`.
//! Connection bookkeeping and failure injection make it usable as a test
//! double for the bridge.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use tracing::debug;

use super::{
    BrokerClient, BrokerConsumer, BrokerError, BrokerMessage, ClientOptions, ProducerConnection,
    BOOTSTRAP_SERVERS,
};
use crate::topic::TopicPattern;

struct Subscriber {
    id: u64,
    pattern: TopicPattern,
    tx: Sender<BrokerMessage>,
}

#[derive(Default)]
struct Inner {
    /// Every message ever delivered, in order
    log: Mutex<Vec<BrokerMessage>>,
    /// Messages written through producer connections
    sent: Mutex<Vec<BrokerMessage>>,
    subscribers: Mutex<Vec<Subscriber>>,
    next_consumer_id: AtomicU64,
    connections_opened: AtomicUsize,
    connections_closed: AtomicUsize,
    consumers_opened: AtomicUsize,
    consumers_closed: AtomicUsize,
    fail_connections: AtomicBool,
    reject_sends: AtomicBool,
    failing_polls: AtomicUsize,
}

impl Inner {
    fn deliver(&self, message: BrokerMessage) {
        // Lock order: log, then subscribers
        let mut log = self.log.lock();
        for subscriber in self.subscribers.lock().iter() {
            if subscriber.pattern.is_match(&message.topic) {
                let _ = subscriber.tx.send(message.clone());
            }
        }
        log.push(message);
    }

    fn take_poll_failure(&self) -> bool {
        self.failing_polls
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

fn require_bootstrap(options: &ClientOptions) -> Result<(), BrokerError> {
    match options.get(BOOTSTRAP_SERVERS) {
        Some(servers) if !servers.trim().is_empty() => Ok(()),
        _ => Err(BrokerError::InvalidConfig(format!(
            "missing '{}'",
            BOOTSTRAP_SERVERS
        ))),
    }
}

/// In-process broker with a retained topic log
#[derive(Clone, Default)]
pub struct InMemoryBroker {
    inner: Arc<Inner>,
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message as if another client had produced it
    pub fn inject(&self, message: BrokerMessage) {
        self.inner.deliver(message);
    }

    /// Messages written through producer connections
    pub fn sent(&self) -> Vec<BrokerMessage> {
        self.inner.sent.lock().clone()
    }

    pub fn connections_opened(&self) -> usize {
        self.inner.connections_opened.load(Ordering::SeqCst)
    }

    pub fn connections_closed(&self) -> usize {
        self.inner.connections_closed.load(Ordering::SeqCst)
    }

    pub fn consumers_opened(&self) -> usize {
        self.inner.consumers_opened.load(Ordering::SeqCst)
    }

    pub fn consumers_closed(&self) -> usize {
        self.inner.consumers_closed.load(Ordering::SeqCst)
    }

    /// Number of consumers currently registered
    pub fn active_consumers(&self) -> usize {
        self.inner.subscribers.lock().len()
    }

    /// Make every subsequent producer connect attempt fail
    pub fn fail_connections(&self, fail: bool) {
        self.inner.fail_connections.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent send be rejected by the broker
    pub fn reject_sends(&self, reject: bool) {
        self.inner.reject_sends.store(reject, Ordering::SeqCst);
    }

    /// Make the next `count` consumer polls fail with a transient error
    pub fn fail_next_polls(&self, count: usize) {
        self.inner.failing_polls.store(count, Ordering::SeqCst);
    }
}

#[async_trait]
impl BrokerClient for InMemoryBroker {
    async fn connect_producer(
        &self,
        options: &ClientOptions,
    ) -> Result<Box<dyn ProducerConnection>, BrokerError> {
        require_bootstrap(options)?;
        if self.inner.fail_connections.load(Ordering::SeqCst) {
            return Err(BrokerError::Connection("connection refused".to_string()));
        }

        self.inner.connections_opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemoryProducer {
            inner: self.inner.clone(),
            open: true,
        }))
    }

    fn create_consumer(
        &self,
        options: &ClientOptions,
        pattern: &TopicPattern,
    ) -> Result<Box<dyn BrokerConsumer>, BrokerError> {
        require_bootstrap(options)?;

        let (tx, rx) = crossbeam_channel::unbounded();
        let id = self.inner.next_consumer_id.fetch_add(1, Ordering::SeqCst);

        // Replay the retained log and register under the log lock so no
        // message is missed or duplicated
        {
            let log = self.inner.log.lock();
            for message in log.iter().filter(|m| pattern.is_match(&m.topic)) {
                let _ = tx.send(message.clone());
            }
            self.inner.subscribers.lock().push(Subscriber {
                id,
                pattern: pattern.clone(),
                tx,
            });
        }

        self.inner.consumers_opened.fetch_add(1, Ordering::SeqCst);
        debug!(consumer = id, pattern = %pattern, "In-memory consumer subscribed");

        Ok(Box::new(MemoryConsumer {
            id,
            rx,
            inner: self.inner.clone(),
        }))
    }
}

/// Producer connection to an `InMemoryBroker`.
///
/// Dropping without `disconnect` leaves the connection counted as open, which
/// is how tests detect leaked connections.
pub struct MemoryProducer {
    inner: Arc<Inner>,
    open: bool,
}

#[async_trait]
impl ProducerConnection for MemoryProducer {
    async fn send_and_wait(&mut self, topic: &str, payload: Bytes) -> Result<(), BrokerError> {
        if !self.open {
            return Err(BrokerError::Closed);
        }
        if self.inner.reject_sends.load(Ordering::SeqCst) {
            return Err(BrokerError::Rejected(format!("write to '{}' refused", topic)));
        }

        let message = BrokerMessage::new(topic, payload);
        self.inner.sent.lock().push(message.clone());
        self.inner.deliver(message);
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), BrokerError> {
        if self.open {
            self.open = false;
            self.inner.connections_closed.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

/// Consumer handle on an `InMemoryBroker`
pub struct MemoryConsumer {
    id: u64,
    rx: Receiver<BrokerMessage>,
    inner: Arc<Inner>,
}

impl BrokerConsumer for MemoryConsumer {
    fn poll(&mut self, timeout: Duration) -> Result<Option<BrokerMessage>, BrokerError> {
        if self.inner.take_poll_failure() {
            return Err(BrokerError::Connection("simulated broker failure".to_string()));
        }

        match self.rx.recv_timeout(timeout) {
            Ok(message) => Ok(Some(message)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(BrokerError::Closed),
        }
    }

    fn close(self: Box<Self>) {
        // Unregistration happens in Drop
    }
}

impl Drop for MemoryConsumer {
    fn drop(&mut self) {
        self.inner.subscribers.lock().retain(|s| s.id != self.id);
        self.inner.consumers_closed.fetch_add(1, Ordering::SeqCst);
        debug!(consumer = self.id, "In-memory consumer closed");
    }
}
