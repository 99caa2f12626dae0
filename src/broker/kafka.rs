//! Kafka broker client backed by librdkafka.
//!
//! Option keys are accepted in the host's underscore style
//! (`bootstrap_servers`, `group_id`) and translated to librdkafka's dotted
//! property names (`bootstrap.servers`, `group.id`).

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{BaseConsumer, Consumer};
use rdkafka::error::KafkaError;
use rdkafka::message::Message;
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use rdkafka::util::Timeout;
use tracing::{debug, info, warn};

use super::{
    BrokerClient, BrokerConsumer, BrokerError, BrokerMessage, ClientOptions, ProducerConnection,
};
use crate::topic::TopicPattern;

/// Consumer group used when the options do not name one
pub const DEFAULT_GROUP_ID: &str = "kafka-events";

/// Upper bound for delivery acknowledgment and flush
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Translate host-style option keys into a librdkafka client config
fn client_config(options: &ClientOptions) -> ClientConfig {
    let mut config = ClientConfig::new();
    for (key, value) in options {
        config.set(key.replace('_', "."), value);
    }
    config
}

fn map_kafka_error(err: KafkaError) -> BrokerError {
    match err {
        KafkaError::ClientCreation(msg) => BrokerError::InvalidConfig(msg),
        KafkaError::MessageProduction(code) => BrokerError::Rejected(code.to_string()),
        KafkaError::Subscription(msg) => BrokerError::InvalidConfig(msg),
        other => BrokerError::Connection(other.to_string()),
    }
}

/// Broker client creating librdkafka producers and consumers
#[derive(Debug, Clone)]
pub struct KafkaBrokerClient {
    request_timeout: Duration,
}

impl KafkaBrokerClient {
    pub fn new() -> Self {
        Self {
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Set the delivery/flush timeout
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

impl Default for KafkaBrokerClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BrokerClient for KafkaBrokerClient {
    async fn connect_producer(
        &self,
        options: &ClientOptions,
    ) -> Result<Box<dyn ProducerConnection>, BrokerError> {
        let producer: FutureProducer = client_config(options)
            .set("message.timeout.ms", self.request_timeout.as_millis().to_string())
            .create()
            .map_err(map_kafka_error)?;

        Ok(Box::new(KafkaProducer {
            producer: Some(producer),
            request_timeout: self.request_timeout,
        }))
    }

    fn create_consumer(
        &self,
        options: &ClientOptions,
        pattern: &TopicPattern,
    ) -> Result<Box<dyn BrokerConsumer>, BrokerError> {
        let mut config = client_config(options);
        if config.get("group.id").is_none() {
            config.set("group.id", DEFAULT_GROUP_ID);
        }

        let consumer: BaseConsumer = config.create().map_err(map_kafka_error)?;

        // librdkafka treats a leading '^' as a regex subscription
        let subscription = format!("^({})$", pattern.as_str());
        consumer
            .subscribe(&[subscription.as_str()])
            .map_err(map_kafka_error)?;

        info!(subscription = %subscription, "Kafka consumer subscribed");
        Ok(Box::new(KafkaConsumer { consumer }))
    }
}

struct KafkaProducer {
    producer: Option<FutureProducer>,
    request_timeout: Duration,
}

#[async_trait]
impl ProducerConnection for KafkaProducer {
    async fn send_and_wait(&mut self, topic: &str, payload: Bytes) -> Result<(), BrokerError> {
        let producer = self.producer.as_ref().ok_or(BrokerError::Closed)?;
        let record: FutureRecord<'_, (), [u8]> = FutureRecord::to(topic).payload(payload.as_ref());

        producer
            .send(record, Timeout::After(self.request_timeout))
            .await
            .map_err(|(e, _)| map_kafka_error(e))?;

        debug!(topic = %topic, "Kafka delivery acknowledged");
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), BrokerError> {
        if let Some(producer) = self.producer.take() {
            producer
                .flush(Timeout::After(self.request_timeout))
                .map_err(map_kafka_error)?;
        }
        Ok(())
    }
}

struct KafkaConsumer {
    consumer: BaseConsumer,
}

impl BrokerConsumer for KafkaConsumer {
    fn poll(&mut self, timeout: Duration) -> Result<Option<BrokerMessage>, BrokerError> {
        match self.consumer.poll(timeout) {
            None => Ok(None),
            Some(Ok(message)) => Ok(Some(BrokerMessage::new(
                message.topic(),
                Bytes::copy_from_slice(message.payload().unwrap_or_default()),
            ))),
            Some(Err(e)) => Err(map_kafka_error(e)),
        }
    }

    fn close(self: Box<Self>) {
        self.consumer.unsubscribe();
        if let Err(e) = self.consumer.unassign() {
            warn!(error = %e, "Kafka consumer unassign failed");
        }
    }
}
