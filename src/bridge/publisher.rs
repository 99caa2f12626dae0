//! Outbound Bridge
//!
//! Host events are named `<namespace>::record::<record_topic>[::<state>]`
//! for record changes (stateless records omit the state segment) and
//! `<namespace>::webhook::...` for webhook-sourced events. The publisher
//! does not look inside that structure; the outbound pattern picks which
//! namespaces leave the process and the topic codec flattens the name for
//! the broker.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::Value;
use tracing::{debug, error, info};

use super::BridgeError;
use crate::broker::{BrokerClient, ClientOptions};
use crate::host::{Event, EventHandler, Profile};
use crate::metrics::BridgeMetrics;
use crate::topic::to_broker_topic;

/// Stable JSON encoding of an event payload
pub fn encode_payload(payload: &Value) -> Result<Bytes, BridgeError> {
    serde_json::to_vec(payload)
        .map(Bytes::from)
        .map_err(BridgeError::Encode)
}

/// Sends matching host events to the broker.
///
/// Holds no connection between calls, so concurrent `publish` calls share
/// nothing but the read-only options.
pub struct Publisher {
    client: Arc<dyn BrokerClient>,
    options: ClientOptions,
    metrics: Arc<BridgeMetrics>,
}

impl Publisher {
    pub fn new(
        client: Arc<dyn BrokerClient>,
        options: ClientOptions,
        metrics: Arc<BridgeMetrics>,
    ) -> Self {
        Self {
            client,
            options,
            metrics,
        }
    }

    /// Producer options this publisher connects with
    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    /// Send one event to the broker. Never fails: errors are logged and the
    /// event is dropped.
    pub async fn publish(&self, event: &Event) {
        let topic = to_broker_topic(&event.topic);
        let started = Instant::now();

        match self.try_publish(&topic, &event.payload).await {
            Ok(()) => {
                self.metrics
                    .outbound_published(started.elapsed().as_secs_f64());
            }
            Err(e) => {
                self.metrics.outbound_failed(started.elapsed().as_secs_f64());
                error!(topic = %topic, error = %e, "Producer failed sending a message");
            }
        }
    }

    /// Connect, send and always disconnect
    async fn try_publish(&self, topic: &str, payload: &Value) -> Result<(), BridgeError> {
        let mut connection = self.client.connect_producer(&self.options).await?;

        let sent = match encode_payload(payload) {
            Ok(body) => {
                info!(topic = %topic, payload = %payload, "Sending message");
                connection
                    .send_and_wait(topic, body)
                    .await
                    .map_err(BridgeError::from)
            }
            Err(e) => Err(e),
        };

        let closed = connection.disconnect().await;

        // Send errors take precedence over disconnect errors
        sent?;
        closed?;
        Ok(())
    }
}

#[async_trait]
impl EventHandler for Publisher {
    async fn handle(&self, profile: &Profile, event: &Event) {
        debug!(profile = %profile.name, topic = %event.topic, "Handling event");
        self.publish(event).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::{InMemoryBroker, BOOTSTRAP_SERVERS};
    use serde_json::json;

    fn publisher(broker: &InMemoryBroker) -> (Publisher, Arc<BridgeMetrics>) {
        let metrics = Arc::new(BridgeMetrics::new());
        let options = ClientOptions::from([(BOOTSTRAP_SERVERS.to_string(), "kafka".to_string())]);
        (
            Publisher::new(Arc::new(broker.clone()), options, metrics.clone()),
            metrics,
        )
    }

    #[test]
    fn test_encode_payload_is_compact_json() {
        let body = encode_payload(&json!({"x": 1, "y": [true, null]})).unwrap();
        assert_eq!(&body[..], br#"{"x":1,"y":[true,null]}"#);
    }

    #[tokio::test]
    async fn test_publish_translates_topic() {
        let broker = InMemoryBroker::new();
        let (publisher, metrics) = publisher(&broker);

        publisher
            .publish(&Event::new("acapy::record::connections::active", json!({"id": "c1"})))
            .await;

        let sent = broker.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].topic, "acapy-record-connections-active");
        let body: Value = serde_json::from_slice(&sent[0].payload).unwrap();
        assert_eq!(body, json!({"id": "c1"}));
        assert_eq!(metrics.outbound_published_total.get(), 1);
    }

    #[tokio::test]
    async fn test_publish_swallows_connect_failure() {
        let broker = InMemoryBroker::new();
        broker.fail_connections(true);
        let (publisher, metrics) = publisher(&broker);

        publisher.publish(&Event::new("a::b", json!({}))).await;

        assert!(broker.sent().is_empty());
        assert_eq!(broker.connections_opened(), 0);
        assert_eq!(metrics.outbound_failures_total.get(), 1);
    }

    #[tokio::test]
    async fn test_missing_bootstrap_fails_every_publish() {
        let broker = InMemoryBroker::new();
        let metrics = Arc::new(BridgeMetrics::new());
        let publisher = Publisher::new(
            Arc::new(broker.clone()),
            ClientOptions::new(),
            metrics.clone(),
        );

        publisher.publish(&Event::new("a::b", json!(1))).await;
        publisher.publish(&Event::new("a::c", json!(2))).await;

        assert_eq!(metrics.outbound_failures_total.get(), 2);
        assert_eq!(metrics.outbound_published_total.get(), 0);
    }
}
