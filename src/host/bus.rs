//! Host event bus contract and an in-process implementation

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::trace;

use super::event::{Event, Profile};
use crate::topic::TopicPattern;

/// Callback invoked for every event whose topic matches a subscription.
///
/// Dispatch is fire-and-forget: a handler has no way to report failure back
/// to the bus, so it must deal with its own errors.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, profile: &Profile, event: &Event);
}

/// Host bus contract: pattern subscription and emit
#[async_trait]
pub trait EventBus: Send + Sync {
    /// Register a handler for every event whose full topic matches `pattern`
    fn subscribe(&self, pattern: TopicPattern, handler: Arc<dyn EventHandler>);

    /// Dispatch an event to all matching handlers
    async fn emit(&self, profile: &Profile, event: Event);
}

/// In-process event bus.
///
/// Handlers are invoked sequentially, in subscription order, on the task
/// that called `emit`.
pub struct LocalEventBus {
    subscriptions: RwLock<Vec<(TopicPattern, Arc<dyn EventHandler>)>>,
}

impl LocalEventBus {
    pub fn new() -> Self {
        Self {
            subscriptions: RwLock::new(Vec::new()),
        }
    }

    /// Number of registered subscriptions
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.read().len()
    }
}

impl Default for LocalEventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventBus for LocalEventBus {
    fn subscribe(&self, pattern: TopicPattern, handler: Arc<dyn EventHandler>) {
        self.subscriptions.write().push((pattern, handler));
    }

    async fn emit(&self, profile: &Profile, event: Event) {
        // Collect handlers first to avoid holding lock across await
        let handlers: Vec<_> = self
            .subscriptions
            .read()
            .iter()
            .filter(|(pattern, _)| pattern.is_match(&event.topic))
            .map(|(_, handler)| handler.clone())
            .collect();

        trace!(topic = %event.topic, handlers = handlers.len(), "Dispatching event");

        for handler in handlers {
            handler.handle(profile, &event).await;
        }
    }
}
