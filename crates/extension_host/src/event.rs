//! Topic-based event bus shared with every module and plugin

use crate::error::EventError;
use async_trait::async_trait;
use dashmap::DashMap;
use futures::stream::{FuturesUnordered, StreamExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use smallvec::SmallVec;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error};
use uuid::Uuid;

/// Identifier returned by [`EventBus::subscribe`], used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(Uuid);

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A published event as seen by handlers
#[derive(Debug, Clone)]
pub struct EventData {
    /// Topic the event was published on
    pub topic: String,
    /// JSON payload
    pub payload: serde_json::Value,
    /// Event metadata
    pub metadata: HashMap<String, String>,
}

impl EventData {
    /// Create new event data from a topic and payload
    pub fn new(topic: &str, payload: serde_json::Value) -> Self {
        Self {
            topic: topic.to_string(),
            payload,
            metadata: HashMap::new(),
        }
    }

    /// Deserialize the payload to a specific type
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T, EventError> {
        serde_json::from_value(self.payload.clone())
            .map_err(|e| EventError::DeserializationFailed(e.to_string()))
    }

    /// Add metadata to the event
    pub fn with_metadata(mut self, key: &str, value: &str) -> Self {
        self.metadata.insert(key.to_string(), value.to_string());
        self
    }
}

/// Trait for event handlers
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Handle an event
    async fn handle(&self, event: &EventData) -> Result<(), EventError>;

    /// Get handler name for debugging
    fn handler_name(&self) -> &str;
}

/// Closure-backed handler
struct FnEventHandler<F>
where
    F: Fn(&EventData) -> Result<(), EventError> + Send + Sync + 'static,
{
    handler: F,
    name: String,
}

#[async_trait]
impl<F> EventHandler for FnEventHandler<F>
where
    F: Fn(&EventData) -> Result<(), EventError> + Send + Sync + 'static,
{
    async fn handle(&self, event: &EventData) -> Result<(), EventError> {
        (self.handler)(event)
    }

    fn handler_name(&self) -> &str {
        &self.name
    }
}

/// Statistics for event bus monitoring
#[derive(Debug, Clone, Default)]
pub struct EventStats {
    pub events_published: u64,
    pub events_handled: u64,
    pub handler_failures: u64,
    pub total_handlers: usize,
}

#[derive(Clone)]
struct Subscription {
    id: SubscriptionId,
    handler: Arc<dyn EventHandler>,
}

/// Publish/subscribe bus keyed by topic
pub struct EventBus {
    /// Subscriptions organized by topic
    handlers: DashMap<String, SmallVec<[Subscription; 4]>>,
    /// Statistics
    stats: Arc<tokio::sync::RwLock<EventStats>>,
}

impl EventBus {
    /// Create an empty event bus
    pub fn new() -> Self {
        Self {
            handlers: DashMap::new(),
            stats: Arc::new(tokio::sync::RwLock::new(EventStats::default())),
        }
    }

    /// Subscribe a handler object to a topic
    pub async fn subscribe_handler(
        &self,
        topic: &str,
        handler: Arc<dyn EventHandler>,
    ) -> Result<SubscriptionId, EventError> {
        if topic.trim().is_empty() {
            return Err(EventError::InvalidTopic(topic.to_string()));
        }

        let id = SubscriptionId(Uuid::new_v4());
        self.handlers
            .entry(topic.to_string())
            .or_default()
            .push(Subscription { id, handler });

        let mut stats = self.stats.write().await;
        stats.total_handlers += 1;

        debug!("Subscribed {} to topic '{}'", id, topic);
        Ok(id)
    }

    /// Subscribe a closure to a topic
    pub async fn subscribe<F>(&self, topic: &str, handler: F) -> Result<SubscriptionId, EventError>
    where
        F: Fn(&EventData) -> Result<(), EventError> + Send + Sync + 'static,
    {
        let handler = FnEventHandler {
            handler,
            name: format!("{}::handler", topic),
        };
        self.subscribe_handler(topic, Arc::new(handler)).await
    }

    /// Subscribe with a typed payload; events that do not deserialize are reported as failures
    pub async fn subscribe_typed<T, F>(
        &self,
        topic: &str,
        handler: F,
    ) -> Result<SubscriptionId, EventError>
    where
        T: DeserializeOwned + 'static,
        F: Fn(T) -> Result<(), EventError> + Send + Sync + 'static,
    {
        self.subscribe(topic, move |event: &EventData| {
            let payload = event.deserialize::<T>()?;
            handler(payload)
        })
        .await
    }

    /// Remove a subscription. Returns false if the id is unknown.
    pub async fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut removed = false;
        for mut entry in self.handlers.iter_mut() {
            let before = entry.value().len();
            entry.value_mut().retain(|s| s.id != id);
            if entry.value().len() != before {
                removed = true;
                break;
            }
        }
        self.handlers.retain(|_, subs| !subs.is_empty());

        if removed {
            let mut stats = self.stats.write().await;
            stats.total_handlers = stats.total_handlers.saturating_sub(1);
        }
        removed
    }

    /// Publish a JSON payload; returns the number of handlers that succeeded
    pub async fn publish(&self, topic: &str, payload: serde_json::Value) -> Result<usize, EventError> {
        if topic.trim().is_empty() {
            return Err(EventError::InvalidTopic(topic.to_string()));
        }

        let event = Arc::new(EventData::new(topic, payload));
        let subscriptions = self.handlers.get(topic).map(|entry| entry.value().clone());

        let mut success_count = 0u64;
        let mut failure_count = 0u64;

        if let Some(subscriptions) = subscriptions {
            debug!("Publishing '{}' to {} handlers", topic, subscriptions.len());

            let mut futures = FuturesUnordered::new();
            for subscription in subscriptions.iter() {
                let handler = subscription.handler.clone();
                let event = event.clone();
                futures.push(async move {
                    if let Err(e) = handler.handle(&event).await {
                        error!("Handler {} failed: {}", handler.handler_name(), e);
                        return Err(e);
                    }
                    Ok(())
                });
            }

            while let Some(result) = futures.next().await {
                match result {
                    Ok(_) => success_count += 1,
                    Err(_) => failure_count += 1,
                }
            }
        } else {
            debug!("No handlers for topic: {}", topic);
        }

        let mut stats = self.stats.write().await;
        stats.events_published += 1;
        stats.events_handled += success_count;
        stats.handler_failures += failure_count;

        Ok(success_count as usize)
    }

    /// Publish any serializable payload
    pub async fn publish_typed<T: Serialize>(&self, topic: &str, payload: &T) -> Result<usize, EventError> {
        let value = serde_json::to_value(payload)?;
        self.publish(topic, value).await
    }

    /// Get current statistics
    pub async fn stats(&self) -> EventStats {
        self.stats.read().await.clone()
    }

    /// Number of handlers subscribed to a topic
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.handlers.get(topic).map(|entry| entry.len()).unwrap_or(0)
    }

    /// Get all topics with at least one subscriber
    pub fn topics(&self) -> Vec<String> {
        self.handlers.iter().map(|entry| entry.key().clone()).collect()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_publish_reaches_subscribers() {
        let bus = EventBus::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let counter = hits.clone();
        bus.subscribe("project.opened", move |_event| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .await
        .unwrap();

        let delivered = bus
            .publish("project.opened", serde_json::json!({ "path": "/tmp/demo" }))
            .await
            .unwrap();

        assert_eq!(delivered, 1);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_typed_subscription() {
        #[derive(serde::Deserialize)]
        struct Opened {
            path: String,
        }

        let bus = EventBus::new();
        let seen = Arc::new(std::sync::Mutex::new(String::new()));
        let sink = seen.clone();
        bus.subscribe_typed("project.opened", move |event: Opened| {
            *sink.lock().unwrap() = event.path;
            Ok(())
        })
        .await
        .unwrap();

        bus.publish_typed("project.opened", &serde_json::json!({ "path": "/work" }))
            .await
            .unwrap();

        assert_eq!(seen.lock().unwrap().as_str(), "/work");
    }

    #[tokio::test]
    async fn test_handler_failure_is_counted_not_propagated() {
        let bus = EventBus::new();
        bus.subscribe("broken", |_event| {
            Err(EventError::HandlerExecutionFailed("boom".to_string()))
        })
        .await
        .unwrap();

        let delivered = bus.publish("broken", serde_json::Value::Null).await.unwrap();
        assert_eq!(delivered, 0);

        let stats = bus.stats().await;
        assert_eq!(stats.events_published, 1);
        assert_eq!(stats.handler_failures, 1);
    }

    #[tokio::test]
    async fn test_unsubscribe() {
        let bus = EventBus::new();
        let id = bus.subscribe("topic", |_event| Ok(())).await.unwrap();
        assert_eq!(bus.subscriber_count("topic"), 1);

        assert!(bus.unsubscribe(id).await);
        assert_eq!(bus.subscriber_count("topic"), 0);
        assert!(!bus.unsubscribe(id).await);
        assert!(bus.topics().is_empty());
    }

    #[tokio::test]
    async fn test_empty_topic_rejected() {
        let bus = EventBus::new();
        assert!(bus.subscribe("  ", |_event| Ok(())).await.is_err());
        assert!(bus.publish("", serde_json::Value::Null).await.is_err());
    }
}
