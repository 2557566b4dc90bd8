//! Event bus abstraction and in-memory implementation.
//!
//! The bus is an ordered, partitioned, at-least-once transport keyed
//! by order id. The in-memory implementation backs tests and the
//! reference wiring; a production deployment would put a Kafka-style
//! broker behind the same trait.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::events::DomainEvent;

/// Topic carrying `OrderCreated` events.
pub const ORDER_EVENTS_TOPIC: &str = "order-events";

/// Topic carrying `OrderCancelled` compensation events.
pub const ORDER_COMPENSATION_TOPIC: &str = "order-compensation";

/// Event transport failure.
///
/// Never rolls back local state: the business operation that already
/// persisted its own record succeeds regardless, and the timeout
/// monitor recovers from the lost event.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Publishing to a topic failed.
    #[error("publish to '{topic}' failed: {reason}")]
    Publish { topic: String, reason: String },
}

/// Publish side of the event bus.
#[async_trait]
pub trait EventBus: Send + Sync {
    /// Publishes an event on its topic, keyed by order id.
    async fn publish(&self, event: &DomainEvent) -> Result<(), TransportError>;
}

/// Acknowledgment handle for a single delivery.
///
/// At-least-once semantics: a delivery that is never acknowledged is
/// redelivered by the transport. Acknowledging twice is a no-op.
#[derive(Debug, Clone)]
pub struct AckHandle {
    acked: Arc<AtomicBool>,
    counter: Arc<AtomicU64>,
}

impl AckHandle {
    fn new(counter: Arc<AtomicU64>) -> Self {
        Self {
            acked: Arc::new(AtomicBool::new(false)),
            counter,
        }
    }

    /// Acknowledges the delivery.
    pub fn ack(&self) {
        if !self.acked.swap(true, Ordering::SeqCst) {
            self.counter.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Returns true if this delivery has been acknowledged.
    pub fn is_acked(&self) -> bool {
        self.acked.load(Ordering::SeqCst)
    }
}

/// A delivered event with its acknowledgment handle.
#[derive(Debug)]
pub struct Delivery {
    /// The delivered event.
    pub event: DomainEvent,
    /// Handle to acknowledge the delivery.
    pub ack: AckHandle,
}

/// Receiving side of a topic subscription.
pub type Subscription = UnboundedReceiver<Delivery>;

#[derive(Default)]
struct BusInner {
    senders: HashMap<String, UnboundedSender<Delivery>>,
    published: Vec<(String, DomainEvent)>,
    fail_on_publish: bool,
}

/// In-memory event bus.
///
/// One subscriber per topic, mirroring a single consumer instance per
/// partition group. Events published before any subscription exists
/// are recorded but not delivered, which is how tests simulate a lost
/// event.
#[derive(Clone, Default)]
pub struct InMemoryEventBus {
    inner: Arc<Mutex<BusInner>>,
    acks: Arc<AtomicU64>,
}

impl InMemoryEventBus {
    /// Creates a new bus with no subscriptions.
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes to a topic, replacing any previous subscriber.
    pub fn subscribe(&self, topic: &str) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner.lock().unwrap().senders.insert(topic.to_string(), tx);
        rx
    }

    /// Configures the next publishes to fail.
    pub fn set_fail_on_publish(&self, fail: bool) {
        self.inner.lock().unwrap().fail_on_publish = fail;
    }

    /// Returns the events published on a topic, in publish order.
    pub fn published_on(&self, topic: &str) -> Vec<DomainEvent> {
        self.inner
            .lock()
            .unwrap()
            .published
            .iter()
            .filter(|(t, _)| t == topic)
            .map(|(_, e)| e.clone())
            .collect()
    }

    /// Returns the number of acknowledged deliveries.
    pub fn ack_count(&self) -> u64 {
        self.acks.load(Ordering::SeqCst)
    }

    /// Wraps an event in a delivery with a fresh acknowledgment handle.
    ///
    /// Lets tests hand the same event to a consumer more than once,
    /// simulating at-least-once redelivery.
    pub fn delivery(&self, event: DomainEvent) -> Delivery {
        Delivery {
            event,
            ack: AckHandle::new(self.acks.clone()),
        }
    }

    /// Redelivers an event to the topic's subscriber, bypassing the
    /// publish history.
    pub fn redeliver(&self, event: &DomainEvent) {
        let inner = self.inner.lock().unwrap();
        if let Some(tx) = inner.senders.get(event.topic()) {
            let _ = tx.send(Delivery {
                event: event.clone(),
                ack: AckHandle::new(self.acks.clone()),
            });
        }
    }
}

#[async_trait]
impl EventBus for InMemoryEventBus {
    async fn publish(&self, event: &DomainEvent) -> Result<(), TransportError> {
        let topic = event.topic();
        let mut inner = self.inner.lock().unwrap();

        if inner.fail_on_publish {
            return Err(TransportError::Publish {
                topic: topic.to_string(),
                reason: "simulated transport failure".to_string(),
            });
        }

        inner.published.push((topic.to_string(), event.clone()));
        if let Some(tx) = inner.senders.get(topic) {
            // A dropped subscription just means no active consumer
            let _ = tx.send(Delivery {
                event: event.clone(),
                ack: AckHandle::new(self.acks.clone()),
            });
        }

        metrics::counter!("events_published_total", "topic" => topic).increment(1);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{Money, OrderId};

    #[tokio::test]
    async fn test_publish_and_receive() {
        let bus = InMemoryEventBus::new();
        let mut sub = bus.subscribe(ORDER_EVENTS_TOPIC);

        let event = DomainEvent::order_created(OrderId::new(), Money::from_cents(100));
        bus.publish(&event).await.unwrap();

        let delivery = sub.recv().await.unwrap();
        assert_eq!(delivery.event, event);
        assert!(!delivery.ack.is_acked());
    }

    #[tokio::test]
    async fn test_publish_without_subscriber_is_recorded_not_delivered() {
        let bus = InMemoryEventBus::new();
        let event = DomainEvent::order_created(OrderId::new(), Money::from_cents(100));
        bus.publish(&event).await.unwrap();

        assert_eq!(bus.published_on(ORDER_EVENTS_TOPIC), vec![event]);
    }

    #[tokio::test]
    async fn test_topics_are_independent() {
        let bus = InMemoryEventBus::new();
        let mut compensation = bus.subscribe(ORDER_COMPENSATION_TOPIC);

        let order_id = OrderId::new();
        bus.publish(&DomainEvent::order_created(order_id, Money::zero()))
            .await
            .unwrap();
        bus.publish(&DomainEvent::order_cancelled(order_id, "test"))
            .await
            .unwrap();

        let delivery = compensation.recv().await.unwrap();
        assert_eq!(delivery.event.event_type(), "OrderCancelled");
    }

    #[tokio::test]
    async fn test_fail_on_publish() {
        let bus = InMemoryEventBus::new();
        bus.set_fail_on_publish(true);

        let event = DomainEvent::order_created(OrderId::new(), Money::zero());
        let result = bus.publish(&event).await;
        assert!(matches!(result, Err(TransportError::Publish { .. })));
        assert!(bus.published_on(ORDER_EVENTS_TOPIC).is_empty());
    }

    #[tokio::test]
    async fn test_ack_counted_once_per_delivery() {
        let bus = InMemoryEventBus::new();
        let event = DomainEvent::order_created(OrderId::new(), Money::zero());

        let first = bus.delivery(event.clone());
        let second = bus.delivery(event);

        first.ack.ack();
        first.ack.ack();
        second.ack.ack();

        assert_eq!(bus.ack_count(), 2);
        assert!(first.ack.is_acked());
    }
}
