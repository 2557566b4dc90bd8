//! Domain events published on the event bus.

use chrono::{DateTime, Utc};
use common::{EventId, Money, OrderId};
use serde::{Deserialize, Serialize};

use crate::bus::{ORDER_COMPENSATION_TOPIC, ORDER_EVENTS_TOPIC};

/// A lifecycle event keyed by order id.
///
/// The envelope carries the shared fields; the payload is a tagged
/// union of the event variants. Immutable once emitted; `event_id` is
/// the deduplication key in the processed-event ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainEvent {
    /// Unique event identifier, generated at emission.
    pub event_id: EventId,

    /// When the event was emitted.
    pub timestamp: DateTime<Utc>,

    /// The order this event belongs to. Also the partition key, so
    /// events for one order arrive in publish order.
    pub order_id: OrderId,

    /// Variant-specific payload.
    pub payload: EventPayload,
}

/// Event variants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum EventPayload {
    /// An order was created and its saga started.
    OrderCreated {
        /// Derived order total.
        total_amount: Money,
    },

    /// An order was cancelled and its saga is compensating.
    OrderCancelled {
        /// Why the compensation was triggered.
        reason: String,
    },
}

impl DomainEvent {
    /// Creates an `OrderCreated` event.
    pub fn order_created(order_id: OrderId, total_amount: Money) -> Self {
        Self {
            event_id: EventId::new(),
            timestamp: Utc::now(),
            order_id,
            payload: EventPayload::OrderCreated { total_amount },
        }
    }

    /// Creates an `OrderCancelled` event.
    pub fn order_cancelled(order_id: OrderId, reason: impl Into<String>) -> Self {
        Self {
            event_id: EventId::new(),
            timestamp: Utc::now(),
            order_id,
            payload: EventPayload::OrderCancelled {
                reason: reason.into(),
            },
        }
    }

    /// Returns the event type tag.
    pub fn event_type(&self) -> &'static str {
        match self.payload {
            EventPayload::OrderCreated { .. } => "OrderCreated",
            EventPayload::OrderCancelled { .. } => "OrderCancelled",
        }
    }

    /// Returns the bus topic this event is published on.
    pub fn topic(&self) -> &'static str {
        match self.payload {
            EventPayload::OrderCreated { .. } => ORDER_EVENTS_TOPIC,
            EventPayload::OrderCancelled { .. } => ORDER_COMPENSATION_TOPIC,
        }
    }
}
