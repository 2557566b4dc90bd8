//! Saga orchestration for the order lifecycle.
//!
//! Coordinates the create/compensate business transaction across
//! downstream services over an at-least-once event bus:
//!
//! - the [`SagaOrchestrator`] starts a saga per order and publishes
//!   lifecycle events,
//! - the [`EventConsumer`] consumes completion/compensation events
//!   idempotently via the processed-event ledger,
//! - the [`TimeoutMonitor`] detects sagas stuck in `Started` and
//!   forces compensation.

pub mod bus;
pub mod consumer;
pub mod error;
pub mod events;
pub mod instance;
pub mod ledger;
pub mod monitor;
pub mod orchestrator;
pub mod status;
pub mod store;

pub use bus::{
    AckHandle, Delivery, EventBus, InMemoryEventBus, Subscription, TransportError,
    ORDER_COMPENSATION_TOPIC, ORDER_EVENTS_TOPIC,
};
pub use consumer::EventConsumer;
pub use error::SagaError;
pub use events::{DomainEvent, EventPayload};
pub use instance::SagaInstance;
pub use ledger::{InMemoryProcessedEventLedger, ProcessedEventLedger};
pub use monitor::TimeoutMonitor;
pub use orchestrator::SagaOrchestrator;
pub use status::SagaStatus;
pub use store::{InMemorySagaStore, SagaStore};
