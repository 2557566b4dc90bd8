//! Order lifecycle domain.
//!
//! Owns the order state machine (Pending → Processing → Shipped →
//! Delivered, with cancellation only while Pending) and the
//! `OrderService` that mutates the order store and notifies the saga
//! orchestrator at transition points.

pub mod error;
pub mod notifier;
pub mod order;

pub use error::DomainError;
pub use notifier::SagaNotifier;
pub use order::model::{Order, OrderLineItem};
pub use order::service::OrderService;
pub use order::status::OrderStatus;
pub use order::store::{InMemoryOrderStore, OrderStore};
