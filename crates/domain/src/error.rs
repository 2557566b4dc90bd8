//! Domain error types.

use common::OrderId;
use thiserror::Error;

use crate::order::status::OrderStatus;

/// Errors that can occur during order lifecycle operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// Malformed request data; no state was mutated.
    #[error("order validation failed: {0}")]
    Validation(String),

    /// Unknown order.
    #[error("order not found: {0}")]
    NotFound(OrderId),

    /// Illegal status transition; no state was mutated.
    #[error("invalid state transition for order {order_id}: {from} -> {to}")]
    InvalidTransition {
        order_id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
    },

    /// Order store failure. Fatal to the calling operation.
    #[error("order store error: {0}")]
    Store(String),

    /// Saga orchestration failure (saga store write failed).
    ///
    /// Transport failures never surface here; the orchestrator
    /// swallows them and the timeout monitor recovers.
    #[error("saga orchestration error: {0}")]
    Saga(String),
}
