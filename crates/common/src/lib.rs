//! Shared kernel for the order management system.
//!
//! Typed identifiers, money arithmetic, and the circuit breaker used
//! to wrap service operations.

pub mod circuit_breaker;
pub mod money;
pub mod types;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError, CircuitState};
pub use money::Money;
pub use types::{CustomerId, EventId, OrderId, SagaId};
