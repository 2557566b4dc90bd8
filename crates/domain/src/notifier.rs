//! Seam between the order lifecycle and the saga orchestrator.

use async_trait::async_trait;
use common::{Money, OrderId};

use crate::error::DomainError;

/// Saga hooks invoked by the order lifecycle at transition points.
///
/// Implemented by the saga orchestrator. Failures returned here are
/// saga-store persistence failures and abort the calling operation;
/// event transport failures are absorbed behind this seam.
#[async_trait]
pub trait SagaNotifier: Send + Sync {
    /// Starts the order saga after an order is created.
    async fn start_order_saga(
        &self,
        order_id: OrderId,
        total_amount: Money,
    ) -> Result<(), DomainError>;

    /// Triggers saga compensation for a cancelled order.
    async fn compensate_order(&self, order_id: OrderId, reason: &str) -> Result<(), DomainError>;
}
