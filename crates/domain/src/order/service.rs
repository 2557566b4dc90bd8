//! Order lifecycle service.

use common::{CustomerId, OrderId};

use crate::error::DomainError;
use crate::notifier::SagaNotifier;

use super::model::{Order, OrderLineItem};
use super::status::OrderStatus;
use super::store::OrderStore;

/// Reason attached to compensation triggered by direct cancellation.
const CANCEL_REASON: &str = "Customer cancellation";

/// The Order Lifecycle Manager.
///
/// Owns order state transitions and calls into the saga orchestrator
/// (through [`SagaNotifier`]) at the transition points that open or
/// roll back the order saga.
pub struct OrderService<S: OrderStore, N: SagaNotifier> {
    store: S,
    notifier: N,
}

impl<S: OrderStore, N: SagaNotifier> OrderService<S, N> {
    /// Creates a new order service.
    pub fn new(store: S, notifier: N) -> Self {
        Self { store, notifier }
    }

    /// Creates an order in `Pending` and starts its saga.
    ///
    /// Validation failures mutate nothing. The saga start publishes the
    /// `OrderCreated` event; a transport failure there is absorbed by
    /// the orchestrator, so a persisted order never rolls back because
    /// the bus was down.
    #[tracing::instrument(skip(self, items), fields(item_count = items.len()))]
    pub async fn create_order(
        &self,
        customer_id: CustomerId,
        items: Vec<OrderLineItem>,
    ) -> Result<Order, DomainError> {
        let order = Order::new(customer_id, items)?;
        let order_id = order.id;
        let total = order.total();

        self.store.insert(order.clone()).await?;
        self.notifier.start_order_saga(order_id, total).await?;

        metrics::counter!("orders_created_total").increment(1);
        tracing::info!(%order_id, total = %total, "order created");
        Ok(order)
    }

    /// Looks up an order by id.
    pub async fn get_order(&self, order_id: OrderId) -> Result<Order, DomainError> {
        self.store
            .get(order_id)
            .await?
            .ok_or(DomainError::NotFound(order_id))
    }

    /// Lists orders, optionally filtered by status.
    pub async fn list_orders(
        &self,
        status: Option<OrderStatus>,
    ) -> Result<Vec<Order>, DomainError> {
        self.store.list(status).await
    }

    /// Cancels a pending order and triggers saga compensation.
    ///
    /// Fails with `NotFound` for unknown orders and with
    /// `InvalidTransition` (no mutation) when the order has already
    /// left `Pending`.
    #[tracing::instrument(skip(self))]
    pub async fn cancel_order(&self, order_id: OrderId) -> Result<Order, DomainError> {
        let order = self
            .store
            .update(order_id, |order| {
                if !order.status.can_cancel() {
                    return Err(DomainError::InvalidTransition {
                        order_id,
                        from: order.status,
                        to: OrderStatus::Cancelled,
                    });
                }
                order.status = OrderStatus::Cancelled;
                Ok(())
            })
            .await?;

        self.notifier.compensate_order(order_id, CANCEL_REASON).await?;

        metrics::counter!("orders_cancelled_total").increment(1);
        tracing::info!(%order_id, "order cancelled");
        Ok(order)
    }

    /// Moves an order to a new status, validating the transition graph.
    #[tracing::instrument(skip(self))]
    pub async fn update_order_status(
        &self,
        order_id: OrderId,
        new_status: OrderStatus,
    ) -> Result<Order, DomainError> {
        self.store
            .update(order_id, |order| {
                if !order.status.can_transition_to(new_status) {
                    return Err(DomainError::InvalidTransition {
                        order_id,
                        from: order.status,
                        to: new_status,
                    });
                }
                order.status = new_status;
                Ok(())
            })
            .await
    }

    /// Moves every `Pending` order to `Processing`.
    ///
    /// Invoked on a fixed schedule. Idempotent: the scan only picks up
    /// orders still in `Pending`, so repeating it is a no-op.
    #[tracing::instrument(skip(self))]
    pub async fn advance_pending_to_processing(&self) -> Result<usize, DomainError> {
        let pending = self.store.list(Some(OrderStatus::Pending)).await?;
        let mut advanced = 0;

        for order in pending {
            let result = self
                .store
                .update(order.id, |o| {
                    // Another caller may have moved the order since the scan
                    if o.status != OrderStatus::Pending {
                        return Ok(());
                    }
                    o.status = OrderStatus::Processing;
                    Ok(())
                })
                .await;

            match result {
                Ok(updated) if updated.status == OrderStatus::Processing => advanced += 1,
                Ok(_) | Err(DomainError::NotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }

        if advanced > 0 {
            metrics::counter!("orders_advanced_total").increment(advanced as u64);
            tracing::info!(advanced, "advanced pending orders to processing");
        }
        Ok(advanced)
    }
}
