//! Saga orchestrator.

use async_trait::async_trait;
use chrono::Utc;
use common::{Money, OrderId, SagaId};
use domain::{DomainError, SagaNotifier};

use crate::bus::EventBus;
use crate::error::Result;
use crate::events::DomainEvent;
use crate::instance::SagaInstance;
use crate::store::SagaStore;

/// Coordination hub for the order saga.
///
/// Starts a saga per order, transitions saga state, and emits domain
/// events. Saga store failures propagate to the caller; event publish
/// failures are logged and swallowed, because the persisted `Started`
/// record is what the timeout monitor uses to recover from a lost
/// event.
#[derive(Clone)]
pub struct SagaOrchestrator<S, B> {
    store: S,
    bus: B,
}

impl<S: SagaStore, B: EventBus> SagaOrchestrator<S, B> {
    /// Creates a new orchestrator over the saga store and event bus.
    pub fn new(store: S, bus: B) -> Self {
        Self { store, bus }
    }

    /// Starts a saga for a newly created order.
    ///
    /// Persists a `Started` instance, then publishes `OrderCreated`.
    /// Callers must not double-invoke: a second call creates an
    /// independent instance (observed and logged, not prevented).
    #[tracing::instrument(skip(self))]
    pub async fn start_order_saga(
        &self,
        order_id: OrderId,
        total_amount: Money,
    ) -> Result<SagaId> {
        if self.store.has_active_for_order(order_id).await? {
            tracing::warn!(%order_id, "active saga already exists for order, starting another");
        }

        let saga = SagaInstance::start(order_id);
        let saga_id = saga.saga_id;
        self.store.insert(saga).await?;
        metrics::counter!("sagas_started_total").increment(1);

        let event = DomainEvent::order_created(order_id, total_amount);
        if let Err(e) = self.bus.publish(&event).await {
            tracing::warn!(
                %order_id, %saga_id, error = %e,
                "failed to publish OrderCreated; saga stays Started for the timeout monitor"
            );
        }

        tracing::info!(%order_id, %saga_id, total = %total_amount, "saga started");
        Ok(saga_id)
    }

    /// Moves the order's saga into compensation and publishes
    /// `OrderCancelled`.
    ///
    /// The event is published even when no saga record exists, so a
    /// redundant call (timeout monitor plus direct cancellation) is
    /// safe.
    #[tracing::instrument(skip(self))]
    pub async fn compensate_order(&self, order_id: OrderId, reason: &str) -> Result<()> {
        let updated = self
            .store
            .update_latest_by_order(order_id, |saga| saga.begin_compensation())
            .await?;

        match updated {
            Some(saga) => {
                metrics::counter!("sagas_compensating_total").increment(1);
                tracing::info!(%order_id, saga_id = %saga.saga_id, reason, "saga compensating");
            }
            None => {
                tracing::debug!(%order_id, "no saga to move to compensating, publishing anyway");
            }
        }

        let event = DomainEvent::order_cancelled(order_id, reason);
        if let Err(e) = self.bus.publish(&event).await {
            tracing::warn!(%order_id, error = %e, "failed to publish OrderCancelled");
        }
        Ok(())
    }

    /// Marks the order's saga `Completed` after downstream success.
    ///
    /// A missing saga is benign: the event arrived for an order this
    /// process never tracked.
    #[tracing::instrument(skip(self))]
    pub async fn complete_saga(&self, order_id: OrderId) -> Result<()> {
        let updated = self
            .store
            .update_latest_by_order(order_id, |saga| saga.complete(Utc::now()))
            .await?;

        match updated {
            Some(saga) => {
                metrics::counter!("sagas_completed_total").increment(1);
                tracing::info!(%order_id, saga_id = %saga.saga_id, "saga completed");
            }
            None => tracing::debug!(%order_id, "no saga eligible for completion"),
        }
        Ok(())
    }

    /// Marks the order's saga `Compensated` after the downstream
    /// compensation is acknowledged. Missing saga is benign.
    #[tracing::instrument(skip(self))]
    pub async fn mark_compensated(&self, order_id: OrderId) -> Result<()> {
        let updated = self
            .store
            .update_latest_by_order(order_id, |saga| saga.mark_compensated(Utc::now()))
            .await?;

        match updated {
            Some(saga) => {
                metrics::counter!("sagas_compensated_total").increment(1);
                tracing::info!(%order_id, saga_id = %saga.saga_id, "saga compensated");
            }
            None => tracing::debug!(%order_id, "no saga eligible for compensation ack"),
        }
        Ok(())
    }

    /// Returns the live saga for an order.
    pub async fn get_saga(&self, order_id: OrderId) -> Result<Option<SagaInstance>> {
        self.store.find_latest_by_order(order_id).await
    }
}

#[async_trait]
impl<S: SagaStore, B: EventBus> SagaNotifier for SagaOrchestrator<S, B> {
    async fn start_order_saga(
        &self,
        order_id: OrderId,
        total_amount: Money,
    ) -> std::result::Result<(), DomainError> {
        SagaOrchestrator::start_order_saga(self, order_id, total_amount)
            .await
            .map(|_| ())
            .map_err(|e| DomainError::Saga(e.to_string()))
    }

    async fn compensate_order(
        &self,
        order_id: OrderId,
        reason: &str,
    ) -> std::result::Result<(), DomainError> {
        SagaOrchestrator::compensate_order(self, order_id, reason)
            .await
            .map_err(|e| DomainError::Saga(e.to_string()))
    }
}
