//! Idempotent event consumer.

use crate::bus::{Delivery, EventBus, Subscription};
use crate::error::Result;
use crate::events::EventPayload;
use crate::ledger::ProcessedEventLedger;
use crate::orchestrator::SagaOrchestrator;
use crate::store::SagaStore;

/// Consumes lifecycle and compensation events and drives the
/// orchestrator.
///
/// Deduplicates through the processed-event ledger: a delivery whose
/// event id is already recorded is acknowledged and dropped. For new
/// events the ordering is fixed — domain action, then ledger record,
/// then acknowledgment — so a crash before the acknowledgment leads to
/// a redelivery that the ledger check absorbs.
#[derive(Clone)]
pub struct EventConsumer<S, B, L> {
    orchestrator: SagaOrchestrator<S, B>,
    ledger: L,
}

impl<S, B, L> EventConsumer<S, B, L>
where
    S: SagaStore,
    B: EventBus,
    L: ProcessedEventLedger,
{
    /// Creates a new consumer over the orchestrator and ledger.
    pub fn new(orchestrator: SagaOrchestrator<S, B>, ledger: L) -> Self {
        Self {
            orchestrator,
            ledger,
        }
    }

    /// Handles one delivery.
    ///
    /// Errors mean the domain action or a store write failed; the
    /// delivery is then left unacknowledged so the transport
    /// redelivers it.
    #[tracing::instrument(skip(self, delivery), fields(event_id = %delivery.event.event_id, event_type = delivery.event.event_type()))]
    pub async fn handle(&self, delivery: Delivery) -> Result<()> {
        let event = &delivery.event;

        if self.ledger.contains(event.event_id).await? {
            tracing::info!(order_id = %event.order_id, "duplicate event, skipping");
            metrics::counter!("duplicate_events_total").increment(1);
            delivery.ack.ack();
            return Ok(());
        }

        match &event.payload {
            EventPayload::OrderCreated { total_amount } => {
                tracing::info!(
                    order_id = %event.order_id, total = %total_amount,
                    "processing OrderCreated"
                );
                self.orchestrator.complete_saga(event.order_id).await?;
            }
            EventPayload::OrderCancelled { reason } => {
                tracing::info!(
                    order_id = %event.order_id, reason,
                    "processing OrderCancelled"
                );
                self.orchestrator.mark_compensated(event.order_id).await?;
            }
        }

        self.ledger.record(event.event_id, event.event_type()).await?;
        delivery.ack.ack();

        metrics::counter!("events_processed_total").increment(1);
        Ok(())
    }

    /// Consumes deliveries from a subscription until the bus closes.
    ///
    /// A failed delivery is logged and left unacknowledged; the loop
    /// keeps going.
    pub async fn run(self, mut subscription: Subscription) {
        while let Some(delivery) = subscription.recv().await {
            let event_id = delivery.event.event_id;
            if let Err(e) = self.handle(delivery).await {
                tracing::error!(%event_id, error = %e, "event handling failed, awaiting redelivery");
            }
        }
        tracing::info!("event subscription closed, consumer stopping");
    }
}
