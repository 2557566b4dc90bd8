//! End-to-end tests for the order saga.

use chrono::{Duration, Utc};
use common::{CustomerId, Money, OrderId};
use domain::{InMemoryOrderStore, OrderLineItem, OrderService, OrderStatus};
use saga::{
    DomainEvent, EventConsumer, InMemoryEventBus, InMemoryProcessedEventLedger, InMemorySagaStore,
    ProcessedEventLedger, SagaOrchestrator, SagaStatus, SagaStore, TimeoutMonitor,
    ORDER_COMPENSATION_TOPIC, ORDER_EVENTS_TOPIC,
};

type Orchestrator = SagaOrchestrator<InMemorySagaStore, InMemoryEventBus>;
type Consumer = EventConsumer<InMemorySagaStore, InMemoryEventBus, InMemoryProcessedEventLedger>;

struct TestHarness {
    order_service: OrderService<InMemoryOrderStore, Orchestrator>,
    orchestrator: Orchestrator,
    consumer: Consumer,
    saga_store: InMemorySagaStore,
    bus: InMemoryEventBus,
    ledger: InMemoryProcessedEventLedger,
}

impl TestHarness {
    fn new() -> Self {
        let saga_store = InMemorySagaStore::new();
        let bus = InMemoryEventBus::new();
        let ledger = InMemoryProcessedEventLedger::new();
        let orchestrator = SagaOrchestrator::new(saga_store.clone(), bus.clone());
        let consumer = EventConsumer::new(orchestrator.clone(), ledger.clone());
        let order_service = OrderService::new(InMemoryOrderStore::new(), orchestrator.clone());

        Self {
            order_service,
            orchestrator,
            consumer,
            saga_store,
            bus,
            ledger,
        }
    }

    fn monitor(&self, timeout: Duration) -> TimeoutMonitor<InMemorySagaStore, InMemoryEventBus> {
        TimeoutMonitor::new(self.saga_store.clone(), self.orchestrator.clone(), timeout)
    }

    /// Delivers every undelivered event on a topic to the consumer.
    async fn drain(&self, topic: &str, from: usize) -> usize {
        let events = self.bus.published_on(topic);
        for event in &events[from..] {
            self.consumer
                .handle(self.bus.delivery(event.clone()))
                .await
                .unwrap();
        }
        events.len()
    }
}

fn line_item(quantity: u32, cents: i64) -> OrderLineItem {
    OrderLineItem::new("Widget", quantity, Money::from_cents(cents))
}

#[tokio::test]
async fn test_create_consume_complete_then_cancel_path() {
    let h = TestHarness::new();

    // Create: one item, qty 2 at $25.50
    let order = h
        .order_service
        .create_order(CustomerId::new(), vec![line_item(2, 2550)])
        .await
        .unwrap();
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.total().cents(), 5100);

    // Exactly one OrderCreated published
    let created = h.bus.published_on(ORDER_EVENTS_TOPIC);
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].order_id, order.id);

    // Consumer receives it: saga completes
    h.drain(ORDER_EVENTS_TOPIC, 0).await;
    let saga = h.orchestrator.get_saga(order.id).await.unwrap().unwrap();
    assert_eq!(saga.status, SagaStatus::Completed);

    // Cancel before processing begins: order cancelled, saga compensating
    let cancelled = h.order_service.cancel_order(order.id).await.unwrap();
    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    let saga = h.orchestrator.get_saga(order.id).await.unwrap().unwrap();
    assert_eq!(saga.status, SagaStatus::Compensating);

    // One OrderCancelled published and consumed: saga compensated
    h.drain(ORDER_COMPENSATION_TOPIC, 0).await;
    let saga = h.orchestrator.get_saga(order.id).await.unwrap().unwrap();
    assert_eq!(saga.status, SagaStatus::Compensated);
}

#[tokio::test]
async fn test_lost_event_recovered_by_timeout_then_stale_redelivery_is_safe() {
    let h = TestHarness::new();
    let monitor = h.monitor(Duration::minutes(5));

    let order = h
        .order_service
        .create_order(CustomerId::new(), vec![line_item(1, 1000)])
        .await
        .unwrap();

    // The OrderCreated event is published but never delivered
    let lost = h.bus.published_on(ORDER_EVENTS_TOPIC)[0].clone();

    // Age the saga past the deadline
    let saga = h
        .saga_store
        .find_latest_by_order(order.id)
        .await
        .unwrap()
        .unwrap();
    h.saga_store
        .update_by_id(saga.saga_id, |s| {
            s.started_at = Utc::now() - Duration::minutes(10);
            true
        })
        .await
        .unwrap();

    // Monitor fails the saga and publishes compensation
    assert_eq!(monitor.scan().await.unwrap(), 1);
    let saga = h.saga_store.get(saga.saga_id).await.unwrap().unwrap();
    assert_eq!(saga.status, SagaStatus::Failed);
    assert_eq!(h.bus.published_on(ORDER_COMPENSATION_TOPIC).len(), 1);

    // The lost event finally arrives; the failed saga is not resurrected
    h.consumer.handle(h.bus.delivery(lost.clone())).await.unwrap();
    let after = h.saga_store.get(saga.saga_id).await.unwrap().unwrap();
    assert_eq!(after.status, SagaStatus::Failed);

    // And its redelivery is absorbed by the ledger
    h.consumer.handle(h.bus.delivery(lost.clone())).await.unwrap();
    assert!(h.ledger.contains(lost.event_id).await.unwrap());
    assert_eq!(h.bus.ack_count(), 2);
}

#[tokio::test]
async fn test_duplicate_compensation_sources_converge() {
    let h = TestHarness::new();
    let monitor = h.monitor(Duration::minutes(5));

    let order = h
        .order_service
        .create_order(CustomerId::new(), vec![line_item(1, 500)])
        .await
        .unwrap();

    // Direct cancellation compensates first
    h.order_service.cancel_order(order.id).await.unwrap();

    // A later monitor scan finds nothing Started for this order
    assert_eq!(monitor.scan().await.unwrap(), 0);

    // Each published compensation event is consumed idempotently
    h.drain(ORDER_COMPENSATION_TOPIC, 0).await;
    let saga = h.orchestrator.get_saga(order.id).await.unwrap().unwrap();
    assert_eq!(saga.status, SagaStatus::Compensated);
}

#[tokio::test]
async fn test_publish_failure_recovered_end_to_end() {
    let h = TestHarness::new();
    let monitor = h.monitor(Duration::minutes(5));

    // Bus down during creation: order creation still succeeds
    h.bus.set_fail_on_publish(true);
    let order = h
        .order_service
        .create_order(CustomerId::new(), vec![line_item(3, 200)])
        .await
        .unwrap();
    assert_eq!(order.status, OrderStatus::Pending);
    assert!(h.bus.published_on(ORDER_EVENTS_TOPIC).is_empty());

    let saga = h
        .saga_store
        .find_latest_by_order(order.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(saga.status, SagaStatus::Started);

    // Bus recovers; timeout path compensates the stuck saga
    h.bus.set_fail_on_publish(false);
    h.saga_store
        .update_by_id(saga.saga_id, |s| {
            s.started_at = Utc::now() - Duration::minutes(10);
            true
        })
        .await
        .unwrap();
    assert_eq!(monitor.scan().await.unwrap(), 1);

    h.drain(ORDER_COMPENSATION_TOPIC, 0).await;
    let saga = h.saga_store.get(saga.saga_id).await.unwrap().unwrap();
    assert_eq!(saga.status, SagaStatus::Failed);
}

#[tokio::test]
async fn test_consumer_loop_end_to_end() {
    let h = TestHarness::new();

    let events_sub = h.bus.subscribe(ORDER_EVENTS_TOPIC);
    let compensation_sub = h.bus.subscribe(ORDER_COMPENSATION_TOPIC);
    let events_loop = tokio::spawn(h.consumer.clone().run(events_sub));
    let compensation_loop = tokio::spawn(h.consumer.clone().run(compensation_sub));

    let order = h
        .order_service
        .create_order(CustomerId::new(), vec![line_item(2, 2550)])
        .await
        .unwrap();

    // Give the spawned consumers a moment to process
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    let saga = h.orchestrator.get_saga(order.id).await.unwrap().unwrap();
    assert_eq!(saga.status, SagaStatus::Completed);

    h.order_service.cancel_order(order.id).await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    let saga = h.orchestrator.get_saga(order.id).await.unwrap().unwrap();
    assert_eq!(saga.status, SagaStatus::Compensated);

    events_loop.abort();
    compensation_loop.abort();
}

#[tokio::test]
async fn test_ordering_within_an_order_is_respected() {
    let h = TestHarness::new();
    let order_id = OrderId::new();

    h.orchestrator
        .start_order_saga(order_id, Money::from_cents(100))
        .await
        .unwrap();
    h.orchestrator
        .compensate_order(order_id, "Customer cancellation")
        .await
        .unwrap();

    // Events keyed by the same order arrive in publish order
    let created = DomainEvent::order_created(order_id, Money::from_cents(100));
    let cancelled = h.bus.published_on(ORDER_COMPENSATION_TOPIC)[0].clone();

    h.consumer.handle(h.bus.delivery(created)).await.unwrap();
    h.consumer.handle(h.bus.delivery(cancelled)).await.unwrap();

    let saga = h.orchestrator.get_saga(order_id).await.unwrap().unwrap();
    assert_eq!(saga.status, SagaStatus::Compensated);
}
