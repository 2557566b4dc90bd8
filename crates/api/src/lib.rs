//! HTTP API server with observability for the order management system.
//!
//! Provides REST endpoints for order lifecycle and saga tracking, with
//! structured logging (tracing), Prometheus metrics, and per-client
//! rate limiting.

pub mod config;
pub mod error;
pub mod rate_limit;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post, put};
use common::{CircuitBreaker, CircuitBreakerConfig};
use domain::{InMemoryOrderStore, OrderService, OrderStore};
use metrics_exporter_prometheus::PrometheusHandle;
use saga::{
    EventBus, EventConsumer, InMemoryEventBus, InMemoryProcessedEventLedger, InMemorySagaStore,
    SagaOrchestrator, SagaStore,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use rate_limit::RateLimiter;
use routes::orders::AppState;

/// Application state over the in-memory backends.
pub type DefaultAppState = AppState<InMemoryOrderStore, InMemorySagaStore, InMemoryEventBus>;

/// Event consumer over the in-memory backends.
pub type DefaultConsumer =
    EventConsumer<InMemorySagaStore, InMemoryEventBus, InMemoryProcessedEventLedger>;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<O, S, B>(
    state: Arc<AppState<O, S, B>>,
    metrics_handle: PrometheusHandle,
    rate_limiter: RateLimiter,
) -> Router
where
    O: OrderStore + 'static,
    S: SagaStore + 'static,
    B: EventBus + 'static,
{
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/orders", post(routes::orders::create::<O, S, B>))
        .route("/orders", get(routes::orders::list::<O, S, B>))
        .route("/orders/{id}", get(routes::orders::get::<O, S, B>))
        .route(
            "/orders/{id}/cancel",
            post(routes::orders::cancel::<O, S, B>),
        )
        .route(
            "/orders/{id}/status",
            put(routes::orders::update_status::<O, S, B>),
        )
        .route(
            "/orders/{id}/saga",
            get(routes::orders::saga_status::<O, S, B>),
        )
        .with_state(state)
        .merge(metrics_router)
        .layer(axum::middleware::from_fn_with_state(
            rate_limiter,
            rate_limit::enforce,
        ))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates the default application state wired over in-memory backends.
///
/// Returns the shared state plus the pieces the caller spawns its
/// background loops from: the event consumer, the bus to subscribe on,
/// and the saga store for the timeout monitor.
pub fn create_default_state() -> (
    Arc<DefaultAppState>,
    DefaultConsumer,
    InMemoryEventBus,
    InMemorySagaStore,
) {
    let saga_store = InMemorySagaStore::new();
    let bus = InMemoryEventBus::new();
    let orchestrator = SagaOrchestrator::new(saga_store.clone(), bus.clone());
    let consumer = EventConsumer::new(orchestrator.clone(), InMemoryProcessedEventLedger::new());
    let order_service = OrderService::new(InMemoryOrderStore::new(), orchestrator.clone());

    let state = Arc::new(AppState {
        order_service,
        orchestrator,
        breaker: CircuitBreaker::new(CircuitBreakerConfig::default()),
    });

    (state, consumer, bus, saga_store)
}
