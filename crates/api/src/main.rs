//! API server entry point.

use std::time::Duration;

use api::config::Config;
use api::rate_limit::RateLimiter;
use saga::{TimeoutMonitor, ORDER_COMPENSATION_TOPIC, ORDER_EVENTS_TOPIC};
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

#[tokio::main]
async fn main() {
    let config = Config::from_env();

    // 1. Initialize tracing
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone())),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 2. Install Prometheus metrics recorder
    let prometheus_builder = metrics_exporter_prometheus::PrometheusBuilder::new();
    let metrics_handle = prometheus_builder
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    // 3. Create application state over the in-memory backends
    let (state, consumer, bus, saga_store) = api::create_default_state();

    // 4. Spawn the event consumers on both topics
    tokio::spawn(consumer.clone().run(bus.subscribe(ORDER_EVENTS_TOPIC)));
    tokio::spawn(consumer.run(bus.subscribe(ORDER_COMPENSATION_TOPIC)));

    // 5. Spawn the saga timeout monitor
    let monitor = TimeoutMonitor::new(
        saga_store,
        state.orchestrator.clone(),
        chrono::Duration::seconds(config.saga_timeout_secs as i64),
    );
    tokio::spawn(monitor.run(Duration::from_secs(config.saga_monitor_period_secs)));

    // 6. Spawn the pending-to-processing advancement job
    let advance_state = state.clone();
    let advance_period = Duration::from_secs(config.order_advance_period_secs);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(advance_period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            if let Err(e) = advance_state
                .order_service
                .advance_pending_to_processing()
                .await
            {
                tracing::error!(error = %e, "pending order advancement failed");
            }
        }
    });

    // 7. Build the application
    let rate_limiter = RateLimiter::per_minute(config.rate_limit_per_minute);
    let app = api::create_app(state, metrics_handle, rate_limiter);

    // 8. Start server
    let addr = config.addr();
    tracing::info!(%addr, "starting API server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .expect("server error");

    tracing::info!("server shut down gracefully");
}
