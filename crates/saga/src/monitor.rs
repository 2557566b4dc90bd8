//! Saga timeout monitor.

use chrono::{Duration, Utc};

use crate::bus::EventBus;
use crate::error::Result;
use crate::orchestrator::SagaOrchestrator;
use crate::store::SagaStore;

/// Reason attached to compensation triggered by a timeout.
const TIMEOUT_REASON: &str = "Saga timeout";

/// Liveness failure detector over persisted saga state.
///
/// Sagas whose completion event never arrives (message lost,
/// downstream crash) stay `Started` forever; the monitor is the sole
/// automatic recovery path. It periodically scans for `Started` sagas
/// older than the deadline, fails them, and forces compensation.
#[derive(Clone)]
pub struct TimeoutMonitor<S, B> {
    store: S,
    orchestrator: SagaOrchestrator<S, B>,
    timeout: Duration,
}

impl<S: SagaStore, B: EventBus> TimeoutMonitor<S, B> {
    /// Creates a monitor with the given saga deadline.
    pub fn new(store: S, orchestrator: SagaOrchestrator<S, B>, timeout: Duration) -> Self {
        Self {
            store,
            orchestrator,
            timeout,
        }
    }

    /// Runs one scan. Returns how many sagas were failed and compensated.
    #[tracing::instrument(skip(self))]
    pub async fn scan(&self) -> Result<usize> {
        let deadline = Utc::now() - self.timeout;
        let timed_out = self.store.find_timed_out(deadline).await?;

        if timed_out.is_empty() {
            return Ok(0);
        }
        tracing::warn!(count = timed_out.len(), "found timed-out sagas");

        let mut failed = 0;
        for saga in timed_out {
            // Another caller may have advanced the saga since the scan;
            // fail() only applies from Started
            let applied = self
                .store
                .update_by_id(saga.saga_id, |s| s.fail(Utc::now()))
                .await?;
            if applied.is_none() {
                continue;
            }

            tracing::warn!(
                order_id = %saga.order_id, saga_id = %saga.saga_id,
                started_at = %saga.started_at,
                "saga timeout detected, compensating"
            );
            self.orchestrator
                .compensate_order(saga.order_id, TIMEOUT_REASON)
                .await?;

            metrics::counter!("saga_timeouts_total").increment(1);
            failed += 1;
        }
        Ok(failed)
    }

    /// Scans on a fixed period until the task is aborted.
    pub async fn run(self, period: std::time::Duration) {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            if let Err(e) = self.scan().await {
                tracing::error!(error = %e, "saga timeout scan failed");
            }
        }
    }
}
