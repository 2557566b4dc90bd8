//! Saga instance record.

use chrono::{DateTime, Utc};
use common::{OrderId, SagaId};
use serde::{Deserialize, Serialize};

use crate::status::SagaStatus;

/// A saga instance tracked in the saga store.
///
/// Never deleted; terminal instances remain as an audit trail. The
/// transition methods guard against illegal moves and report whether
/// they applied, so a stale event can never resurrect a terminal saga.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SagaInstance {
    /// Unique saga identifier, generated at start.
    pub saga_id: SagaId,

    /// The order this saga coordinates. At most one non-terminal saga
    /// exists per order at a time.
    pub order_id: OrderId,

    /// Current saga status.
    pub status: SagaStatus,

    /// When the saga started. Compared against the timeout deadline.
    pub started_at: DateTime<Utc>,

    /// Set when the saga reaches a terminal status.
    pub completed_at: Option<DateTime<Utc>>,
}

impl SagaInstance {
    /// Creates a new saga in `Started` for the given order.
    pub fn start(order_id: OrderId) -> Self {
        Self {
            saga_id: SagaId::new(),
            order_id,
            status: SagaStatus::Started,
            started_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Marks the saga `Completed`. Returns whether the transition applied.
    pub fn complete(&mut self, now: DateTime<Utc>) -> bool {
        if !self.status.can_complete() {
            return false;
        }
        self.status = SagaStatus::Completed;
        self.completed_at = Some(now);
        true
    }

    /// Moves the saga to `Compensating`. Returns whether the transition applied.
    pub fn begin_compensation(&mut self) -> bool {
        if !self.status.can_compensate() {
            return false;
        }
        self.status = SagaStatus::Compensating;
        true
    }

    /// Marks the saga `Compensated`. Returns whether the transition applied.
    pub fn mark_compensated(&mut self, now: DateTime<Utc>) -> bool {
        if !self.status.can_mark_compensated() {
            return false;
        }
        self.status = SagaStatus::Compensated;
        self.completed_at = Some(now);
        true
    }

    /// Marks the saga `Failed` after a timeout. Returns whether the
    /// transition applied (only legal from `Started`).
    pub fn fail(&mut self, now: DateTime<Utc>) -> bool {
        if self.status != SagaStatus::Started {
            return false;
        }
        self.status = SagaStatus::Failed;
        self.completed_at = Some(now);
        true
    }
}
