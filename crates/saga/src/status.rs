//! Saga status state machine.

use serde::{Deserialize, Serialize};

/// The status of a saga instance.
///
/// Status transitions:
/// ```text
/// Started ──┬──► Completed ──┐
///           │                ├──► Compensating ──► Compensated
///           ├────────────────┘
///           └──► Failed (timeout, triggers compensation)
/// ```
///
/// A completed saga may still be compensated later (order cancellation
/// after success); `Failed` and `Compensated` accept no further
/// transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum SagaStatus {
    /// Forward step published, awaiting downstream confirmation.
    #[default]
    Started,

    /// Downstream success received (terminal, success).
    Completed,

    /// Compensation published, awaiting downstream acknowledgment.
    Compensating,

    /// Downstream compensation acknowledged (terminal, rollback).
    Compensated,

    /// Timeout deadline exceeded (terminal, triggers compensation).
    Failed,
}

impl SagaStatus {
    /// Returns true if the saga can be completed from this status.
    pub fn can_complete(&self) -> bool {
        matches!(self, SagaStatus::Started)
    }

    /// Returns true if compensation can begin from this status.
    pub fn can_compensate(&self) -> bool {
        matches!(self, SagaStatus::Started | SagaStatus::Completed)
    }

    /// Returns true if the saga can be marked compensated.
    pub fn can_mark_compensated(&self) -> bool {
        matches!(self, SagaStatus::Compensating)
    }

    /// Returns true if this is a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SagaStatus::Completed | SagaStatus::Compensated | SagaStatus::Failed
        )
    }

    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            SagaStatus::Started => "Started",
            SagaStatus::Completed => "Completed",
            SagaStatus::Compensating => "Compensating",
            SagaStatus::Compensated => "Compensated",
            SagaStatus::Failed => "Failed",
        }
    }
}

impl std::fmt::Display for SagaStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
