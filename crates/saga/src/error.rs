//! Saga error types.

use thiserror::Error;

use crate::bus::TransportError;

/// Errors that can occur during saga operations.
#[derive(Debug, Error)]
pub enum SagaError {
    /// Saga store failure. Fatal to the calling operation.
    #[error("saga store error: {0}")]
    Store(String),

    /// Processed-event ledger failure.
    #[error("processed-event ledger error: {0}")]
    Ledger(String),

    /// Event bus failure.
    ///
    /// Only surfaced from consumer-side plumbing; the orchestrator
    /// logs and swallows publish failures instead of returning them.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}

/// Convenience type alias for saga results.
pub type Result<T> = std::result::Result<T, SagaError>;
