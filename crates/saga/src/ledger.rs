//! Processed-event ledger.
//!
//! Durable set of already-handled event ids. A recorded id is the
//! idempotency witness that makes at-least-once redelivery safe.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::EventId;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::Result;

/// A record of a successfully handled event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessedEventRecord {
    /// The handled event's id.
    pub event_id: EventId,
    /// The event type tag.
    pub event_type: String,
    /// When the event was processed.
    pub processed_at: DateTime<Utc>,
}

/// Persistence operations for the processed-event ledger.
#[async_trait]
pub trait ProcessedEventLedger: Send + Sync {
    /// Returns true if the event id has already been handled.
    async fn contains(&self, event_id: EventId) -> Result<bool>;

    /// Records an event id as handled. Created exactly once per
    /// successfully handled event.
    async fn record(&self, event_id: EventId, event_type: &str) -> Result<()>;
}

/// In-memory processed-event ledger.
#[derive(Clone, Default)]
pub struct InMemoryProcessedEventLedger {
    records: Arc<RwLock<HashMap<EventId, ProcessedEventRecord>>>,
}

impl InMemoryProcessedEventLedger {
    /// Creates a new empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of recorded events.
    pub async fn record_count(&self) -> usize {
        self.records.read().await.len()
    }
}

#[async_trait]
impl ProcessedEventLedger for InMemoryProcessedEventLedger {
    async fn contains(&self, event_id: EventId) -> Result<bool> {
        Ok(self.records.read().await.contains_key(&event_id))
    }

    async fn record(&self, event_id: EventId, event_type: &str) -> Result<()> {
        self.records.write().await.insert(
            event_id,
            ProcessedEventRecord {
                event_id,
                event_type: event_type.to_string(),
                processed_at: Utc::now(),
            },
        );
        Ok(())
    }
}
