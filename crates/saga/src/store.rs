//! Saga store trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{OrderId, SagaId};
use tokio::sync::RwLock;

use crate::error::{Result, SagaError};
use crate::instance::SagaInstance;
use crate::status::SagaStatus;

/// Persistence operations for saga instances.
///
/// A saga record is mutated by up to three independent callers (the
/// lifecycle manager, the event consumer, and the timeout monitor), so
/// every mutation runs as a single atomic read-modify-write: the
/// closure sees the current record and its result is written back with
/// no gap in between. The closure returns whether the transition
/// applied; a refused transition leaves the record untouched.
#[async_trait]
pub trait SagaStore: Send + Sync {
    /// Persists a new saga instance.
    async fn insert(&self, saga: SagaInstance) -> Result<()>;

    /// Looks up a saga by its id.
    async fn get(&self, saga_id: SagaId) -> Result<Option<SagaInstance>>;

    /// Returns the live saga for an order: the non-terminal instance
    /// if one exists, otherwise the most recently started one.
    async fn find_latest_by_order(&self, order_id: OrderId) -> Result<Option<SagaInstance>>;

    /// Returns true if a non-terminal saga exists for the order.
    async fn has_active_for_order(&self, order_id: OrderId) -> Result<bool>;

    /// Atomically mutates the live saga for an order.
    ///
    /// Returns the post-transition record when the saga exists and the
    /// closure applied; `None` when there is no saga or the transition
    /// was refused.
    async fn update_latest_by_order<F>(
        &self,
        order_id: OrderId,
        f: F,
    ) -> Result<Option<SagaInstance>>
    where
        F: FnOnce(&mut SagaInstance) -> bool + Send;

    /// Atomically mutates the saga with the given id. Same contract as
    /// [`update_latest_by_order`](Self::update_latest_by_order).
    async fn update_by_id<F>(&self, saga_id: SagaId, f: F) -> Result<Option<SagaInstance>>
    where
        F: FnOnce(&mut SagaInstance) -> bool + Send;

    /// Returns all sagas still in `Started` that began before `older_than`.
    async fn find_timed_out(&self, older_than: DateTime<Utc>) -> Result<Vec<SagaInstance>>;
}

/// In-memory saga store.
#[derive(Clone, Default)]
pub struct InMemorySagaStore {
    sagas: Arc<RwLock<HashMap<SagaId, SagaInstance>>>,
}

impl InMemorySagaStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored sagas. Sagas are never deleted.
    pub async fn saga_count(&self) -> usize {
        self.sagas.read().await.len()
    }

    fn latest_id(sagas: &HashMap<SagaId, SagaInstance>, order_id: OrderId) -> Option<SagaId> {
        let for_order = sagas.values().filter(|s| s.order_id == order_id);

        let mut latest: Option<&SagaInstance> = None;
        for saga in for_order {
            let better = match latest {
                None => true,
                Some(current) => {
                    // A live saga always wins over a terminal one
                    match (current.status.is_terminal(), saga.status.is_terminal()) {
                        (true, false) => true,
                        (false, true) => false,
                        _ => saga.started_at > current.started_at,
                    }
                }
            };
            if better {
                latest = Some(saga);
            }
        }
        latest.map(|s| s.saga_id)
    }
}

#[async_trait]
impl SagaStore for InMemorySagaStore {
    async fn insert(&self, saga: SagaInstance) -> Result<()> {
        self.sagas.write().await.insert(saga.saga_id, saga);
        Ok(())
    }

    async fn get(&self, saga_id: SagaId) -> Result<Option<SagaInstance>> {
        Ok(self.sagas.read().await.get(&saga_id).cloned())
    }

    async fn find_latest_by_order(&self, order_id: OrderId) -> Result<Option<SagaInstance>> {
        let sagas = self.sagas.read().await;
        Ok(Self::latest_id(&sagas, order_id).and_then(|id| sagas.get(&id).cloned()))
    }

    async fn has_active_for_order(&self, order_id: OrderId) -> Result<bool> {
        let sagas = self.sagas.read().await;
        Ok(sagas
            .values()
            .any(|s| s.order_id == order_id && !s.status.is_terminal()))
    }

    async fn update_latest_by_order<F>(
        &self,
        order_id: OrderId,
        f: F,
    ) -> Result<Option<SagaInstance>>
    where
        F: FnOnce(&mut SagaInstance) -> bool + Send,
    {
        let mut sagas = self.sagas.write().await;
        let Some(saga_id) = Self::latest_id(&sagas, order_id) else {
            return Ok(None);
        };
        let saga = sagas
            .get_mut(&saga_id)
            .ok_or_else(|| SagaError::Store(format!("saga {saga_id} vanished under lock")))?;
        Ok(f(&mut *saga).then(|| saga.clone()))
    }

    async fn update_by_id<F>(&self, saga_id: SagaId, f: F) -> Result<Option<SagaInstance>>
    where
        F: FnOnce(&mut SagaInstance) -> bool + Send,
    {
        let mut sagas = self.sagas.write().await;
        let Some(saga) = sagas.get_mut(&saga_id) else {
            return Ok(None);
        };
        Ok(f(&mut *saga).then(|| saga.clone()))
    }

    async fn find_timed_out(&self, older_than: DateTime<Utc>) -> Result<Vec<SagaInstance>> {
        let sagas = self.sagas.read().await;
        let mut timed_out: Vec<SagaInstance> = sagas
            .values()
            .filter(|s| s.status == SagaStatus::Started && s.started_at < older_than)
            .cloned()
            .collect();
        timed_out.sort_by_key(|s| s.started_at);
        Ok(timed_out)
    }
}
