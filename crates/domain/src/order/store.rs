//! Order store trait and in-memory implementation.
//!
//! The durable order store is an external collaborator; this trait is
//! the seam the lifecycle manager depends on. A SQL-backed
//! implementation would map one row per order plus one per line item.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::OrderId;
use tokio::sync::RwLock;

use crate::error::DomainError;

use super::model::Order;
use super::status::OrderStatus;

/// Persistence operations for orders.
///
/// `update` runs its closure as a single atomic read-modify-write:
/// the current record is read, mutated, and written back without any
/// gap another caller could interleave with.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Persists a new order.
    async fn insert(&self, order: Order) -> Result<(), DomainError>;

    /// Looks up an order by id.
    async fn get(&self, order_id: OrderId) -> Result<Option<Order>, DomainError>;

    /// Lists orders, optionally filtered by status, oldest first.
    async fn list(&self, status: Option<OrderStatus>) -> Result<Vec<Order>, DomainError>;

    /// Atomically mutates the order with the given id.
    ///
    /// Fails with `NotFound` if the order does not exist. If the
    /// closure errors, the record is left unchanged.
    async fn update<F>(&self, order_id: OrderId, f: F) -> Result<Order, DomainError>
    where
        F: FnOnce(&mut Order) -> Result<(), DomainError> + Send;
}

/// In-memory order store.
///
/// Backs tests and the reference wiring; a given order's record is
/// only ever mutated under the store's write lock.
#[derive(Clone, Default)]
pub struct InMemoryOrderStore {
    orders: Arc<RwLock<HashMap<OrderId, Order>>>,
}

impl InMemoryOrderStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored orders.
    pub async fn order_count(&self) -> usize {
        self.orders.read().await.len()
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn insert(&self, order: Order) -> Result<(), DomainError> {
        self.orders.write().await.insert(order.id, order);
        Ok(())
    }

    async fn get(&self, order_id: OrderId) -> Result<Option<Order>, DomainError> {
        Ok(self.orders.read().await.get(&order_id).cloned())
    }

    async fn list(&self, status: Option<OrderStatus>) -> Result<Vec<Order>, DomainError> {
        let orders = self.orders.read().await;
        let mut result: Vec<Order> = orders
            .values()
            .filter(|o| status.is_none_or(|s| o.status == s))
            .cloned()
            .collect();
        result.sort_by_key(|o| o.created_at);
        Ok(result)
    }

    async fn update<F>(&self, order_id: OrderId, f: F) -> Result<Order, DomainError>
    where
        F: FnOnce(&mut Order) -> Result<(), DomainError> + Send,
    {
        let mut orders = self.orders.write().await;
        let order = orders
            .get_mut(&order_id)
            .ok_or(DomainError::NotFound(order_id))?;

        let mut candidate = order.clone();
        f(&mut candidate)?;
        *order = candidate.clone();
        Ok(candidate)
    }
}
