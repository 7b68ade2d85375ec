//! Order storage port and its in-memory implementation.
//!
//! Every read and delete path is scoped by owner: an order id alone never
//! addresses a record.

use crate::models::{NewOrder, Order, OrderId, UserId};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use tracing::debug;

/// Order storage errors.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// The storage backend failed.
    #[error("storage backend error: {0}")]
    Backend(String),

    /// The storage call did not complete in time.
    #[error("storage call timed out")]
    Timeout,

    /// A stored row could not be mapped back to an order.
    #[error("corrupt order row {order_id}: {reason}")]
    CorruptRow {
        /// Affected order.
        order_id: OrderId,
        /// Mapping failure.
        reason: String,
    },
}

/// Persistent order storage.
#[async_trait]
pub trait OrderLedger: Send + Sync {
    /// Persists an order and returns the assigned identifier.
    async fn insert(&self, order: &NewOrder) -> Result<OrderId, LedgerError>;

    /// Lists the owner's orders, most recent first.
    async fn list_by_owner(&self, owner: UserId) -> Result<Vec<Order>, LedgerError>;

    /// Fetches one order if it exists and belongs to `owner`.
    async fn get_by_owner_and_id(
        &self,
        owner: UserId,
        order_id: OrderId,
    ) -> Result<Option<Order>, LedgerError>;

    /// Deletes one order if it belongs to `owner`; returns rows affected.
    async fn delete_by_owner_and_id(
        &self,
        owner: UserId,
        order_id: OrderId,
    ) -> Result<u64, LedgerError>;
}

/// In-memory ledger with DashMap for concurrent access.
#[derive(Debug)]
pub struct InMemoryOrderLedger {
    orders: DashMap<OrderId, Order>,
    next_id: AtomicI64,
}

impl Default for InMemoryOrderLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryOrderLedger {
    /// Creates an empty ledger. Identifiers start at 1.
    #[must_use]
    pub fn new() -> Self {
        Self {
            orders: DashMap::new(),
            next_id: AtomicI64::new(1),
        }
    }

    /// Returns the number of stored orders across all owners.
    #[must_use]
    pub fn order_count(&self) -> usize {
        self.orders.len()
    }
}

#[async_trait]
impl OrderLedger for InMemoryOrderLedger {
    async fn insert(&self, order: &NewOrder) -> Result<OrderId, LedgerError> {
        let order_id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.orders
            .insert(order_id, order.clone().into_order(order_id));
        debug!("Stored order {} for user {}", order_id, order.owner);
        Ok(order_id)
    }

    async fn list_by_owner(&self, owner: UserId) -> Result<Vec<Order>, LedgerError> {
        let mut orders: Vec<Order> = self
            .orders
            .iter()
            .filter(|entry| entry.value().owner == owner)
            .map(|entry| entry.value().clone())
            .collect();

        // Ties on created_at fall back to the later id.
        orders.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.order_id.cmp(&a.order_id))
        });
        Ok(orders)
    }

    async fn get_by_owner_and_id(
        &self,
        owner: UserId,
        order_id: OrderId,
    ) -> Result<Option<Order>, LedgerError> {
        Ok(self
            .orders
            .get(&order_id)
            .filter(|entry| entry.value().owner == owner)
            .map(|entry| entry.value().clone()))
    }

    async fn delete_by_owner_and_id(
        &self,
        owner: UserId,
        order_id: OrderId,
    ) -> Result<u64, LedgerError> {
        let removed = self
            .orders
            .remove_if(&order_id, |_, order| order.owner == owner);
        Ok(u64::from(removed.is_some()))
    }
}
