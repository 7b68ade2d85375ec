//! PostgreSQL order ledger.

use super::{DatabasePool, OrderRow};
use crate::ledger::{LedgerError, OrderLedger};
use crate::models::{NewOrder, Order, OrderId, UserId};
use async_trait::async_trait;
use tracing::debug;

/// Order ledger backed by the `orders` table.
#[derive(Clone)]
pub struct PgOrderLedger {
    db: DatabasePool,
}

impl PgOrderLedger {
    /// Creates a ledger over the pool.
    #[must_use]
    pub fn new(db: DatabasePool) -> Self {
        Self { db }
    }
}

fn backend(err: sqlx::Error) -> LedgerError {
    LedgerError::Backend(err.to_string())
}

#[async_trait]
impl OrderLedger for PgOrderLedger {
    async fn insert(&self, order: &NewOrder) -> Result<OrderId, LedgerError> {
        let order_id: OrderId = sqlx::query_scalar(
            r#"
            INSERT INTO orders (order_uuid, user_id, symbol, volume, side, price, status, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id
            "#,
        )
        .bind(order.order_uuid)
        .bind(order.owner)
        .bind(&order.symbol)
        .bind(order.volume)
        .bind(order.side.as_str())
        .bind(order.execution_price)
        .bind(order.status.as_str())
        .bind(order.created_at)
        .fetch_one(self.db.pool())
        .await
        .map_err(backend)?;

        debug!("Inserted order {} for user {}", order_id, order.owner);
        Ok(order_id)
    }

    async fn list_by_owner(&self, owner: UserId) -> Result<Vec<Order>, LedgerError> {
        let rows: Vec<OrderRow> = sqlx::query_as(
            r#"
            SELECT id, order_uuid, user_id, symbol, volume, side, price, status, created_at
            FROM orders
            WHERE user_id = $1
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(owner)
        .fetch_all(self.db.pool())
        .await
        .map_err(backend)?;

        rows.into_iter().map(Order::try_from).collect()
    }

    async fn get_by_owner_and_id(
        &self,
        owner: UserId,
        order_id: OrderId,
    ) -> Result<Option<Order>, LedgerError> {
        let row: Option<OrderRow> = sqlx::query_as(
            r#"
            SELECT id, order_uuid, user_id, symbol, volume, side, price, status, created_at
            FROM orders
            WHERE user_id = $1 AND id = $2
            "#,
        )
        .bind(owner)
        .bind(order_id)
        .fetch_optional(self.db.pool())
        .await
        .map_err(backend)?;

        row.map(Order::try_from).transpose()
    }

    async fn delete_by_owner_and_id(
        &self,
        owner: UserId,
        order_id: OrderId,
    ) -> Result<u64, LedgerError> {
        let result = sqlx::query("DELETE FROM orders WHERE user_id = $1 AND id = $2")
            .bind(owner)
            .bind(order_id)
            .execute(self.db.pool())
            .await
            .map_err(backend)?;

        Ok(result.rows_affected())
    }
}
