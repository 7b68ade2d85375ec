//! Database row types.

use crate::ledger::LedgerError;
use crate::models::{Order, OrderId, UserId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::FromRow;
use uuid::Uuid;

/// Row of the `orders` table.
#[derive(Debug, Clone, FromRow)]
pub struct OrderRow {
    /// Ledger-assigned identifier.
    pub id: OrderId,
    /// Client-correlatable identifier.
    pub order_uuid: Uuid,
    /// Owning user.
    pub user_id: UserId,
    /// Normalized symbol.
    pub symbol: String,
    /// Volume.
    pub volume: Decimal,
    /// `buy` or `sell`.
    pub side: String,
    /// Execution price.
    pub price: Decimal,
    /// Status string.
    pub status: String,
    /// Creation instant.
    pub created_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = LedgerError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        let corrupt = |reason: String| LedgerError::CorruptRow {
            order_id: row.id,
            reason,
        };
        let side = row.side.parse().map_err(corrupt)?;
        let status = row.status.parse().map_err(corrupt)?;

        Ok(Order {
            order_id: row.id,
            order_uuid: row.order_uuid,
            owner: row.user_id,
            symbol: row.symbol,
            volume: row.volume,
            side,
            execution_price: row.price,
            status,
            created_at: row.created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{OrderSide, OrderStatus};
    use rust_decimal_macros::dec;

    fn row(side: &str, status: &str) -> OrderRow {
        OrderRow {
            id: 3,
            order_uuid: Uuid::nil(),
            user_id: 9,
            symbol: "BTCUSDT".to_string(),
            volume: dec!(0.25),
            side: side.to_string(),
            price: dec!(101.5),
            status: status.to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_order_row_conversion() {
        let order = Order::try_from(row("sell", "accepted")).unwrap();
        assert_eq!(order.order_id, 3);
        assert_eq!(order.owner, 9);
        assert_eq!(order.side, OrderSide::Sell);
        assert_eq!(order.status, OrderStatus::Accepted);
        assert_eq!(order.execution_price, dec!(101.5));
    }

    #[test]
    fn test_corrupt_order_row() {
        assert!(matches!(
            Order::try_from(row("hold", "accepted")),
            Err(LedgerError::CorruptRow { order_id: 3, .. })
        ));
        assert!(matches!(
            Order::try_from(row("buy", "filled")),
            Err(LedgerError::CorruptRow { .. })
        ));
    }
}
