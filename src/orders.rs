//! Order execution pipeline.
//!
//! `submit` validates the request, resolves a price, stamps a fresh order UUID
//! and persists the order in a single ledger write. A failure at any step
//! leaves nothing behind.

use crate::ledger::{LedgerError, OrderLedger};
use crate::market::{PriceResolver, PricingError};
use crate::models::{NewOrder, Order, OrderId, OrderSide, OrderStatus, UserId};
use chrono::Utc;
use rust_decimal::Decimal;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Order pipeline errors.
#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    /// Side is not `buy` or `sell`.
    #[error("Invalid order type: {0}. Use 'buy' or 'sell'")]
    InvalidSide(String),

    /// Volume is zero or negative.
    #[error("Invalid volume: {0}. Volume must be greater than zero")]
    InvalidVolume(Decimal),

    /// Price resolution failed.
    #[error(transparent)]
    Pricing(#[from] PricingError),

    /// The ledger rejected or did not acknowledge the operation.
    #[error("persistence failed for user {owner}: {source}")]
    PersistenceFailed {
        /// Owner the operation ran for.
        owner: UserId,
        /// Underlying ledger error.
        #[source]
        source: LedgerError,
    },

    /// No order with this id belongs to the caller.
    #[error("Order {order_id} not found")]
    NotFound {
        /// Requested order.
        order_id: OrderId,
    },
}

/// Turns order requests into priced, persisted orders.
pub struct OrderService {
    resolver: PriceResolver,
    ledger: Arc<dyn OrderLedger>,
    storage_timeout: Duration,
}

impl OrderService {
    /// Creates the pipeline.
    #[must_use]
    pub fn new(
        resolver: PriceResolver,
        ledger: Arc<dyn OrderLedger>,
        storage_timeout: Duration,
    ) -> Self {
        Self {
            resolver,
            ledger,
            storage_timeout,
        }
    }

    /// Submits a market-priced order for `owner`.
    ///
    /// # Errors
    /// `InvalidSide`/`InvalidVolume` before any upstream call, `Pricing` for
    /// resolver failures, `PersistenceFailed` when the ledger write fails.
    pub async fn submit(
        &self,
        owner: UserId,
        symbol: &str,
        volume: Decimal,
        side: &str,
    ) -> Result<Order, OrderError> {
        let side: OrderSide = side
            .parse()
            .map_err(|_| OrderError::InvalidSide(side.to_string()))?;

        if volume <= Decimal::ZERO {
            return Err(OrderError::InvalidVolume(volume));
        }

        let resolved = self.resolver.resolve_side(symbol, side).await?;

        let new_order = NewOrder {
            order_uuid: Uuid::new_v4(),
            owner,
            symbol: resolved.symbol,
            volume,
            side,
            execution_price: resolved.price,
            status: OrderStatus::Accepted,
            created_at: Utc::now(),
        };

        let order_id = self
            .with_storage_timeout(owner, self.ledger.insert(&new_order))
            .await?;

        info!(
            "Order {} ({}) accepted: user={} {} {} {} @ {}",
            order_id,
            new_order.order_uuid,
            owner,
            new_order.side,
            new_order.volume,
            new_order.symbol,
            new_order.execution_price
        );

        Ok(new_order.into_order(order_id))
    }

    /// Lists the owner's orders, most recent first.
    ///
    /// # Errors
    /// `PersistenceFailed` when the ledger read fails.
    pub async fn list(&self, owner: UserId) -> Result<Vec<Order>, OrderError> {
        self.with_storage_timeout(owner, self.ledger.list_by_owner(owner))
            .await
    }

    /// Fetches one of the owner's orders.
    ///
    /// # Errors
    /// `NotFound` when the id does not exist or belongs to someone else.
    pub async fn get(&self, owner: UserId, order_id: OrderId) -> Result<Order, OrderError> {
        self.with_storage_timeout(owner, self.ledger.get_by_owner_and_id(owner, order_id))
            .await?
            .ok_or(OrderError::NotFound { order_id })
    }

    /// Deletes one of the owner's orders.
    ///
    /// Missing, foreign and already-deleted ids all report `NotFound`.
    ///
    /// # Errors
    /// `NotFound` when no row was removed, `PersistenceFailed` on ledger failure.
    pub async fn delete(&self, owner: UserId, order_id: OrderId) -> Result<(), OrderError> {
        let affected = self
            .with_storage_timeout(owner, self.ledger.delete_by_owner_and_id(owner, order_id))
            .await?;

        if affected == 0 {
            debug!("Delete of order {} by user {} matched nothing", order_id, owner);
            return Err(OrderError::NotFound { order_id });
        }

        info!("Order {} deleted by user {}", order_id, owner);
        Ok(())
    }

    async fn with_storage_timeout<T>(
        &self,
        owner: UserId,
        call: impl Future<Output = Result<T, LedgerError>>,
    ) -> Result<T, OrderError> {
        let result = match tokio::time::timeout(self.storage_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(LedgerError::Timeout),
        };
        result.map_err(|source| {
            warn!("Ledger call failed for user {}: {}", owner, source);
            OrderError::PersistenceFailed { owner, source }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::InMemoryOrderLedger;
    use crate::market::{MockQuoteProvider, Quote};
    use async_trait::async_trait;
    use rust_decimal_macros::dec;

    fn quote_100_101() -> MockQuoteProvider {
        let mut mock = MockQuoteProvider::new();
        mock.expect_book_ticker()
            .returning(|s| Ok(Quote::new(s, dec!(100), dec!(101))));
        mock
    }

    fn service(mock: MockQuoteProvider, ledger: Arc<dyn OrderLedger>) -> OrderService {
        let resolver = PriceResolver::new(Arc::new(mock), "USDT", Duration::from_secs(1));
        OrderService::new(resolver, ledger, Duration::from_secs(1))
    }

    #[tokio::test]
    async fn test_submit_buy_btc_scenario() {
        let ledger = Arc::new(InMemoryOrderLedger::new());
        let service = service(quote_100_101(), ledger.clone());

        let order = service.submit(1, "btc", dec!(0.5), "buy").await.unwrap();

        assert_eq!(order.symbol, "BTCUSDT");
        assert_eq!(order.execution_price, dec!(101));
        assert_eq!(order.side, OrderSide::Buy);
        assert_eq!(order.status, OrderStatus::Accepted);
        assert_eq!(order.volume, dec!(0.5));
        assert_eq!(order.owner, 1);
        assert_eq!(ledger.order_count(), 1);

        let stored = service.get(1, order.order_id).await.unwrap();
        assert_eq!(stored, order);
    }

    #[tokio::test]
    async fn test_submit_sell_uses_bid() {
        let service = service(quote_100_101(), Arc::new(InMemoryOrderLedger::new()));
        let order = service.submit(1, "eth", dec!(2), "sell").await.unwrap();
        assert_eq!(order.execution_price, dec!(100));
    }

    #[tokio::test]
    async fn test_submit_invalid_side_never_prices() {
        let mut mock = MockQuoteProvider::new();
        mock.expect_book_ticker().never();
        let ledger = Arc::new(InMemoryOrderLedger::new());
        let service = service(mock, ledger.clone());

        let err = service.submit(1, "btc", dec!(1), "Buy").await.unwrap_err();
        assert!(matches!(err, OrderError::InvalidSide(_)));
        assert_eq!(ledger.order_count(), 0);
    }

    #[tokio::test]
    async fn test_submit_non_positive_volume_never_prices() {
        let mut mock = MockQuoteProvider::new();
        mock.expect_book_ticker().never();
        let service = service(mock, Arc::new(InMemoryOrderLedger::new()));

        for volume in [dec!(0), dec!(-1.5)] {
            let err = service.submit(1, "btc", volume, "buy").await.unwrap_err();
            assert!(matches!(err, OrderError::InvalidVolume(v) if v == volume));
        }
    }

    #[tokio::test]
    async fn test_submit_invalid_quote_persists_nothing() {
        let mut mock = MockQuoteProvider::new();
        mock.expect_book_ticker()
            .returning(|s| Ok(Quote::new(s, dec!(-1), dec!(101))));
        let ledger = Arc::new(InMemoryOrderLedger::new());
        let service = service(mock, ledger.clone());

        let err = service.submit(1, "btc", dec!(1), "sell").await.unwrap_err();
        assert!(matches!(
            err,
            OrderError::Pricing(PricingError::InvalidQuote { .. })
        ));
        assert_eq!(ledger.order_count(), 0);
    }

    #[tokio::test]
    async fn test_submit_assigns_unique_uuids() {
        let service = service(quote_100_101(), Arc::new(InMemoryOrderLedger::new()));
        let a = service.submit(1, "btc", dec!(1), "buy").await.unwrap();
        let b = service.submit(1, "btc", dec!(1), "buy").await.unwrap();
        assert_ne!(a.order_uuid, b.order_uuid);
        assert_ne!(a.order_id, b.order_id);
    }

    #[tokio::test]
    async fn test_get_foreign_order_is_not_found() {
        let service = service(quote_100_101(), Arc::new(InMemoryOrderLedger::new()));
        let order = service.submit(1, "btc", dec!(1), "buy").await.unwrap();

        let err = service.get(2, order.order_id).await.unwrap_err();
        assert!(matches!(err, OrderError::NotFound { order_id } if order_id == order.order_id));
    }

    #[tokio::test]
    async fn test_delete_missing_and_repeated_are_not_found() {
        let service = service(quote_100_101(), Arc::new(InMemoryOrderLedger::new()));
        let order = service.submit(1, "btc", dec!(1), "buy").await.unwrap();

        assert!(matches!(
            service.delete(2, order.order_id).await,
            Err(OrderError::NotFound { .. })
        ));
        service.delete(1, order.order_id).await.unwrap();
        assert!(matches!(
            service.delete(1, order.order_id).await,
            Err(OrderError::NotFound { .. })
        ));
        assert!(matches!(
            service.delete(1, 9999).await,
            Err(OrderError::NotFound { .. })
        ));
        assert!(service.list(1).await.unwrap().is_empty());
    }

    struct FailingLedger;

    #[async_trait]
    impl OrderLedger for FailingLedger {
        async fn insert(&self, _order: &NewOrder) -> Result<OrderId, LedgerError> {
            Err(LedgerError::Backend("connection reset".to_string()))
        }

        async fn list_by_owner(&self, _owner: UserId) -> Result<Vec<Order>, LedgerError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(Vec::new())
        }

        async fn get_by_owner_and_id(
            &self,
            _owner: UserId,
            _order_id: OrderId,
        ) -> Result<Option<Order>, LedgerError> {
            Ok(None)
        }

        async fn delete_by_owner_and_id(
            &self,
            _owner: UserId,
            _order_id: OrderId,
        ) -> Result<u64, LedgerError> {
            Ok(0)
        }
    }

    #[tokio::test]
    async fn test_ledger_failure_is_persistence_failed() {
        let service = service(quote_100_101(), Arc::new(FailingLedger));
        let err = service.submit(7, "btc", dec!(1), "buy").await.unwrap_err();
        assert!(matches!(
            err,
            OrderError::PersistenceFailed { owner: 7, source: LedgerError::Backend(_) }
        ));
    }

    #[tokio::test]
    async fn test_ledger_timeout_is_persistence_failed() {
        let resolver =
            PriceResolver::new(Arc::new(quote_100_101()), "USDT", Duration::from_secs(1));
        let service =
            OrderService::new(resolver, Arc::new(FailingLedger), Duration::from_millis(50));

        let err = service.list(3).await.unwrap_err();
        assert!(matches!(
            err,
            OrderError::PersistenceFailed { owner: 3, source: LedgerError::Timeout }
        ));
    }
}
