//! Price resolution: symbol normalization, bounded quote fetch and side selection.

use super::normalize_symbol;
use super::provider::{Quote, QuoteProvider};
use crate::models::OrderSide;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Price resolution errors.
#[derive(Debug, thiserror::Error)]
pub enum PricingError {
    /// Side is not `buy` or `sell`.
    #[error("Invalid order type: {0}. Use 'buy' or 'sell'")]
    InvalidSide(String),

    /// Symbol is empty or contains non-alphanumeric characters.
    #[error("Invalid symbol: {0:?}")]
    InvalidSymbol(String),

    /// The provider failed or did not answer in time.
    #[error("Quote unavailable for {symbol}: {reason}")]
    QuoteUnavailable {
        /// Normalized symbol.
        symbol: String,
        /// Failure detail.
        reason: String,
    },

    /// The provider returned a non-positive bid or ask.
    #[error("Invalid quote for {symbol}: bid={bid}, ask={ask}")]
    InvalidQuote {
        /// Normalized symbol.
        symbol: String,
        /// Reported bid.
        bid: Decimal,
        /// Reported ask.
        ask: Decimal,
    },
}

/// Outcome of a successful resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedPrice {
    /// Normalized symbol.
    pub symbol: String,
    /// Side the price was selected for.
    pub side: OrderSide,
    /// Execution price.
    pub price: Decimal,
    /// Quote the price was taken from.
    pub quote: Quote,
}

/// Selects the execution price for a side: buys take the ask, sells take the bid.
///
/// Returns `None` when the quote is not usable.
#[must_use]
pub fn select_price(quote: &Quote, side: OrderSide) -> Option<Decimal> {
    if !quote.is_usable() {
        return None;
    }
    Some(match side {
        OrderSide::Buy => quote.ask_price,
        OrderSide::Sell => quote.bid_price,
    })
}

/// Resolves symbols to executable prices against a quote provider.
pub struct PriceResolver {
    provider: Arc<dyn QuoteProvider>,
    quote_currency: String,
    timeout: Duration,
}

impl PriceResolver {
    /// Creates a resolver.
    #[must_use]
    pub fn new(
        provider: Arc<dyn QuoteProvider>,
        quote_currency: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            provider,
            quote_currency: quote_currency.into(),
            timeout,
        }
    }

    /// Resolves a price for a raw side string.
    ///
    /// The side is checked before the provider is contacted.
    ///
    /// # Errors
    /// Returns `InvalidSide` for anything other than `buy`/`sell`, otherwise see
    /// [`PriceResolver::resolve_side`].
    pub async fn resolve(&self, symbol: &str, side: &str) -> Result<ResolvedPrice, PricingError> {
        let side: OrderSide = side
            .parse()
            .map_err(|_| PricingError::InvalidSide(side.to_string()))?;
        self.resolve_side(symbol, side).await
    }

    /// Resolves a price for an already-validated side.
    ///
    /// # Errors
    /// Returns `InvalidSymbol`, `QuoteUnavailable` on provider failure or timeout,
    /// or `InvalidQuote` when either side of the quote is not positive.
    pub async fn resolve_side(
        &self,
        symbol: &str,
        side: OrderSide,
    ) -> Result<ResolvedPrice, PricingError> {
        let normalized = normalize_symbol(symbol, &self.quote_currency)
            .ok_or_else(|| PricingError::InvalidSymbol(symbol.to_string()))?;

        let quote = match tokio::time::timeout(self.timeout, self.provider.book_ticker(&normalized))
            .await
        {
            Ok(Ok(quote)) => quote,
            Ok(Err(e)) => {
                warn!("Quote provider failed for {}: {}", normalized, e);
                return Err(PricingError::QuoteUnavailable {
                    symbol: normalized,
                    reason: e.to_string(),
                });
            }
            Err(_) => {
                warn!(
                    "Quote provider timed out after {:?} for {}",
                    self.timeout, normalized
                );
                return Err(PricingError::QuoteUnavailable {
                    symbol: normalized,
                    reason: format!("timed out after {:?}", self.timeout),
                });
            }
        };

        let price = select_price(&quote, side).ok_or_else(|| PricingError::InvalidQuote {
            symbol: normalized.clone(),
            bid: quote.bid_price,
            ask: quote.ask_price,
        })?;

        debug!("Resolved {} {} at {}", side, normalized, price);

        Ok(ResolvedPrice {
            symbol: normalized,
            side,
            price,
            quote,
        })
    }
}
