//! Market data: quote provider port, Binance adapter and price resolution.

mod provider;
mod resolver;

pub use provider::{BinanceQuoteProvider, Quote, QuoteProvider, QuoteProviderError};
pub use resolver::{PriceResolver, PricingError, ResolvedPrice, select_price};

#[cfg(test)]
pub use provider::MockQuoteProvider;

/// Normalizes a user-supplied symbol into the exchange form.
///
/// Whitespace is removed, letters are uppercased and `quote_currency` is
/// appended when the symbol does not already end with it. Returns `None` when
/// nothing usable remains or the symbol contains non-alphanumeric characters.
#[must_use]
pub fn normalize_symbol(raw: &str, quote_currency: &str) -> Option<String> {
    let mut symbol: String = raw
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_uppercase();

    if symbol.is_empty() || !symbol.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }

    let quote_currency = quote_currency.to_uppercase();
    if !symbol.ends_with(&quote_currency) {
        symbol.push_str(&quote_currency);
    }
    Some(symbol)
}
