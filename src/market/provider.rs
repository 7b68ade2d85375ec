//! Quote provider port and the Binance REST adapter.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Best bid/ask for a symbol at a point in time.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    /// Exchange symbol.
    pub symbol: String,
    /// Best bid price.
    pub bid_price: Decimal,
    /// Best ask price.
    pub ask_price: Decimal,
    /// Quantity at the best bid.
    #[serde(default)]
    pub bid_qty: Option<Decimal>,
    /// Quantity at the best ask.
    #[serde(default)]
    pub ask_qty: Option<Decimal>,
}

impl Quote {
    /// Creates a quote without book quantities.
    #[must_use]
    pub fn new(symbol: impl Into<String>, bid_price: Decimal, ask_price: Decimal) -> Self {
        Self {
            symbol: symbol.into(),
            bid_price,
            ask_price,
            bid_qty: None,
            ask_qty: None,
        }
    }

    /// A quote is usable only when both sides are strictly positive.
    #[must_use]
    pub fn is_usable(&self) -> bool {
        self.bid_price > Decimal::ZERO && self.ask_price > Decimal::ZERO
    }
}

/// Quote provider errors.
#[derive(Debug, thiserror::Error)]
pub enum QuoteProviderError {
    /// The request could not be sent or the body could not be read.
    #[error("transport error: {0}")]
    Transport(String),

    /// The provider answered with a non-2xx status.
    #[error("provider returned status {status}: {message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Error message reported by the provider.
        message: String,
    },

    /// The response body was not a valid quote.
    #[error("failed to decode quote: {0}")]
    Decode(String),
}

/// Source of current quotes.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait QuoteProvider: Send + Sync {
    /// Fetches the book ticker for an already-normalized symbol.
    async fn book_ticker(&self, symbol: &str) -> Result<Quote, QuoteProviderError>;
}

/// Error body returned by Binance on non-2xx responses.
#[derive(Debug, Deserialize)]
struct BinanceErrorBody {
    code: i64,
    msg: String,
}

/// Binance spot REST adapter for `GET /api/v3/ticker/bookTicker`.
#[derive(Debug, Clone)]
pub struct BinanceQuoteProvider {
    client: reqwest::Client,
    endpoint: String,
}

impl BinanceQuoteProvider {
    /// Creates an adapter for the given REST base URL.
    ///
    /// # Errors
    /// Returns error if the base URL is invalid or the HTTP client cannot be built.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, QuoteProviderError> {
        Url::parse(base_url).map_err(|e| QuoteProviderError::Transport(e.to_string()))?;

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| QuoteProviderError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: format!("{}/api/v3/ticker/bookTicker", base_url.trim_end_matches('/')),
        })
    }
}

#[async_trait]
impl QuoteProvider for BinanceQuoteProvider {
    async fn book_ticker(&self, symbol: &str) -> Result<Quote, QuoteProviderError> {
        let url = Url::parse_with_params(&self.endpoint, &[("symbol", symbol)])
            .map_err(|e| QuoteProviderError::Transport(e.to_string()))?;

        debug!("Requesting book ticker: {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| QuoteProviderError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| QuoteProviderError::Transport(e.to_string()))?;

        if !status.is_success() {
            let message = match serde_json::from_slice::<BinanceErrorBody>(&body) {
                Ok(err) => format!("{} (code: {})", err.msg, err.code),
                Err(_) => String::from_utf8_lossy(&body).into_owned(),
            };
            return Err(QuoteProviderError::Status {
                status: status.as_u16(),
                message,
            });
        }

        serde_json::from_slice(&body).map_err(|e| QuoteProviderError::Decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_quote_usable() {
        assert!(Quote::new("BTCUSDT", dec!(100), dec!(101)).is_usable());
        assert!(!Quote::new("BTCUSDT", dec!(0), dec!(101)).is_usable());
        assert!(!Quote::new("BTCUSDT", dec!(100), dec!(-1)).is_usable());
    }

    #[test]
    fn test_quote_deserializes_binance_strings() {
        let json = r#"{"symbol":"BTCUSDT","bidPrice":"100.50000000","bidQty":"1.2","askPrice":"101.00000000","askQty":"0.8"}"#;
        let quote: Quote = serde_json::from_str(json).unwrap();
        assert_eq!(quote.symbol, "BTCUSDT");
        assert_eq!(quote.bid_price, dec!(100.5));
        assert_eq!(quote.ask_price, dec!(101));
        assert_eq!(quote.bid_qty, Some(dec!(1.2)));
    }

    #[tokio::test]
    async fn test_binance_book_ticker_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v3/ticker/bookTicker"))
            .and(query_param("symbol", "ETHUSDT"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "symbol": "ETHUSDT",
                "bidPrice": "2500.10",
                "bidQty": "3.0",
                "askPrice": "2500.20",
                "askQty": "4.0"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let provider = BinanceQuoteProvider::new(&server.uri(), Duration::from_secs(5)).unwrap();
        let quote = provider.book_ticker("ETHUSDT").await.unwrap();

        assert_eq!(quote.bid_price, dec!(2500.10));
        assert_eq!(quote.ask_price, dec!(2500.20));
    }

    #[tokio::test]
    async fn test_binance_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v3/ticker/bookTicker"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "code": -1121,
                "msg": "Invalid symbol."
            })))
            .mount(&server)
            .await;

        let provider = BinanceQuoteProvider::new(&server.uri(), Duration::from_secs(5)).unwrap();
        let err = provider.book_ticker("NOPEUSDT").await.unwrap_err();

        match err {
            QuoteProviderError::Status { status, message } => {
                assert_eq!(status, 400);
                assert!(message.contains("Invalid symbol."));
                assert!(message.contains("-1121"));
            }
            other => panic!("Expected Status error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_binance_undecodable_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let provider = BinanceQuoteProvider::new(&server.uri(), Duration::from_secs(5)).unwrap();
        let err = provider.book_ticker("BTCUSDT").await.unwrap_err();
        assert!(matches!(err, QuoteProviderError::Decode(_)));
    }

    #[tokio::test]
    async fn test_binance_client_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_delay(Duration::from_secs(2))
                    .set_body_json(serde_json::json!({
                        "symbol": "BTCUSDT",
                        "bidPrice": "1",
                        "askPrice": "2"
                    })),
            )
            .mount(&server)
            .await;

        let provider =
            BinanceQuoteProvider::new(&server.uri(), Duration::from_millis(100)).unwrap();
        let err = provider.book_ticker("BTCUSDT").await.unwrap_err();
        assert!(matches!(err, QuoteProviderError::Transport(_)));
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(BinanceQuoteProvider::new("not a url", Duration::from_secs(1)).is_err());
    }
}
