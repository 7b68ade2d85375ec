//! HTTP client library for the Mock Trading API.
//!
//! This crate provides a typed client for the trading backend: account
//! registration and login, order placement and history, the admin relay
//! session listing, and a WebSocket client for the live quote relay.
//!
//! # Example
//!
//! ```no_run
//! use trading_client::{ClientConfig, PlaceOrderRequest, OrderSide, TradingClient};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), trading_client::Error> {
//!     let client = TradingClient::new(ClientConfig {
//!         base_url: "http://localhost:8080".into(),
//!         timeout: Duration::from_secs(30),
//!     })?;
//!
//!     let token = client.login("alice@example.com", "password123").await?;
//!     let client = client.with_token(token.access_token);
//!
//!     let order = client
//!         .place_order(&PlaceOrderRequest::new("btc", 0.5, OrderSide::Buy))
//!         .await?;
//!     println!("Filled {} at {}", order.symbol, order.price);
//!
//!     Ok(())
//! }
//! ```

mod client;
mod error;
mod relay;
mod types;

pub use client::{ClientConfig, TradingClient};
pub use error::Error;
pub use relay::{RelayClient, RelayMessage};
pub use types::*;
