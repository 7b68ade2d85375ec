//! Request and response types for the trading API.

use serde::{Deserialize, Serialize};


/// Order side for trading operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    /// Buy at the ask.
    Buy,
    /// Sell at the bid.
    Sell,
}

impl std::fmt::Display for OrderSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Buy => write!(f, "buy"),
            Self::Sell => write!(f, "sell"),
        }
    }
}

/// Order lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    /// Priced and persisted.
    Accepted,
}

/// Token scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Regular trading user.
    User,
    /// Operator.
    Admin,
}

// ============================================================================
// Envelope
// ============================================================================

/// Uniform response envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T> {
    /// Whether the operation succeeded.
    pub success: bool,
    /// Human-readable outcome.
    pub message: String,
    /// Error code on failure.
    pub error: Option<String>,
    /// Payload on success.
    pub data: Option<T>,
}

/// Error envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Always `false`.
    pub success: bool,
    /// User-safe message.
    pub message: String,
    /// Error code.
    pub error: String,
}

// ============================================================================
// Health
// ============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Service status.
    pub status: String,
    /// Service version.
    pub version: String,
    /// Number of live relay sessions.
    pub relay_sessions: usize,
}

// ============================================================================
// Accounts
// ============================================================================

/// Registration request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    /// 3 to 20 ASCII alphanumerics.
    pub username: String,
    /// Login email.
    pub email: String,
    /// At least 8 characters.
    pub password: String,
    /// Must equal `password`.
    pub confirm_password: String,
}

impl RegisterRequest {
    /// Creates a request with a matching confirmation.
    #[must_use]
    pub fn new(username: &str, email: &str, password: &str) -> Self {
        Self {
            username: username.to_string(),
            email: email.to_string(),
            password: password.to_string(),
            confirm_password: password.to_string(),
        }
    }
}

/// Registration result.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
    /// Identifier of the new user.
    pub user_id: i64,
}

/// Login request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    /// Login email.
    pub email: String,
    /// Password.
    pub password: String,
}

/// Issued access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    /// Bearer token.
    pub access_token: String,
    /// Always `Bearer`.
    pub token_type: String,
    /// Unique token identifier.
    pub token_id: String,
    /// Token scope.
    pub role: Role,
    /// RFC 3339 expiry instant.
    pub expires_at: String,
}

// ============================================================================
// Orders
// ============================================================================

/// Request to place a market-priced order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaceOrderRequest {
    /// Symbol, e.g. `btc` or `BTCUSDT`.
    pub symbol: String,
    /// Volume, strictly positive.
    pub volume: f64,
    /// Side.
    #[serde(rename = "type")]
    pub side: OrderSide,
}

impl PlaceOrderRequest {
    /// Creates an order request.
    #[must_use]
    pub fn new(symbol: &str, volume: f64, side: OrderSide) -> Self {
        Self {
            symbol: symbol.to_string(),
            volume,
            side,
        }
    }
}

/// Order as returned to its owner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderResponse {
    /// Ledger-assigned identifier.
    #[serde(rename = "orderId")]
    pub order_id: i64,
    /// Unique order UUID.
    #[serde(rename = "orderUUID")]
    pub order_uuid: String,
    /// Normalized symbol.
    pub symbol: String,
    /// Volume.
    pub volume: f64,
    /// Execution price.
    pub price: f64,
    /// Side.
    #[serde(rename = "type")]
    pub side: OrderSide,
    /// Status.
    pub status: OrderStatus,
    /// RFC 3339 creation instant.
    #[serde(rename = "createdAt")]
    pub created_at: String,
}

/// Result of deleting an order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteOrderResponse {
    /// Identifier of the removed order.
    pub order_id: i64,
}

// ============================================================================
// Relay
// ============================================================================

/// Live relay session as listed to operators.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelaySessionInfo {
    /// Session identifier.
    pub session_id: String,
    /// Relayed symbol.
    pub symbol: String,
    /// Authenticated caller, if any.
    pub user_id: Option<i64>,
    /// RFC 3339 start instant.
    pub opened_at: String,
}

/// Query parameters of the relay endpoint.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MarketDataQuery {
    /// Symbol to stream.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    /// Access token.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

/// Binance 24h rolling ticker event, as relayed verbatim.
///
/// Prices are decimal strings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ticker {
    /// Event type, `24hrTicker`.
    #[serde(rename = "e")]
    pub event_type: String,
    /// Event time in milliseconds.
    #[serde(rename = "E")]
    pub event_time: u64,
    /// Symbol.
    #[serde(rename = "s")]
    pub symbol: String,
    /// Price change percent.
    #[serde(rename = "P")]
    pub price_change_percent: String,
    /// Last price.
    #[serde(rename = "c")]
    pub last_price: String,
    /// Best bid price.
    #[serde(rename = "b")]
    pub bid_price: String,
    /// Best ask price.
    #[serde(rename = "a")]
    pub ask_price: String,
}
