//! Domain types and request/response models for the REST API.

use crate::token::Role;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

/// Opaque user identity assigned by the credential store.
pub type UserId = i64;

/// Ledger-assigned order identifier.
pub type OrderId = i64;

/// Caller identity established for a single request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Principal {
    /// Authenticated user.
    pub user_id: UserId,
    /// Role the request was authorized for.
    pub role: Role,
}

/// Order side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    /// Buy at the ask.
    Buy,
    /// Sell at the bid.
    Sell,
}

impl OrderSide {
    /// Wire representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Buy => "buy",
            Self::Sell => "sell",
        }
    }
}

impl std::fmt::Display for OrderSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderSide {
    type Err = String;

    /// Parses a side. Matching is case-sensitive.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "buy" => Ok(Self::Buy),
            "sell" => Ok(Self::Sell),
            _ => Err(format!("Invalid order type: {}. Use 'buy' or 'sell'", s)),
        }
    }
}

/// Order lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    /// Priced and persisted.
    Accepted,
}

impl OrderStatus {
    /// Wire representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Accepted => "accepted",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "accepted" => Ok(Self::Accepted),
            _ => Err(format!("Invalid order status: {}", s)),
        }
    }
}

/// A fully built order that has not been persisted yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewOrder {
    /// Client-correlatable unique identifier.
    pub order_uuid: Uuid,
    /// Owning user.
    pub owner: UserId,
    /// Normalized market symbol.
    pub symbol: String,
    /// Requested volume.
    pub volume: Decimal,
    /// Order side.
    pub side: OrderSide,
    /// Price selected from the quote by side.
    pub execution_price: Decimal,
    /// Status at creation.
    pub status: OrderStatus,
    /// Creation instant.
    pub created_at: DateTime<Utc>,
}

impl NewOrder {
    /// Attaches the ledger-assigned identifier.
    #[must_use]
    pub fn into_order(self, order_id: OrderId) -> Order {
        Order {
            order_id,
            order_uuid: self.order_uuid,
            owner: self.owner,
            symbol: self.symbol,
            volume: self.volume,
            side: self.side,
            execution_price: self.execution_price,
            status: self.status,
            created_at: self.created_at,
        }
    }
}

/// A persisted order.
#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    /// Ledger-assigned identifier.
    pub order_id: OrderId,
    /// Client-correlatable unique identifier.
    pub order_uuid: Uuid,
    /// Owning user.
    pub owner: UserId,
    /// Normalized market symbol.
    pub symbol: String,
    /// Requested volume.
    pub volume: Decimal,
    /// Order side.
    pub side: OrderSide,
    /// Price selected from the quote by side.
    pub execution_price: Decimal,
    /// Current status.
    pub status: OrderStatus,
    /// Creation instant.
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// Envelope
// ============================================================================

/// Uniform response envelope.
#[derive(Debug, Serialize, ToSchema)]
pub struct ApiResponse<T> {
    /// Whether the operation succeeded.
    pub success: bool,
    /// Human-readable outcome.
    pub message: String,
    /// Error code on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Payload on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    /// Successful envelope carrying `data`.
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            error: None,
            data: Some(data),
        }
    }
}

// ============================================================================
// Accounts
// ============================================================================

/// Registration request.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
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

/// Registration result.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
    /// Identifier of the new user.
    pub user_id: UserId,
}

/// Login request.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct LoginRequest {
    /// Login email.
    pub email: String,
    /// Plain-text password.
    pub password: String,
}

/// Issued access token.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    /// Bearer token to send in the `Authorization` header.
    pub access_token: String,
    /// Always `Bearer`.
    pub token_type: String,
    /// Unique token identifier.
    pub token_id: String,
    /// Scope of the token.
    pub role: Role,
    /// Absolute expiry instant.
    pub expires_at: DateTime<Utc>,
}

// ============================================================================
// Orders
// ============================================================================

/// Request to place a market-priced order.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct PlaceOrderRequest {
    /// Symbol, e.g. `btc` or `BTCUSDT`.
    pub symbol: String,
    /// Volume, strictly positive.
    #[schema(value_type = f64)]
    pub volume: Decimal,
    /// `buy` or `sell` (case-sensitive).
    #[serde(rename = "type")]
    pub order_type: String,
}

/// Order as returned to its owner.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OrderResponse {
    /// Ledger-assigned identifier.
    #[serde(rename = "orderId")]
    pub order_id: OrderId,
    /// Client-correlatable unique identifier.
    #[serde(rename = "orderUUID")]
    pub order_uuid: Uuid,
    /// Normalized symbol.
    pub symbol: String,
    /// Volume.
    #[serde(with = "rust_decimal::serde::float")]
    #[schema(value_type = f64)]
    pub volume: Decimal,
    /// Execution price.
    #[serde(with = "rust_decimal::serde::float")]
    #[schema(value_type = f64)]
    pub price: Decimal,
    /// Order side.
    #[serde(rename = "type")]
    pub side: OrderSide,
    /// Order status.
    pub status: OrderStatus,
    /// Creation instant.
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        Self {
            order_id: order.order_id,
            order_uuid: order.order_uuid,
            symbol: order.symbol,
            volume: order.volume,
            price: order.execution_price,
            side: order.side,
            status: order.status,
            created_at: order.created_at,
        }
    }
}

/// Result of deleting an order.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeleteOrderResponse {
    /// Identifier of the removed order.
    pub order_id: OrderId,
}

// ============================================================================
// Health
// ============================================================================

/// Health check response.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Service status.
    pub status: String,
    /// Service version.
    pub version: String,
    /// Number of live quote relay sessions.
    pub relay_sessions: usize,
}
