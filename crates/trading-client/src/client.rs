//! HTTP client for the trading API.

use crate::error::Error;
use crate::relay::RelayClient;
use crate::types::*;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;


/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the API (e.g., "http://localhost:8080").
    pub base_url: String,
    /// Request timeout.
    pub timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

/// HTTP client for the Mock Trading API.
#[derive(Debug, Clone)]
pub struct TradingClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl TradingClient {
    /// Creates a new client with the given configuration.
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be built.
    pub fn new(config: ClientConfig) -> Result<Self, Error> {
        let client = Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: None,
        })
    }

    /// Creates a new client with default configuration.
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be built.
    pub fn with_base_url(base_url: &str) -> Result<Self, Error> {
        Self::new(ClientConfig {
            base_url: base_url.to_string(),
            ..Default::default()
        })
    }

    /// Returns a client that sends `token` as bearer credentials.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// The configured access token.
    #[must_use]
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    // ========================================================================
    // Health
    // ========================================================================

    /// Performs a health check.
    ///
    /// # Errors
    /// Returns error if the request fails.
    pub async fn health_check(&self) -> Result<HealthResponse, Error> {
        let url = format!("{}/health", self.base_url);
        let resp = self.client.get(&url).send().await?;
        self.handle_response(resp).await
    }

    // ========================================================================
    // Accounts
    // ========================================================================

    /// Registers a new user.
    ///
    /// # Errors
    /// Returns error if the request fails or the registration is rejected.
    pub async fn register(&self, request: &RegisterRequest) -> Result<RegisterResponse, Error> {
        let url = format!("{}/api/auth/register", self.base_url);
        let resp = self.client.post(&url).json(request).send().await?;
        self.handle_envelope(resp).await
    }

    /// Logs in and returns a user token.
    ///
    /// # Errors
    /// Returns error if the request fails or the credentials are rejected.
    pub async fn login(&self, email: &str, password: &str) -> Result<TokenResponse, Error> {
        self.login_at("/api/auth/login", email, password).await
    }

    /// Logs in as an administrator and returns an admin token.
    ///
    /// # Errors
    /// Returns error if the request fails or the credentials are rejected.
    pub async fn admin_login(&self, email: &str, password: &str) -> Result<TokenResponse, Error> {
        self.login_at("/api/auth/admin/login", email, password).await
    }

    async fn login_at(&self, path: &str, email: &str, password: &str) -> Result<TokenResponse, Error> {
        let url = format!("{}{}", self.base_url, path);
        let request = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        };
        let resp = self.client.post(&url).json(&request).send().await?;
        self.handle_envelope(resp).await
    }

    // ========================================================================
    // Orders
    // ========================================================================

    /// Places a market-priced order.
    ///
    /// # Errors
    /// Returns error if the request fails or the order is rejected.
    pub async fn place_order(&self, request: &PlaceOrderRequest) -> Result<OrderResponse, Error> {
        let url = format!("{}/api/order", self.base_url);
        let resp = self.authorized(self.client.post(&url))?.json(request).send().await?;
        self.handle_envelope(resp).await
    }

    /// Lists the caller's orders, newest first.
    ///
    /// # Errors
    /// Returns error if the request fails.
    pub async fn list_orders(&self) -> Result<Vec<OrderResponse>, Error> {
        let url = format!("{}/api/order/trade-history", self.base_url);
        let resp = self.authorized(self.client.get(&url))?.send().await?;
        self.handle_envelope(resp).await
    }

    /// Gets one of the caller's orders.
    ///
    /// # Errors
    /// Returns `NotFound` for unknown or foreign orders.
    pub async fn get_order(&self, order_id: i64) -> Result<OrderResponse, Error> {
        let url = format!("{}/api/order/{}", self.base_url, order_id);
        let resp = self.authorized(self.client.get(&url))?.send().await?;
        self.handle_envelope(resp).await
    }

    /// Deletes one of the caller's orders.
    ///
    /// # Errors
    /// Returns `NotFound` for unknown, foreign or already deleted orders.
    pub async fn delete_order(&self, order_id: i64) -> Result<DeleteOrderResponse, Error> {
        let url = format!("{}/api/order/{}", self.base_url, order_id);
        let resp = self.authorized(self.client.delete(&url))?.send().await?;
        self.handle_envelope(resp).await
    }

    // ========================================================================
    // Administration
    // ========================================================================

    /// Lists live relay sessions. Requires an admin token.
    ///
    /// # Errors
    /// Returns error if the request fails.
    pub async fn list_relay_sessions(&self) -> Result<Vec<RelaySessionInfo>, Error> {
        let url = format!("{}/api/admin/relay-sessions", self.base_url);
        let resp = self.authorized(self.client.get(&url))?.send().await?;
        self.handle_envelope(resp).await
    }

    // ========================================================================
    // WebSocket
    // ========================================================================

    /// Returns the relay URL for `symbol`, carrying the token as a query parameter.
    ///
    /// # Errors
    /// Returns error if the query cannot be encoded.
    pub fn market_data_url(&self, symbol: Option<&str>) -> Result<String, Error> {
        let ws_base = self
            .base_url
            .replace("http://", "ws://")
            .replace("https://", "wss://");
        let query = MarketDataQuery {
            symbol: symbol.map(str::to_string),
            token: self.token.clone(),
        };
        let params = serde_urlencoded::to_string(&query)?;

        let mut url = format!("{}/api/market-data", ws_base);
        if !params.is_empty() {
            url.push_str(&format!("?{}", params));
        }
        Ok(url)
    }

    /// Opens a relay session for `symbol`.
    ///
    /// # Errors
    /// Returns error if the upgrade is refused or the connection fails.
    pub async fn relay(&self, symbol: Option<&str>) -> Result<RelayClient, Error> {
        let url = self.market_data_url(symbol)?;
        RelayClient::connect(&url).await
    }

    // ========================================================================
    // Internal Helpers
    // ========================================================================

    fn authorized(&self, builder: RequestBuilder) -> Result<RequestBuilder, Error> {
        let token = self.token.as_deref().ok_or(Error::MissingToken)?;
        Ok(builder.bearer_auth(token))
    }

    async fn handle_response<T: DeserializeOwned>(
        &self,
        resp: reqwest::Response,
    ) -> Result<T, Error> {
        let status = resp.status();

        if status.is_success() {
            Ok(resp.json().await?)
        } else {
            Err(Self::error_from(status, resp).await)
        }
    }

    async fn handle_envelope<T: DeserializeOwned>(
        &self,
        resp: reqwest::Response,
    ) -> Result<T, Error> {
        let envelope: Envelope<T> = self.handle_response(resp).await?;
        envelope.data.ok_or(Error::EmptyResponse(envelope.message))
    }

    async fn error_from(status: StatusCode, resp: reqwest::Response) -> Error {
        let text = resp.text().await.unwrap_or_default();
        let (code, message) = match serde_json::from_str::<ErrorBody>(&text) {
            Ok(body) => (body.error, body.message),
            Err(_) => (String::new(), text),
        };

        match status {
            StatusCode::NOT_FOUND => Error::NotFound(message),
            StatusCode::UNAUTHORIZED => Error::Unauthorized(message),
            _ => Error::Api {
                status: status.as_u16(),
                code,
                message,
            },
        }
    }
}
