//! API request handlers.

use crate::auth::Registration;
use crate::error::{ApiError, ErrorResponse};
use crate::models::{
    ApiResponse, DeleteOrderResponse, HealthResponse, LoginRequest, OrderId, OrderResponse,
    PlaceOrderRequest, Principal, RegisterRequest, RegisterResponse, TokenResponse,
};
use crate::relay::RelaySessionInfo;
use crate::state::AppState;
use crate::token::IssuedToken;
use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::{Extension, Json};
use std::sync::Arc;
use tracing::debug;

/// Token type reported alongside issued tokens.
const TOKEN_TYPE: &str = "Bearer";

fn token_response(issued: IssuedToken) -> TokenResponse {
    TokenResponse {
        access_token: issued.token,
        token_type: TOKEN_TYPE.to_string(),
        token_id: issued.token_id,
        role: issued.role,
        expires_at: issued.expires_at,
    }
}

// ============================================================================
// Health Check
// ============================================================================

/// Health check endpoint.
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse)
    ),
    tag = "Health"
)]
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        relay_sessions: state.relay.registry().active_count(),
    })
}

// ============================================================================
// Authentication
// ============================================================================

/// Register a new user.
#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 200, description = "User registered", body = ApiResponse<RegisterResponse>),
        (status = 400, description = "Invalid registration", body = ErrorResponse),
        (status = 409, description = "Email or username already registered", body = ErrorResponse)
    ),
    tag = "Auth"
)]
pub async fn register(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<RegisterResponse>>, ApiError> {
    let Json(request) = payload?;

    let user_id = state
        .accounts
        .register(Registration {
            username: request.username,
            email: request.email,
            password: request.password,
            confirm_password: request.confirm_password,
        })
        .await?;

    Ok(Json(ApiResponse::ok(
        "User registered successfully",
        RegisterResponse { user_id },
    )))
}

/// Log in and obtain a user token.
#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Token issued", body = ApiResponse<TokenResponse>),
        (status = 400, description = "Malformed request", body = ErrorResponse),
        (status = 401, description = "Invalid credentials", body = ErrorResponse)
    ),
    tag = "Auth"
)]
pub async fn login(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<TokenResponse>>, ApiError> {
    let Json(request) = payload?;
    let issued = state.accounts.login(&request.email, &request.password).await?;
    Ok(Json(ApiResponse::ok("Login successful", token_response(issued))))
}

/// Log in as an administrator and obtain an admin token.
#[utoipa::path(
    post,
    path = "/api/auth/admin/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Admin token issued", body = ApiResponse<TokenResponse>),
        (status = 400, description = "Malformed request", body = ErrorResponse),
        (status = 401, description = "Invalid credentials or not an administrator", body = ErrorResponse)
    ),
    tag = "Auth"
)]
pub async fn admin_login(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<TokenResponse>>, ApiError> {
    let Json(request) = payload?;
    let issued = state
        .accounts
        .admin_login(&request.email, &request.password)
        .await?;
    Ok(Json(ApiResponse::ok(
        "Admin login successful",
        token_response(issued),
    )))
}

// ============================================================================
// Orders
// ============================================================================

/// Place a market-priced order.
///
/// The order is priced at the current ask for `buy` and the current bid for
/// `sell`, then persisted. Nothing is stored when pricing fails.
#[utoipa::path(
    post,
    path = "/api/order",
    request_body = PlaceOrderRequest,
    responses(
        (status = 200, description = "Order completed", body = ApiResponse<OrderResponse>),
        (status = 400, description = "Invalid side, symbol or volume", body = ErrorResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse),
        (status = 500, description = "Quote provider or storage unavailable", body = ErrorResponse)
    ),
    security(("bearer" = [])),
    tag = "Orders"
)]
pub async fn place_order(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    payload: Result<Json<PlaceOrderRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<OrderResponse>>, ApiError> {
    let Json(request) = payload?;

    let order = state
        .orders
        .submit(
            principal.user_id,
            &request.symbol,
            request.volume,
            &request.order_type,
        )
        .await?;

    Ok(Json(ApiResponse::ok("Order completed", order.into())))
}

/// List the caller's orders, newest first.
#[utoipa::path(
    get,
    path = "/api/order/trade-history",
    responses(
        (status = 200, description = "Caller's orders", body = ApiResponse<Vec<OrderResponse>>),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse)
    ),
    security(("bearer" = [])),
    tag = "Orders"
)]
pub async fn list_orders(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<ApiResponse<Vec<OrderResponse>>>, ApiError> {
    let orders = state.orders.list(principal.user_id).await?;
    debug!("User {} has {} orders", principal.user_id, orders.len());

    Ok(Json(ApiResponse::ok(
        "Orders retrieved",
        orders.into_iter().map(OrderResponse::from).collect(),
    )))
}

/// Get one of the caller's orders.
#[utoipa::path(
    get,
    path = "/api/order/{id}",
    params(
        ("id" = i64, Path, description = "Order ID")
    ),
    responses(
        (status = 200, description = "Order", body = ApiResponse<OrderResponse>),
        (status = 400, description = "Invalid order ID", body = ErrorResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse),
        (status = 404, description = "Order not found", body = ErrorResponse)
    ),
    security(("bearer" = [])),
    tag = "Orders"
)]
pub async fn get_order(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    path: Result<Path<OrderId>, PathRejection>,
) -> Result<Json<ApiResponse<OrderResponse>>, ApiError> {
    let Path(order_id) = path?;
    let order = state.orders.get(principal.user_id, order_id).await?;
    Ok(Json(ApiResponse::ok("Order retrieved", order.into())))
}

/// Delete one of the caller's orders.
#[utoipa::path(
    delete,
    path = "/api/order/{id}",
    params(
        ("id" = i64, Path, description = "Order ID")
    ),
    responses(
        (status = 200, description = "Order deleted", body = ApiResponse<DeleteOrderResponse>),
        (status = 400, description = "Invalid order ID", body = ErrorResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse),
        (status = 404, description = "Order not found", body = ErrorResponse)
    ),
    security(("bearer" = [])),
    tag = "Orders"
)]
pub async fn delete_order(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    path: Result<Path<OrderId>, PathRejection>,
) -> Result<Json<ApiResponse<DeleteOrderResponse>>, ApiError> {
    let Path(order_id) = path?;
    state.orders.delete(principal.user_id, order_id).await?;
    Ok(Json(ApiResponse::ok(
        "Order deleted",
        DeleteOrderResponse { order_id },
    )))
}

// ============================================================================
// Administration
// ============================================================================

/// List live quote relay sessions.
#[utoipa::path(
    get,
    path = "/api/admin/relay-sessions",
    responses(
        (status = 200, description = "Live relay sessions", body = ApiResponse<Vec<RelaySessionInfo>>),
        (status = 401, description = "Missing or invalid admin token", body = ErrorResponse)
    ),
    security(("bearer" = [])),
    tag = "Admin"
)]
pub async fn list_relay_sessions(
    State(state): State<Arc<AppState>>,
) -> Json<ApiResponse<Vec<RelaySessionInfo>>> {
    let sessions = state.relay.registry().snapshot();
    Json(ApiResponse::ok("Relay sessions retrieved", sessions))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::market::{MockQuoteProvider, Quote, QuoteProviderError};
    use crate::models::OrderSide;
    use crate::relay::{Duplex, RelayError, UpstreamConnector};
    use crate::state::Collaborators;
    use crate::token::Role;
    use async_trait::async_trait;
    use rust_decimal_macros::dec;

    const ADMIN_EMAIL: &str = "ops@example.com";

    struct NoUpstream;

    #[async_trait]
    impl UpstreamConnector for NoUpstream {
        async fn connect(&self, _url: &str) -> Result<Duplex, RelayError> {
            Err(RelayError::Dial("offline".to_string()))
        }
    }

    fn test_config() -> Config {
        let mut config = Config::default();
        config.auth.user_secret = "handler-user-secret".to_string();
        config.auth.admin_secret = Some("handler-admin-secret".to_string());
        config.auth.admin_emails = vec![ADMIN_EMAIL.to_string()];
        config.auth.password_memory_kib = 64;
        config.auth.password_iterations = 1;
        config
    }

    fn create_test_state(quotes: MockQuoteProvider) -> Arc<AppState> {
        Arc::new(AppState::from_parts(
            test_config(),
            Collaborators::in_memory(Arc::new(quotes), Arc::new(NoUpstream)),
            None,
        ))
    }

    fn quotes_100_101() -> MockQuoteProvider {
        let mut mock = MockQuoteProvider::new();
        mock.expect_book_ticker()
            .returning(|s| Ok(Quote::new(s, dec!(100), dec!(101))));
        mock
    }

    fn principal(user_id: i64) -> Extension<Principal> {
        Extension(Principal {
            user_id,
            role: Role::User,
        })
    }

    fn order_request(symbol: &str, side: &str) -> PlaceOrderRequest {
        PlaceOrderRequest {
            symbol: symbol.to_string(),
            volume: dec!(0.5),
            order_type: side.to_string(),
        }
    }

    async fn register_user(state: &Arc<AppState>, username: &str, email: &str) -> i64 {
        let response = register(
            State(state.clone()),
            Ok(Json(RegisterRequest {
                username: username.to_string(),
                email: email.to_string(),
                password: "password123".to_string(),
                confirm_password: "password123".to_string(),
            })),
        )
        .await
        .unwrap()
        .0;
        response.data.unwrap().user_id
    }

    #[tokio::test]
    async fn test_health_check() {
        let state = create_test_state(MockQuoteProvider::new());
        let response = health_check(State(state)).await.0;

        assert_eq!(response.status, "healthy");
        assert_eq!(response.version, env!("CARGO_PKG_VERSION"));
        assert_eq!(response.relay_sessions, 0);
    }

    #[tokio::test]
    async fn test_register_and_login() {
        let state = create_test_state(MockQuoteProvider::new());
        let user_id = register_user(&state, "alice", "alice@example.com").await;

        let response = login(
            State(state.clone()),
            Ok(Json(LoginRequest {
                email: "alice@example.com".to_string(),
                password: "password123".to_string(),
            })),
        )
        .await
        .unwrap()
        .0;

        assert!(response.success);
        let token = response.data.unwrap();
        assert_eq!(token.token_type, "Bearer");
        assert_eq!(token.role, Role::User);

        let verified = state.tokens.verify(&token.access_token, Role::User).unwrap();
        assert_eq!(verified.user_id, user_id);
    }

    #[tokio::test]
    async fn test_register_duplicate_email_is_conflict() {
        let state = create_test_state(MockQuoteProvider::new());
        register_user(&state, "alice", "alice@example.com").await;

        let err = register(
            State(state),
            Ok(Json(RegisterRequest {
                username: "alice2".to_string(),
                email: "alice@example.com".to_string(),
                password: "password123".to_string(),
                confirm_password: "password123".to_string(),
            })),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, ApiError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_login_wrong_password_is_unauthorized() {
        let state = create_test_state(MockQuoteProvider::new());
        register_user(&state, "alice", "alice@example.com").await;

        let err = login(
            State(state),
            Ok(Json(LoginRequest {
                email: "alice@example.com".to_string(),
                password: "wrong-password".to_string(),
            })),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, ApiError::Unauthorized));
    }

    #[tokio::test]
    async fn test_admin_login() {
        let state = create_test_state(MockQuoteProvider::new());
        register_user(&state, "ops", ADMIN_EMAIL).await;
        register_user(&state, "bob", "bob@example.com").await;

        let response = admin_login(
            State(state.clone()),
            Ok(Json(LoginRequest {
                email: ADMIN_EMAIL.to_string(),
                password: "password123".to_string(),
            })),
        )
        .await
        .unwrap()
        .0;
        let token = response.data.unwrap();
        assert_eq!(token.role, Role::Admin);
        assert!(state.tokens.verify(&token.access_token, Role::Admin).is_ok());
        assert!(state.tokens.verify(&token.access_token, Role::User).is_err());

        let err = admin_login(
            State(state),
            Ok(Json(LoginRequest {
                email: "bob@example.com".to_string(),
                password: "password123".to_string(),
            })),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized));
    }

    #[tokio::test]
    async fn test_place_order_buy_uses_ask() {
        let state = create_test_state(quotes_100_101());

        let response = place_order(
            State(state),
            principal(7),
            Ok(Json(order_request("btc", "buy"))),
        )
        .await
        .unwrap()
        .0;

        assert!(response.success);
        assert_eq!(response.message, "Order completed");
        let order = response.data.unwrap();
        assert_eq!(order.symbol, "BTCUSDT");
        assert_eq!(order.volume, dec!(0.5));
        assert_eq!(order.price, dec!(101));
        assert_eq!(order.side, OrderSide::Buy);
    }

    #[tokio::test]
    async fn test_place_order_sell_uses_bid() {
        let state = create_test_state(quotes_100_101());

        let order = place_order(
            State(state),
            principal(7),
            Ok(Json(order_request("eth", "sell"))),
        )
        .await
        .unwrap()
        .0
        .data
        .unwrap();

        assert_eq!(order.symbol, "ETHUSDT");
        assert_eq!(order.price, dec!(100));
    }

    #[tokio::test]
    async fn test_place_order_invalid_side() {
        let state = create_test_state(MockQuoteProvider::new());

        let err = place_order(
            State(state.clone()),
            principal(7),
            Ok(Json(order_request("btc", "BUY"))),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, ApiError::InvalidRequest(_)));
        assert!(state.orders.list(7).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_place_order_quote_unavailable() {
        let mut mock = MockQuoteProvider::new();
        mock.expect_book_ticker().returning(|_| {
            Err(QuoteProviderError::Status {
                status: 400,
                message: "Invalid symbol. (code: -1121)".to_string(),
            })
        });
        let state = create_test_state(mock);

        let err = place_order(
            State(state.clone()),
            principal(7),
            Ok(Json(order_request("nope", "buy"))),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, ApiError::Upstream(_)));
        assert!(state.orders.list(7).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_orders_are_scoped_to_owner() {
        let state = create_test_state(quotes_100_101());

        let placed = place_order(
            State(state.clone()),
            principal(1),
            Ok(Json(order_request("btc", "buy"))),
        )
        .await
        .unwrap()
        .0
        .data
        .unwrap();

        let own = list_orders(State(state.clone()), principal(1)).await.unwrap().0;
        assert_eq!(own.data.unwrap().len(), 1);

        let other = list_orders(State(state.clone()), principal(2)).await.unwrap().0;
        assert!(other.data.unwrap().is_empty());

        let err = get_order(State(state.clone()), principal(2), Ok(Path(placed.order_id)))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));

        let fetched = get_order(State(state), principal(1), Ok(Path(placed.order_id)))
            .await
            .unwrap()
            .0
            .data
            .unwrap();
        assert_eq!(fetched.order_uuid, placed.order_uuid);
    }

    #[tokio::test]
    async fn test_delete_order() {
        let state = create_test_state(quotes_100_101());

        let placed = place_order(
            State(state.clone()),
            principal(1),
            Ok(Json(order_request("btc", "buy"))),
        )
        .await
        .unwrap()
        .0
        .data
        .unwrap();

        let err = delete_order(State(state.clone()), principal(2), Ok(Path(placed.order_id)))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));

        let deleted = delete_order(State(state.clone()), principal(1), Ok(Path(placed.order_id)))
            .await
            .unwrap()
            .0;
        assert_eq!(deleted.data.unwrap().order_id, placed.order_id);

        let err = delete_order(State(state), principal(1), Ok(Path(placed.order_id)))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_list_relay_sessions() {
        let state = create_test_state(MockQuoteProvider::new());
        let registry = state.relay.registry().clone();
        let first = registry.register("BTCUSDT".to_string(), Some(1));
        let second = registry.register("ETHUSDT".to_string(), None);

        let response = list_relay_sessions(State(state.clone())).await.0;
        let sessions = response.data.unwrap();
        assert_eq!(sessions.len(), 2);

        drop(first);
        drop(second);
        let response = list_relay_sessions(State(state)).await.0;
        assert!(response.data.unwrap().is_empty());
    }
}
