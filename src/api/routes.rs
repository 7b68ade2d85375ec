//! Route configuration.

use crate::api::middleware::{relay_auth, require_admin, require_user};
use crate::api::{handlers, websocket};
use crate::state::AppState;
use axum::Router;
use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use std::sync::Arc;

/// Creates the API router.
pub fn create_router(state: Arc<AppState>) -> Router {
    // Orders (user token)
    let orders = Router::new()
        .route("/api/order", post(handlers::place_order))
        .route("/api/order/trade-history", get(handlers::list_orders))
        .route(
            "/api/order/{id}",
            get(handlers::get_order).delete(handlers::delete_order),
        )
        .route_layer(from_fn_with_state(state.clone(), require_user));

    // Administration (admin token)
    let admin = Router::new()
        .route(
            "/api/admin/relay-sessions",
            get(handlers::list_relay_sessions),
        )
        .route_layer(from_fn_with_state(state.clone(), require_admin));

    // Quote relay
    let relay = Router::new()
        .route("/api/market-data", get(websocket::market_data))
        .route_layer(from_fn_with_state(state.clone(), relay_auth));

    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Authentication
        .route("/api/auth/register", post(handlers::register))
        .route("/api/auth/login", post(handlers::login))
        .route("/api/auth/admin/login", post(handlers::admin_login))
        // Relay test page
        .route("/api/market-live", get(websocket::market_live))
        .merge(orders)
        .merge(admin)
        .merge(relay)
        .with_state(state)
}
