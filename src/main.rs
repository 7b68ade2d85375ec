//! Mock Trading Backend Server
//!
//! REST API server for accounts, market-priced orders and a live quote relay.

use mock_trading_backend::api::create_router;
use mock_trading_backend::api::middleware::request_span;
use mock_trading_backend::config::Config;
use mock_trading_backend::db::DatabasePool;
use mock_trading_backend::state::AppState;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

use mock_trading_backend::error::ErrorResponse;
use mock_trading_backend::models::{
    DeleteOrderResponse, HealthResponse, LoginRequest, OrderResponse, OrderSide, OrderStatus,
    PlaceOrderRequest, RegisterRequest, RegisterResponse, TokenResponse,
};
use mock_trading_backend::relay::RelaySessionInfo;
use mock_trading_backend::token::Role;

/// Default configuration file, overridable with `CONFIG_PATH`.
const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// OpenAPI documentation.
#[derive(OpenApi)]
#[openapi(
    paths(
        mock_trading_backend::api::handlers::health_check,
        mock_trading_backend::api::handlers::register,
        mock_trading_backend::api::handlers::login,
        mock_trading_backend::api::handlers::admin_login,
        mock_trading_backend::api::handlers::place_order,
        mock_trading_backend::api::handlers::list_orders,
        mock_trading_backend::api::handlers::get_order,
        mock_trading_backend::api::handlers::delete_order,
        mock_trading_backend::api::handlers::list_relay_sessions,
        mock_trading_backend::api::websocket::market_data,
        mock_trading_backend::api::websocket::market_live,
    ),
    components(
        schemas(
            HealthResponse,
            ErrorResponse,
            RegisterRequest,
            RegisterResponse,
            LoginRequest,
            TokenResponse,
            Role,
            PlaceOrderRequest,
            OrderResponse,
            OrderSide,
            OrderStatus,
            DeleteOrderResponse,
            RelaySessionInfo,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoints"),
        (name = "Auth", description = "Registration and login"),
        (name = "Orders", description = "Market-priced orders"),
        (name = "Market Data", description = "Live quote relay"),
        (name = "Admin", description = "Operator endpoints"),
    ),
    info(
        title = "Mock Trading API",
        version = "0.1.0",
        description = "REST API for mock trading against live market quotes",
        license(name = "MIT")
    )
)]
struct ApiDoc;

/// Registers the `bearer` scheme referenced by protected paths.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config_path =
        std::env::var("CONFIG_PATH").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let config = Config::from_env(&config_path)?;
    info!("Loaded configuration from {}", config_path);

    // Connect to the database when one is configured
    let db = DatabasePool::from_config(&config.database).await?;
    if let Some(pool) = &db
        && config.database.run_migrations
    {
        pool.run_migrations().await?;
    }

    let host = config.server.host.clone();
    let port = config.server.port;

    // Create application state
    let state = Arc::new(AppState::from_config(config, db)?);

    info!("Starting Mock Trading Backend on {}:{}", host, port);
    info!("Swagger UI available at http://{}:{}/swagger-ui/", host, port);

    // Configure CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Build the router
    let app = create_router(state)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(cors)
        .layer(TraceLayer::new_for_http().make_span_with(request_span));

    // Start the server
    let addr = format!("{}:{}", host, port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
