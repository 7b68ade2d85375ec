//! # Mock Trading Backend - REST API Server
//!
//! A mock trading backend: users register and log in, place buy/sell orders
//! priced against a live external quote feed, and watch a real-time ticker
//! relayed over WebSocket. Built with [Axum](https://crates.io/crates/axum)
//! for async HTTP handling and provides OpenAPI/Swagger documentation via
//! [utoipa](https://crates.io/crates/utoipa).
//!
//! ## Key Features
//!
//! - **Market-Priced Orders**: Buy orders fill at the current ask, sell orders
//!   at the current bid, fetched from the Binance book ticker.
//!
//! - **Role-Scoped Tokens**: HS256 access tokens signed with a per-role secret,
//!   so a `user` token never authorizes an `admin` route.
//!
//! - **Quote Relay**: Each WebSocket caller is paired with one upstream ticker
//!   stream; frames are forwarded verbatim and both sides close together.
//!
//! - **Pluggable Storage**: PostgreSQL through `sqlx` when `DATABASE_URL` is set,
//!   in-memory stores otherwise.
//!
//! - **OpenAPI Documentation**: Auto-generated Swagger UI at `/swagger-ui/`.
//!
//! ## Module Structure
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`api`] | Route handlers, auth middleware and router configuration |
//! | [`auth`] | Registration, login and password hashing |
//! | [`config`] | TOML configuration with environment overrides |
//! | [`credentials`] | Credential store trait and in-memory implementation |
//! | [`db`] | PostgreSQL pool, migrations and stores |
//! | [`error`] | API error types with `IntoResponse` implementation |
//! | [`ledger`] | Order ledger trait and in-memory implementation |
//! | [`market`] | Quote provider and side-based price resolution |
//! | [`models`] | Domain types and request/response DTOs |
//! | [`orders`] | Order submission, listing and deletion |
//! | [`relay`] | Live quote relay sessions |
//! | [`state`] | Application state management |
//! | [`token`] | Token issuance and verification |
//!
//! ## API Endpoints
//!
//! | Method | Endpoint | Auth | Description |
//! |--------|----------|------|-------------|
//! | GET | `/health` | - | Health check |
//! | POST | `/api/auth/register` | - | Register a user |
//! | POST | `/api/auth/login` | - | Obtain a user token |
//! | POST | `/api/auth/admin/login` | - | Obtain an admin token |
//! | POST | `/api/order` | user | Place an order |
//! | GET | `/api/order/trade-history` | user | List own orders |
//! | GET | `/api/order/{id}` | user | Get an own order |
//! | DELETE | `/api/order/{id}` | user | Delete an own order |
//! | GET | `/api/market-data` | user | Live ticker (WebSocket) |
//! | GET | `/api/market-live` | - | Ticker test page |
//! | GET | `/api/admin/relay-sessions` | admin | Live relay sessions |
//!
//! ## Example Usage
//!
//! ```bash
//! # Start the server (in-memory storage)
//! TOKEN_USER_SECRET=change-me-to-something-long cargo run
//!
//! # Register and log in
//! curl -X POST http://localhost:8080/api/auth/register \
//!   -H "Content-Type: application/json" \
//!   -d '{"username":"alice","email":"alice@example.com","password":"password123","confirm_password":"password123"}'
//! curl -X POST http://localhost:8080/api/auth/login \
//!   -H "Content-Type: application/json" \
//!   -d '{"email":"alice@example.com","password":"password123"}'
//!
//! # Buy 0.5 BTC at the current ask
//! curl -X POST http://localhost:8080/api/order \
//!   -H "Authorization: Bearer $TOKEN" \
//!   -H "Content-Type: application/json" \
//!   -d '{"symbol":"btc","volume":0.5,"type":"buy"}'
//! ```

pub mod api;
pub mod auth;
pub mod config;
pub mod credentials;
pub mod db;
pub mod error;
pub mod ledger;
pub mod market;
pub mod models;
pub mod orders;
pub mod relay;
pub mod state;
pub mod token;
