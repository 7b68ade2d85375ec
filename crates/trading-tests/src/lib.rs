//! Integration tests for the Mock Trading API.
//!
//! Each test starts the real router on an ephemeral port with in-memory
//! storage, a fixed quote book and a scripted upstream ticker stream, then
//! talks to it through `trading-client`.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt, stream};
use mock_trading_backend::api::create_router;
use mock_trading_backend::config::Config;
use mock_trading_backend::market::{Quote, QuoteProvider, QuoteProviderError};
use mock_trading_backend::relay::{Duplex, RelayError, RelayFrame, UpstreamConnector};
use mock_trading_backend::state::{AppState, Collaborators};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use trading_client::{ClientConfig, RegisterRequest, TradingClient};

/// Email granted admin login on every test server.
pub const ADMIN_EMAIL: &str = "admin@example.com";

/// Password used for every registered test account.
pub const TEST_PASSWORD: &str = "password123";

/// Fixed quote book: `BTCUSDT` 100/101 and `ETHUSDT` 2000/2001.
pub struct StubQuotes {
    book: HashMap<String, (Decimal, Decimal)>,
}

impl Default for StubQuotes {
    fn default() -> Self {
        let book = HashMap::from([
            ("BTCUSDT".to_string(), (Decimal::new(100, 0), Decimal::new(101, 0))),
            ("ETHUSDT".to_string(), (Decimal::new(2000, 0), Decimal::new(2001, 0))),
        ]);
        Self { book }
    }
}

#[async_trait]
impl QuoteProvider for StubQuotes {
    async fn book_ticker(&self, symbol: &str) -> Result<Quote, QuoteProviderError> {
        match self.book.get(symbol) {
            Some((bid, ask)) => Ok(Quote::new(symbol, *bid, *ask)),
            None => Err(QuoteProviderError::Status {
                status: 400,
                message: "Invalid symbol. (code: -1121)".to_string(),
            }),
        }
    }
}

/// Upstream that replays fixed frames, then stays open until the relay closes it.
#[derive(Default)]
pub struct ScriptedUpstream {
    frames: Vec<String>,
    refuse: bool,
    dialed: Mutex<Vec<String>>,
}

impl ScriptedUpstream {
    /// Upstream replaying `frames` on every connection.
    #[must_use]
    pub fn new(frames: Vec<String>) -> Self {
        Self {
            frames,
            ..Default::default()
        }
    }

    /// Upstream refusing every dial.
    #[must_use]
    pub fn refusing() -> Self {
        Self {
            refuse: true,
            ..Default::default()
        }
    }

    /// URLs dialed so far.
    #[must_use]
    pub fn dialed(&self) -> Vec<String> {
        self.dialed.lock().clone()
    }
}

#[async_trait]
impl UpstreamConnector for ScriptedUpstream {
    async fn connect(&self, url: &str) -> Result<Duplex, RelayError> {
        self.dialed.lock().push(url.to_string());
        if self.refuse {
            return Err(RelayError::Dial("connection refused".to_string()));
        }

        let frames: Vec<Result<RelayFrame, RelayError>> = self
            .frames
            .iter()
            .cloned()
            .map(|f| Ok(RelayFrame::Text(f)))
            .collect();
        let stream = stream::iter(frames).chain(stream::pending()).boxed();
        let sink = futures::sink::drain::<RelayFrame>().sink_map_err(|never| match never {});

        Ok(Duplex::new(Box::pin(sink), stream))
    }
}

/// Test server options.
pub struct TestServerOptions {
    /// Require a user token on the relay.
    pub require_relay_auth: bool,
    /// Upstream ticker stream.
    pub upstream: Arc<ScriptedUpstream>,
}

impl Default for TestServerOptions {
    fn default() -> Self {
        Self {
            require_relay_auth: true,
            upstream: Arc::new(ScriptedUpstream::new(vec![sample_ticker("BTCUSDT")])),
        }
    }
}

/// Running in-process server.
pub struct TestServer {
    /// HTTP base URL.
    pub base_url: String,
    /// Shared state of the running server.
    pub state: Arc<AppState>,
    /// Upstream the relay dials.
    pub upstream: Arc<ScriptedUpstream>,
}

impl TestServer {
    /// Starts a server with default options.
    pub async fn start() -> Self {
        Self::start_with(TestServerOptions::default()).await
    }

    /// Starts a server with `options`.
    ///
    /// # Panics
    /// Panics if the listener cannot be bound.
    pub async fn start_with(options: TestServerOptions) -> Self {
        let mut config = Config::default();
        config.auth.user_secret = "integration-user-secret".to_string();
        config.auth.admin_secret = Some("integration-admin-secret".to_string());
        config.auth.admin_emails = vec![ADMIN_EMAIL.to_string()];
        config.auth.password_memory_kib = 64;
        config.auth.password_iterations = 1;
        config.relay.require_auth = options.require_relay_auth;
        config.relay.connect_timeout_secs = 2;

        let upstream = options.upstream;
        let collaborators = Collaborators::in_memory(
            Arc::new(StubQuotes::default()),
            upstream.clone() as Arc<dyn UpstreamConnector>,
        );
        let state = Arc::new(AppState::from_parts(config, collaborators, None));

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind test listener");
        let addr = listener.local_addr().expect("Listener has no address");
        let app = create_router(state.clone());
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self {
            base_url: format!("http://{}", addr),
            state,
            upstream,
        }
    }

    /// Anonymous client for this server.
    ///
    /// # Panics
    /// Panics if the client cannot be built.
    #[must_use]
    pub fn client(&self) -> TradingClient {
        TradingClient::new(ClientConfig {
            base_url: self.base_url.clone(),
            timeout: Duration::from_secs(10),
        })
        .expect("Failed to create client")
    }

    /// Registers a fresh account and returns a client holding its user token.
    ///
    /// # Panics
    /// Panics if registration or login fails.
    pub async fn user_client(&self, username: &str) -> TradingClient {
        let email = format!("{}@example.com", username);
        self.register(username, &email).await;
        let token = self
            .client()
            .login(&email, TEST_PASSWORD)
            .await
            .expect("Login failed");
        self.client().with_token(token.access_token)
    }

    /// Registers the admin account and returns a client holding an admin token.
    ///
    /// # Panics
    /// Panics if registration or admin login fails.
    pub async fn admin_client(&self) -> TradingClient {
        self.register("admin", ADMIN_EMAIL).await;
        let token = self
            .client()
            .admin_login(ADMIN_EMAIL, TEST_PASSWORD)
            .await
            .expect("Admin login failed");
        self.client().with_token(token.access_token)
    }

    async fn register(&self, username: &str, email: &str) {
        self.client()
            .register(&RegisterRequest::new(username, email, TEST_PASSWORD))
            .await
            .expect("Registration failed");
    }

    /// Waits until the number of live relay sessions equals `expected`.
    pub async fn wait_for_sessions(&self, expected: usize) -> bool {
        let registry = self.state.relay.registry().clone();
        tokio::time::timeout(Duration::from_secs(5), async move {
            while registry.active_count() != expected {
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await
        .is_ok()
    }
}

/// Binance-style 24h ticker event for `symbol`.
#[must_use]
pub fn sample_ticker(symbol: &str) -> String {
    format!(
        r#"{{"e":"24hrTicker","E":1700000000000,"s":"{}","p":"12.5","P":"0.03","c":"101.5","b":"100","a":"101"}}"#,
        symbol
    )
}
