//! Application state management.

use crate::auth::{AccountService, PasswordPolicy};
use crate::config::Config;
use crate::credentials::{CredentialStore, InMemoryCredentialStore};
use crate::db::{DatabasePool, PgCredentialStore, PgOrderLedger};
use crate::ledger::{InMemoryOrderLedger, OrderLedger};
use crate::market::{BinanceQuoteProvider, PriceResolver, QuoteProvider, QuoteProviderError};
use crate::orders::OrderService;
use crate::relay::{self, QuoteRelay, RelayRegistry, TungsteniteConnector, UpstreamConnector};
use crate::token::{Role, TokenSecrets, TokenService};
use std::sync::Arc;
use tracing::{info, warn};

/// External collaborators the services run against.
pub struct Collaborators {
    /// Credential storage.
    pub credentials: Arc<dyn CredentialStore>,
    /// Order storage.
    pub ledger: Arc<dyn OrderLedger>,
    /// Quote source for order pricing.
    pub quotes: Arc<dyn QuoteProvider>,
    /// Upstream ticker stream connector.
    pub upstream: Arc<dyn UpstreamConnector>,
}

impl Collaborators {
    /// In-memory stores with the given market data sources.
    #[must_use]
    pub fn in_memory(
        quotes: Arc<dyn QuoteProvider>,
        upstream: Arc<dyn UpstreamConnector>,
    ) -> Self {
        Self {
            credentials: Arc::new(InMemoryCredentialStore::new()),
            ledger: Arc::new(InMemoryOrderLedger::new()),
            quotes,
            upstream,
        }
    }
}

/// Application state shared across all handlers.
pub struct AppState {
    /// Application configuration.
    pub config: Config,
    /// Token issuance and verification.
    pub tokens: Arc<TokenService>,
    /// Registration and login.
    pub accounts: AccountService,
    /// Order execution pipeline.
    pub orders: OrderService,
    /// Live quote relay.
    pub relay: QuoteRelay,
    /// Optional database pool.
    pub db: Option<DatabasePool>,
}

impl AppState {
    /// Creates the production state: Binance market data, PostgreSQL storage
    /// when a pool is given and in-memory storage otherwise.
    ///
    /// # Errors
    /// Returns error if the quote provider cannot be built.
    pub fn from_config(config: Config, db: Option<DatabasePool>) -> Result<Self, QuoteProviderError> {
        let quotes: Arc<dyn QuoteProvider> = Arc::new(BinanceQuoteProvider::new(
            &config.market.rest_base_url,
            config.market.quote_timeout(),
        )?);
        let upstream: Arc<dyn UpstreamConnector> = Arc::new(TungsteniteConnector);

        let collaborators = match &db {
            Some(pool) => {
                info!("Using PostgreSQL storage");
                Collaborators {
                    credentials: Arc::new(PgCredentialStore::new(pool.clone())),
                    ledger: Arc::new(PgOrderLedger::new(pool.clone())),
                    quotes,
                    upstream,
                }
            }
            None => {
                info!("No database configured, using in-memory storage");
                Collaborators::in_memory(quotes, upstream)
            }
        };

        Ok(Self::from_parts(config, collaborators, db))
    }

    /// Creates state over explicit collaborators.
    #[must_use]
    pub fn from_parts(config: Config, parts: Collaborators, db: Option<DatabasePool>) -> Self {
        let tokens = Arc::new(TokenService::new(TokenSecrets::new(
            Some(&config.auth.user_secret),
            config.auth.admin_secret.as_deref(),
        )));
        if !tokens.supports(Role::Admin) {
            warn!("No admin secret configured, admin login is disabled");
        }

        let accounts = AccountService::new(
            parts.credentials,
            Arc::clone(&tokens),
            config.auth.access_token_ttl(),
            config.auth.admin_emails.clone(),
            PasswordPolicy {
                memory_kib: config.auth.password_memory_kib,
                iterations: config.auth.password_iterations,
            },
        );

        let resolver = PriceResolver::new(
            parts.quotes,
            config.market.quote_currency.clone(),
            config.market.quote_timeout(),
        );
        let orders = OrderService::new(resolver, parts.ledger, config.market.storage_timeout());

        let relay = QuoteRelay::new(
            Arc::new(RelayRegistry::new()),
            parts.upstream,
            relay::RelayConfig {
                stream_base_url: config.relay.stream_base_url.clone(),
                connect_timeout: config.relay.connect_timeout(),
            },
        );

        Self {
            config,
            tokens,
            accounts,
            orders,
            relay,
            db,
        }
    }
}
