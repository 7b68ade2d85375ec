//! Configuration module for loading and parsing TOML configuration files.
//!
//! Every section is optional and falls back to its defaults. Environment
//! variables override a handful of deployment values after parsing.

use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Minimum accepted signing secret length in bytes.
const MIN_SECRET_LEN: usize = 16;

/// Configuration error types.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),
    /// Failed to parse TOML configuration.
    #[error("failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),
    /// Invalid configuration value.
    #[error("invalid config value: {0}")]
    InvalidValue(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Server configuration.
    pub server: ServerConfig,
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Token and password configuration.
    pub auth: AuthConfig,
    /// Quote provider configuration.
    pub market: MarketConfig,
    /// Quote relay configuration.
    pub relay: RelayConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host address to bind to.
    pub host: String,
    /// Port number to listen on.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

/// Database configuration. Without a URL the service keeps everything in memory.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// PostgreSQL connection string.
    pub url: Option<String>,
    /// Pool size.
    pub max_connections: u32,
    /// Seconds to wait for a pooled connection.
    pub acquire_timeout_secs: u64,
    /// Apply embedded migrations at startup.
    pub run_migrations: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: 10,
            acquire_timeout_secs: 5,
            run_migrations: true,
        }
    }
}

impl DatabaseConfig {
    /// Pool acquire timeout.
    #[must_use]
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }
}

/// Token and password configuration.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Secret for `user` tokens.
    pub user_secret: String,
    /// Secret for `admin` tokens. Admin login is disabled without one.
    pub admin_secret: Option<String>,
    /// Emails allowed to obtain admin tokens.
    pub admin_emails: Vec<String>,
    /// Access token lifetime in seconds.
    pub access_token_ttl_secs: i64,
    /// Argon2 memory cost in KiB.
    pub password_memory_kib: u32,
    /// Argon2 passes.
    pub password_iterations: u32,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            user_secret: String::new(),
            admin_secret: None,
            admin_emails: Vec::new(),
            access_token_ttl_secs: 1200,
            password_memory_kib: 19456,
            password_iterations: 2,
        }
    }
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("user_secret", &"<redacted>")
            .field("admin_secret", &self.admin_secret.as_ref().map(|_| "<redacted>"))
            .field("admin_emails", &self.admin_emails)
            .field("access_token_ttl_secs", &self.access_token_ttl_secs)
            .field("password_memory_kib", &self.password_memory_kib)
            .field("password_iterations", &self.password_iterations)
            .finish()
    }
}

impl AuthConfig {
    /// Access token lifetime.
    #[must_use]
    pub fn access_token_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.access_token_ttl_secs)
    }
}

/// Quote provider configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MarketConfig {
    /// Binance REST base URL.
    pub rest_base_url: String,
    /// Suffix appended to bare symbols.
    pub quote_currency: String,
    /// Upper bound for one quote request, in seconds.
    pub quote_timeout_secs: u64,
    /// Upper bound for one ledger call, in seconds.
    pub storage_timeout_secs: u64,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            rest_base_url: "https://api.binance.com".to_string(),
            quote_currency: "USDT".to_string(),
            quote_timeout_secs: 10,
            storage_timeout_secs: 5,
        }
    }
}

impl MarketConfig {
    /// Quote request timeout.
    #[must_use]
    pub fn quote_timeout(&self) -> Duration {
        Duration::from_secs(self.quote_timeout_secs)
    }

    /// Ledger call timeout.
    #[must_use]
    pub fn storage_timeout(&self) -> Duration {
        Duration::from_secs(self.storage_timeout_secs)
    }
}

/// Quote relay configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Base URL of the upstream ticker streams.
    pub stream_base_url: String,
    /// Symbol relayed when the caller names none.
    pub default_symbol: String,
    /// Require a `user` token to open a relay session.
    pub require_auth: bool,
    /// Upstream dial timeout in seconds.
    pub connect_timeout_secs: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            stream_base_url: "wss://stream.binance.com:9443/ws".to_string(),
            default_symbol: "BTCUSDT".to_string(),
            require_auth: true,
            connect_timeout_secs: 10,
        }
    }
}

impl RelayConfig {
    /// Upstream dial timeout.
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

impl Config {
    /// Loads configuration from a TOML file.
    ///
    /// # Arguments
    /// * `path` - Path to the configuration file.
    ///
    /// # Errors
    /// Returns error if file cannot be read, parsed or validated.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parses configuration from a TOML string.
    ///
    /// # Errors
    /// Returns error if content cannot be parsed or validated.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads `path` if it exists, otherwise starts from defaults, then applies
    /// environment overrides and validates.
    ///
    /// # Errors
    /// Returns error if the file is unreadable or the result is invalid.
    pub fn from_env<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut config = if path.as_ref().exists() {
            let content = fs::read_to_string(path)?;
            toml::from_str(&content)?
        } else {
            Config::default()
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Applies `HOST`, `PORT`, `DATABASE_URL`, `TOKEN_USER_SECRET` and
    /// `TOKEN_ADMIN_SECRET` from `lookup`.
    fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("PORT") {
            self.server.port = port
                .parse()
                .map_err(|_| ConfigError::InvalidValue(format!("PORT must be a number: {}", port)))?;
        }
        if let Some(url) = lookup("DATABASE_URL").filter(|u| !u.is_empty()) {
            self.database.url = Some(url);
        }
        if let Some(secret) = lookup("TOKEN_USER_SECRET") {
            self.auth.user_secret = secret;
        }
        if let Some(secret) = lookup("TOKEN_ADMIN_SECRET").filter(|s| !s.is_empty()) {
            self.auth.admin_secret = Some(secret);
        }
        Ok(())
    }

    /// Validates the configuration values.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.user_secret.len() < MIN_SECRET_LEN {
            return Err(ConfigError::InvalidValue(format!(
                "auth.user_secret must be at least {} bytes",
                MIN_SECRET_LEN
            )));
        }
        if let Some(admin) = &self.auth.admin_secret {
            if admin.len() < MIN_SECRET_LEN {
                return Err(ConfigError::InvalidValue(format!(
                    "auth.admin_secret must be at least {} bytes",
                    MIN_SECRET_LEN
                )));
            }
            if *admin == self.auth.user_secret {
                return Err(ConfigError::InvalidValue(
                    "auth.admin_secret must differ from auth.user_secret".to_string(),
                ));
            }
        }
        if self.auth.access_token_ttl_secs <= 0 {
            return Err(ConfigError::InvalidValue(
                "auth.access_token_ttl_secs must be positive".to_string(),
            ));
        }
        if self.auth.password_iterations == 0 || self.auth.password_memory_kib == 0 {
            return Err(ConfigError::InvalidValue(
                "auth password cost parameters must be positive".to_string(),
            ));
        }
        if self.database.max_connections == 0 || self.database.acquire_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "database pool size and acquire timeout must be positive".to_string(),
            ));
        }
        if self.market.quote_currency.is_empty()
            || !self
                .market
                .quote_currency
                .chars()
                .all(|c| c.is_ascii_alphanumeric())
        {
            return Err(ConfigError::InvalidValue(format!(
                "market.quote_currency must be alphanumeric: {:?}",
                self.market.quote_currency
            )));
        }
        if self.market.quote_timeout_secs == 0 || self.market.storage_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "market timeouts must be positive".to_string(),
            ));
        }
        if !(self.relay.stream_base_url.starts_with("ws://")
            || self.relay.stream_base_url.starts_with("wss://"))
        {
            return Err(ConfigError::InvalidValue(format!(
                "relay.stream_base_url must use ws:// or wss://: {}",
                self.relay.stream_base_url
            )));
        }
        if self.relay.connect_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "relay.connect_timeout_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
