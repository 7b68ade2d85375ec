//! Database connection pool management.

use crate::config::DatabaseConfig;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use std::time::Duration;
use tracing::info;

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct DatabasePool {
    pool: PgPool,
}

impl DatabasePool {
    /// Creates a new database pool from the connection string.
    ///
    /// # Arguments
    /// * `database_url` - PostgreSQL connection string
    /// * `max_connections` - Pool size
    /// * `acquire_timeout` - Wait bound for a pooled connection
    ///
    /// # Errors
    /// Returns an error if the connection cannot be established.
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect(database_url)
            .await?;

        info!("Database connection pool established");

        Ok(Self { pool })
    }

    /// Creates a pool from configuration. Returns `None` when no URL is configured.
    ///
    /// # Errors
    /// Returns an error if the connection cannot be established.
    pub async fn from_config(config: &DatabaseConfig) -> Result<Option<Self>, sqlx::Error> {
        match &config.url {
            Some(url) => Ok(Some(
                Self::new(url, config.max_connections, config.acquire_timeout()).await?,
            )),
            None => Ok(None),
        }
    }

    /// Returns a reference to the underlying pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs database migrations.
    ///
    /// # Errors
    /// Returns an error if migrations fail.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("Database migrations completed");
        Ok(())
    }
}
