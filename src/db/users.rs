//! PostgreSQL credential store.

use super::DatabasePool;
use crate::credentials::{CredentialStore, CredentialStoreError, NewUser};
use crate::models::UserId;
use async_trait::async_trait;

/// Credential store backed by the `users` table.
#[derive(Clone)]
pub struct PgCredentialStore {
    db: DatabasePool,
}

impl PgCredentialStore {
    /// Creates a store over the pool.
    #[must_use]
    pub fn new(db: DatabasePool) -> Self {
        Self { db }
    }
}

fn map_error(err: sqlx::Error) -> CredentialStoreError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            CredentialStoreError::Duplicate
        }
        _ => CredentialStoreError::Backend(err.to_string()),
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn find_by_email(&self, email: &str) -> Result<bool, CredentialStoreError> {
        sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM users WHERE email = $1)")
            .bind(email)
            .fetch_one(self.db.pool())
            .await
            .map_err(map_error)
    }

    async fn extract_password_hash(
        &self,
        email: &str,
    ) -> Result<Option<String>, CredentialStoreError> {
        sqlx::query_scalar::<_, String>("SELECT password FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(self.db.pool())
            .await
            .map_err(map_error)
    }

    async fn save(&self, user: NewUser) -> Result<UserId, CredentialStoreError> {
        sqlx::query_scalar::<_, UserId>(
            r#"
            INSERT INTO users (username, email, password, created_at)
            VALUES ($1, $2, $3, NOW())
            RETURNING id
            "#,
        )
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .fetch_one(self.db.pool())
        .await
        .map_err(map_error)
    }

    async fn get_user_id(&self, email: &str) -> Result<Option<UserId>, CredentialStoreError> {
        sqlx::query_scalar::<_, UserId>("SELECT id FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(self.db.pool())
            .await
            .map_err(map_error)
    }
}
