//! Credential storage port and its in-memory implementation.

use crate::models::UserId;
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicI64, Ordering};

/// Credential store errors.
#[derive(Debug, thiserror::Error)]
pub enum CredentialStoreError {
    /// Email or username already registered.
    #[error("user already exists")]
    Duplicate,

    /// The storage backend failed.
    #[error("credential backend error: {0}")]
    Backend(String),
}

/// Registration to persist. The password is already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    /// Display name, unique.
    pub username: String,
    /// Login email, unique.
    pub email: String,
    /// PHC-formatted password hash.
    pub password_hash: String,
}

/// Persistent user credentials.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Whether a user with this email exists.
    async fn find_by_email(&self, email: &str) -> Result<bool, CredentialStoreError>;

    /// Stored password hash for `email`, if registered.
    async fn extract_password_hash(
        &self,
        email: &str,
    ) -> Result<Option<String>, CredentialStoreError>;

    /// Persists a registration and returns the new user id.
    async fn save(&self, user: NewUser) -> Result<UserId, CredentialStoreError>;

    /// User id for `email`, if registered.
    async fn get_user_id(&self, email: &str) -> Result<Option<UserId>, CredentialStoreError>;
}

#[derive(Debug, Clone)]
struct StoredUser {
    user_id: UserId,
    username: String,
    password_hash: String,
}

/// In-memory credential store keyed by email.
#[derive(Debug)]
pub struct InMemoryCredentialStore {
    users: DashMap<String, StoredUser>,
    // Serializes the uniqueness check with the insert.
    registration: Mutex<()>,
    next_id: AtomicI64,
}

impl Default for InMemoryCredentialStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryCredentialStore {
    /// Creates an empty store. Identifiers start at 1.
    #[must_use]
    pub fn new() -> Self {
        Self {
            users: DashMap::new(),
            registration: Mutex::new(()),
            next_id: AtomicI64::new(1),
        }
    }

    /// Number of registered users.
    #[must_use]
    pub fn user_count(&self) -> usize {
        self.users.len()
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn find_by_email(&self, email: &str) -> Result<bool, CredentialStoreError> {
        Ok(self.users.contains_key(email))
    }

    async fn extract_password_hash(
        &self,
        email: &str,
    ) -> Result<Option<String>, CredentialStoreError> {
        Ok(self.users.get(email).map(|u| u.password_hash.clone()))
    }

    async fn save(&self, user: NewUser) -> Result<UserId, CredentialStoreError> {
        let _guard = self.registration.lock();

        if self.users.contains_key(&user.email)
            || self.users.iter().any(|u| u.username == user.username)
        {
            return Err(CredentialStoreError::Duplicate);
        }

        let user_id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.users.insert(
            user.email,
            StoredUser {
                user_id,
                username: user.username,
                password_hash: user.password_hash,
            },
        );
        Ok(user_id)
    }

    async fn get_user_id(&self, email: &str) -> Result<Option<UserId>, CredentialStoreError> {
        Ok(self.users.get(email).map(|u| u.user_id))
    }
}
