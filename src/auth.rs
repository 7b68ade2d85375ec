//! Account registration, login and password hashing.

use crate::credentials::{CredentialStore, CredentialStoreError, NewUser};
use crate::models::UserId;
use crate::token::{IssuedToken, Role, TokenError, TokenService};
use argon2::password_hash::SaltString;
use argon2::{Algorithm, Argon2, Params, PasswordHash, PasswordHasher, PasswordVerifier, Version};
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{info, warn};

/// Account service errors.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Registration input rejected.
    #[error("{0}")]
    Validation(String),

    /// Email or username already registered.
    #[error("User already exists")]
    EmailTaken,

    /// Unknown email, wrong password or not an administrator.
    #[error("Invalid email or password")]
    InvalidCredentials,

    /// Token issuance failed.
    #[error("token issuance failed: {0}")]
    Token(#[from] TokenError),

    /// Credential store failed.
    #[error("credential store error: {0}")]
    Store(CredentialStoreError),

    /// Password hashing failed.
    #[error("password hashing failed: {0}")]
    Hashing(String),
}

impl From<CredentialStoreError> for AuthError {
    fn from(err: CredentialStoreError) -> Self {
        match err {
            CredentialStoreError::Duplicate => Self::EmailTaken,
            other => Self::Store(other),
        }
    }
}

/// Argon2id cost parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasswordPolicy {
    /// Memory cost in KiB.
    pub memory_kib: u32,
    /// Number of passes.
    pub iterations: u32,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            memory_kib: Params::DEFAULT_M_COST,
            iterations: Params::DEFAULT_T_COST,
        }
    }
}

impl PasswordPolicy {
    fn hasher(&self) -> Result<Argon2<'static>, AuthError> {
        let params = Params::new(self.memory_kib, self.iterations, 1, None)
            .map_err(|e| AuthError::Hashing(e.to_string()))?;
        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }

    /// Hashes a password into a PHC string.
    ///
    /// # Errors
    /// Returns `Hashing` if the parameters are invalid.
    pub fn hash(&self, password: &str) -> Result<String, AuthError> {
        let salt = SaltString::encode_b64(uuid::Uuid::new_v4().as_bytes())
            .map_err(|e| AuthError::Hashing(e.to_string()))?;
        Ok(self
            .hasher()?
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AuthError::Hashing(e.to_string()))?
            .to_string())
    }

    /// PHC string with this policy's cost that matches no password.
    ///
    /// Logins for unknown accounts are checked against it so they cost the same
    /// as a wrong password.
    #[must_use]
    pub fn decoy_hash(&self) -> String {
        format!(
            "$argon2id$v=19$m={},t={},p=1$c29tZXNhbHRzb21lc2FsdA$AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA",
            self.memory_kib, self.iterations
        )
    }

    /// Checks a password against a stored PHC string.
    ///
    /// Parameters are read from the hash, so older hashes keep verifying after a
    /// policy change.
    #[must_use]
    pub fn verify(&self, stored: &str, password: &str) -> bool {
        let Ok(parsed) = PasswordHash::new(stored) else {
            return false;
        };
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    }
}

/// Registration input.
#[derive(Debug, Clone)]
pub struct Registration {
    /// 3 to 20 ASCII alphanumerics.
    pub username: String,
    /// Login email.
    pub email: String,
    /// At least 8 characters.
    pub password: String,
    /// Must equal `password`.
    pub confirm_password: String,
}

impl Registration {
    /// Validates field rules.
    ///
    /// # Errors
    /// Returns `Validation` naming the first failing field.
    pub fn validate(&self) -> Result<(), AuthError> {
        let username_len = self.username.chars().count();
        if !(3..=20).contains(&username_len)
            || !self.username.chars().all(|c| c.is_ascii_alphanumeric())
        {
            return Err(AuthError::Validation(
                "Username must be 3-20 alphanumeric characters".to_string(),
            ));
        }
        if !is_valid_email(&self.email) {
            return Err(AuthError::Validation("Invalid email address".to_string()));
        }
        if self.password.chars().count() < 8 {
            return Err(AuthError::Validation(
                "Password must be at least 8 characters".to_string(),
            ));
        }
        if self.password != self.confirm_password {
            return Err(AuthError::Validation("Passwords do not match".to_string()));
        }
        Ok(())
    }
}

fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && domain.split('.').all(|label| !label.is_empty())
}

/// Registers users and exchanges credentials for bearer tokens.
pub struct AccountService {
    store: Arc<dyn CredentialStore>,
    tokens: Arc<TokenService>,
    token_ttl: chrono::Duration,
    admin_emails: HashSet<String>,
    policy: PasswordPolicy,
    decoy_hash: String,
    password_checks: AtomicU64,
}

impl AccountService {
    /// Creates the account service.
    #[must_use]
    pub fn new(
        store: Arc<dyn CredentialStore>,
        tokens: Arc<TokenService>,
        token_ttl: chrono::Duration,
        admin_emails: impl IntoIterator<Item = String>,
        policy: PasswordPolicy,
    ) -> Self {
        Self {
            store,
            tokens,
            token_ttl,
            admin_emails: admin_emails
                .into_iter()
                .map(|e| e.to_lowercase())
                .collect(),
            decoy_hash: policy.decoy_hash(),
            policy,
            password_checks: AtomicU64::new(0),
        }
    }

    /// Number of password hashes checked so far, including decoy checks.
    #[must_use]
    pub fn password_checks(&self) -> u64 {
        self.password_checks.load(Ordering::Relaxed)
    }

    /// Registers a new user.
    ///
    /// # Errors
    /// `Validation` for bad input, `EmailTaken` for duplicates.
    pub async fn register(&self, registration: Registration) -> Result<UserId, AuthError> {
        registration.validate()?;

        if self.store.find_by_email(&registration.email).await? {
            return Err(AuthError::EmailTaken);
        }

        let policy = self.policy;
        let password = registration.password;
        let password_hash = tokio::task::spawn_blocking(move || policy.hash(&password))
            .await
            .map_err(|e| AuthError::Hashing(e.to_string()))??;

        let user_id = self
            .store
            .save(NewUser {
                username: registration.username,
                email: registration.email,
                password_hash,
            })
            .await?;

        info!("Registered user {}", user_id);
        Ok(user_id)
    }

    /// Exchanges credentials for a `User` token.
    ///
    /// # Errors
    /// `InvalidCredentials` for an unknown email or wrong password.
    pub async fn login(&self, email: &str, password: &str) -> Result<IssuedToken, AuthError> {
        let user_id = self.authenticate(email, password).await?;
        Ok(self.tokens.issue(user_id, Role::User, self.token_ttl)?)
    }

    /// Exchanges an administrator's credentials for an `Admin` token.
    ///
    /// # Errors
    /// `InvalidCredentials` if the credentials are wrong, the email is not an
    /// administrator or no admin secret is configured.
    pub async fn admin_login(
        &self,
        email: &str,
        password: &str,
    ) -> Result<IssuedToken, AuthError> {
        let user_id = self.authenticate(email, password).await?;

        if !self.admin_emails.contains(&email.to_lowercase()) {
            warn!("Admin login refused for non-admin account");
            return Err(AuthError::InvalidCredentials);
        }

        self.tokens
            .issue(user_id, Role::Admin, self.token_ttl)
            .map_err(|e| {
                warn!("Admin token issuance failed: {}", e);
                AuthError::InvalidCredentials
            })
    }

    async fn authenticate(&self, email: &str, password: &str) -> Result<UserId, AuthError> {
        let stored = self.store.extract_password_hash(email).await?;
        let known = stored.is_some();
        let stored = stored.unwrap_or_else(|| self.decoy_hash.clone());

        let policy = self.policy;
        let password = password.to_string();
        self.password_checks.fetch_add(1, Ordering::Relaxed);
        let valid = tokio::task::spawn_blocking(move || policy.verify(&stored, &password))
            .await
            .map_err(|e| AuthError::Hashing(e.to_string()))?;

        if !known {
            warn!("Login failed: unknown account");
            return Err(AuthError::InvalidCredentials);
        }
        if !valid {
            warn!("Login failed: wrong password");
            return Err(AuthError::InvalidCredentials);
        }

        self.store
            .get_user_id(email)
            .await?
            .ok_or(AuthError::InvalidCredentials)
    }
}
