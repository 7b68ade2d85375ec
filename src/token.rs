//! Bearer token issuance and verification.
//!
//! Tokens are compact HS256 JWTs carrying `{jti, sub, role, iat, exp}`. Each
//! [`Role`] is signed with its own secret, and verification always selects the
//! secret from the role the *caller* requires rather than from the role claim
//! inside the token. A token signed for one trust domain therefore never
//! verifies in another, even if its claims are otherwise well formed.
//!
//! Tokens are stateless: validity is decided purely by signature and expiry.

use crate::models::UserId;
use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;
use uuid::Uuid;

/// Authorization scope bound to a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Regular trading user.
    User,
    /// Operator with access to administrative endpoints.
    Admin,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Admin => write!(f, "admin"),
        }
    }
}

/// Token service errors.
///
/// The variants are for logging only. Callers at the HTTP boundary collapse
/// every verification failure into a single unauthorized outcome.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    /// No signing secret is configured for the role.
    #[error("no signing secret configured for role {0}")]
    UnsupportedRole(Role),

    /// The token could not be parsed.
    #[error("malformed token")]
    MalformedToken,

    /// The signature does not match the required role's secret.
    #[error("token signature is invalid")]
    SignatureInvalid,

    /// The token is correctly signed but scoped to a different role.
    #[error("token issued for role {actual}, {required} required")]
    RoleMismatch {
        /// Role the caller asked for.
        required: Role,
        /// Role recorded in the token.
        actual: Role,
    },

    /// The token expiry instant has passed.
    #[error("token expired")]
    Expired,

    /// The requested lifetime is not positive or overflows the clock.
    #[error("invalid token lifetime")]
    InvalidTtl,

    /// Claims could not be encoded.
    #[error("failed to encode token: {0}")]
    Encoding(String),
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::InvalidSignature => Self::SignatureInvalid,
            _ => Self::MalformedToken,
        }
    }
}

/// Role-bound signing secrets.
///
/// Secrets are immutable once constructed and shared read-only across requests.
#[derive(Clone, Default)]
pub struct TokenSecrets {
    user: Option<Vec<u8>>,
    admin: Option<Vec<u8>>,
}

impl TokenSecrets {
    /// Creates a secret set. A role without a secret cannot issue or verify tokens.
    #[must_use]
    pub fn new(user: Option<&str>, admin: Option<&str>) -> Self {
        Self {
            user: user.map(|s| s.as_bytes().to_vec()),
            admin: admin.map(|s| s.as_bytes().to_vec()),
        }
    }

    /// Returns the secret bound to `role`, if one is configured.
    #[must_use]
    pub fn secret_for(&self, role: Role) -> Option<&[u8]> {
        match role {
            Role::User => self.user.as_deref(),
            Role::Admin => self.admin.as_deref(),
        }
    }
}

impl fmt::Debug for TokenSecrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenSecrets")
            .field("user", &self.user.as_ref().map(|_| "<redacted>"))
            .field("admin", &self.admin.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct TokenClaims {
    jti: String,
    sub: UserId,
    role: Role,
    iat: i64,
    exp: i64,
}

/// A freshly issued bearer token.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    /// Encoded token string handed to the caller.
    pub token: String,
    /// Unique token identifier.
    pub token_id: String,
    /// Identity the token is bound to.
    pub user_id: UserId,
    /// Scope the token authorizes.
    pub role: Role,
    /// Absolute expiry instant (second precision).
    pub expires_at: DateTime<Utc>,
}

/// Identity established by a successful verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedToken {
    /// Identity the token is bound to.
    pub user_id: UserId,
    /// Unique token identifier.
    pub token_id: String,
    /// Scope the token authorizes (always the required role).
    pub role: Role,
    /// Absolute expiry instant.
    pub expires_at: DateTime<Utc>,
}

/// Issues and verifies role-scoped bearer tokens.
#[derive(Debug, Clone)]
pub struct TokenService {
    secrets: TokenSecrets,
}

impl TokenService {
    /// Creates a token service over the given secrets.
    #[must_use]
    pub fn new(secrets: TokenSecrets) -> Self {
        Self { secrets }
    }

    /// Returns true if tokens can be issued for `role`.
    #[must_use]
    pub fn supports(&self, role: Role) -> bool {
        self.secrets.secret_for(role).is_some()
    }

    /// Issues a token for `user_id` scoped to `role`, valid for `ttl`.
    ///
    /// # Errors
    /// Returns `UnsupportedRole` if no secret is configured for `role`.
    pub fn issue(&self, user_id: UserId, role: Role, ttl: Duration) -> Result<IssuedToken, TokenError> {
        self.issue_at(user_id, role, ttl, Utc::now())
    }

    /// Issues a token as if the current time were `now`.
    ///
    /// The expiry is truncated to whole seconds, so `expires_at` never lies
    /// after `now + ttl`.
    ///
    /// # Errors
    /// See [`TokenService::issue`].
    pub fn issue_at(
        &self,
        user_id: UserId,
        role: Role,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<IssuedToken, TokenError> {
        let secret = self
            .secrets
            .secret_for(role)
            .ok_or(TokenError::UnsupportedRole(role))?;

        if ttl <= Duration::zero() {
            return Err(TokenError::InvalidTtl);
        }
        let expiry = now.checked_add_signed(ttl).ok_or(TokenError::InvalidTtl)?;
        let expires_at = whole_seconds(expiry.timestamp()).ok_or(TokenError::InvalidTtl)?;

        let token_id = Uuid::new_v4().simple().to_string();
        let claims = TokenClaims {
            jti: token_id.clone(),
            sub: user_id,
            role,
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };

        let token = jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret),
        )
        .map_err(|e| TokenError::Encoding(e.to_string()))?;

        Ok(IssuedToken {
            token,
            token_id,
            user_id,
            role,
            expires_at,
        })
    }

    /// Verifies `token` against the secret of `required`.
    ///
    /// # Errors
    /// Returns `MalformedToken`, `SignatureInvalid`, `RoleMismatch` or `Expired`.
    pub fn verify(&self, token: &str, required: Role) -> Result<VerifiedToken, TokenError> {
        self.verify_at(token, required, Utc::now())
    }

    /// Verifies `token` as if the current time were `now`.
    ///
    /// Expiry is compared at full clock precision: a token is rejected as soon
    /// as `now` passes its `expires_at`.
    ///
    /// # Errors
    /// See [`TokenService::verify`].
    pub fn verify_at(
        &self,
        token: &str,
        required: Role,
        now: DateTime<Utc>,
    ) -> Result<VerifiedToken, TokenError> {
        let secret = self
            .secrets
            .secret_for(required)
            .ok_or(TokenError::UnsupportedRole(required))?;

        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.leeway = 0;

        let claims =
            jsonwebtoken::decode::<TokenClaims>(token, &DecodingKey::from_secret(secret), &validation)?
                .claims;

        if claims.role != required {
            return Err(TokenError::RoleMismatch {
                required,
                actual: claims.role,
            });
        }

        let expires_at = whole_seconds(claims.exp).ok_or(TokenError::MalformedToken)?;
        if now > expires_at {
            return Err(TokenError::Expired);
        }

        Ok(VerifiedToken {
            user_id: claims.sub,
            token_id: claims.jti,
            role: claims.role,
            expires_at,
        })
    }
}

fn whole_seconds(secs: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(secs, 0).single()
}
