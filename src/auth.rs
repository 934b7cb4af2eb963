//! Account signup/login: input validation, argon2 password hashing and HS256
//! session tokens.

use std::sync::Arc;

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::users::{User, UserStore, UserStoreError};

/// Minimum accepted password length, in characters.
pub const MIN_PASSWORD_LEN: usize = 6;
/// Default session token lifetime.
pub const DEFAULT_TOKEN_TTL_SECS: i64 = 7 * 24 * 60 * 60;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("{0}")]
    Validation(&'static str),

    #[error("Email already registered")]
    DuplicateEmail,

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("invalid or expired token")]
    InvalidToken(#[source] jsonwebtoken::errors::Error),

    #[error("token encoding failed: {0}")]
    TokenEncoding(#[source] jsonwebtoken::errors::Error),

    #[error("password hashing failed: {0}")]
    Hashing(String),

    #[error(transparent)]
    Store(UserStoreError),
}

impl From<UserStoreError> for AuthError {
    fn from(e: UserStoreError) -> Self {
        match e {
            UserStoreError::DuplicateEmail => Self::DuplicateEmail,
            other => Self::Store(other),
        }
    }
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SignupRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Trimmed, validated signup fields.
#[derive(Debug, PartialEq, Eq)]
pub struct NewAccount<'a> {
    pub name: &'a str,
    pub email: &'a str,
    pub password: &'a str,
}

pub fn validate_signup(req: &SignupRequest) -> Result<NewAccount<'_>, AuthError> {
    let name = req.name.trim();
    let email = req.email.trim();
    let password = req.password.as_str();
    if name.is_empty() || email.is_empty() || password.is_empty() {
        return Err(AuthError::Validation("All fields required"));
    }
    if !email.contains('@') || !email.contains('.') {
        return Err(AuthError::Validation("Invalid email"));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AuthError::Validation("Password too short"));
    }
    Ok(NewAccount {
        name,
        email,
        password,
    })
}

// ---------------------------------------------------------------------------
// Passwords
// ---------------------------------------------------------------------------

/// Hash a password into a PHC string with a fresh random salt.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| AuthError::Hashing(e.to_string()))
}

/// Check a password against a stored PHC string. Unparseable hashes never match.
pub fn verify_password(password: &str, phc: &str) -> bool {
    match PasswordHash::new(phc) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

// ---------------------------------------------------------------------------
// Tokens
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: i64,
    pub email: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Clone)]
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl std::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("secret", &"[REDACTED]")
            .field("ttl_secs", &self.ttl.num_seconds())
            .finish()
    }
}

impl TokenIssuer {
    pub fn new(secret: &[u8], ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl,
        }
    }

    pub fn issue(&self, user: &User) -> Result<String, AuthError> {
        let now = Utc::now();
        let claims = Claims {
            user_id: user.id,
            email: user.email.clone(),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };
        encode(&Header::default(), &claims, &self.encoding).map_err(AuthError::TokenEncoding)
    }

    /// Decode and validate signature and expiry.
    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        decode::<Claims>(token, &self.decoding, &Validation::default())
            .map(|data| data.claims)
            .map_err(AuthError::InvalidToken)
    }
}

// ---------------------------------------------------------------------------
// Accounts
// ---------------------------------------------------------------------------

/// Signup and login over a [`UserStore`]. All methods block.
#[derive(Debug, Clone)]
pub struct Accounts {
    store: Arc<UserStore>,
    tokens: TokenIssuer,
}

impl Accounts {
    pub fn new(store: Arc<UserStore>, tokens: TokenIssuer) -> Self {
        Self { store, tokens }
    }

    pub fn store(&self) -> &UserStore {
        &self.store
    }

    pub fn tokens(&self) -> &TokenIssuer {
        &self.tokens
    }

    pub fn signup(&self, req: &SignupRequest) -> Result<User, AuthError> {
        let account = validate_signup(req)?;
        let hash = hash_password(account.password)?;
        let user = self.store.create(account.name, account.email, &hash)?;
        tracing::info!(user_id = user.id, "user registered");
        Ok(user)
    }

    /// Returns a fresh token and the authenticated user.
    pub fn login(&self, req: &LoginRequest) -> Result<(String, User), AuthError> {
        let email = req.email.trim();
        if email.is_empty() || req.password.is_empty() {
            return Err(AuthError::Validation("Email and password required"));
        }
        let stored = self
            .store
            .find_by_email(email)?
            .filter(|s| verify_password(&req.password, &s.password_hash))
            .ok_or(AuthError::InvalidCredentials)?;
        let token = self.tokens.issue(&stored.user)?;
        tracing::info!(user_id = stored.user.id, "login succeeded");
        Ok((token, stored.user))
    }
}
