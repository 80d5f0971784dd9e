//! JWT utilities for access token generation and validation
//!
//! Access tokens are HS256-signed JWTs carrying the member's external
//! identifier, email and admin flag. They are short-lived (15 minutes by
//! default) and never revoked; long-lived refresh tokens are opaque values
//! managed by [`super::ledger::RefreshTokenLedger`], not JWTs.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::core::clock::{SharedClock, SystemClock};

/// Default access token expiration time (15 minutes)
pub const ACCESS_TOKEN_EXPIRATION_MINUTES: i64 = 15;

/// Default refresh token expiration time (7 days)
pub const REFRESH_TOKEN_EXPIRATION_DAYS: i64 = 7;

/// Default token issuer
pub const DEFAULT_ISSUER: &str = "cci-api";

/// JWT configuration
#[derive(Clone)]
pub struct JwtConfig {
    /// Secret key for signing tokens
    pub secret: String,
    /// Access token expiration in minutes
    pub access_token_expiration_minutes: i64,
    /// Refresh token expiration in days
    pub refresh_token_expiration_days: i64,
    /// Token issuer
    pub issuer: String,
}

impl std::fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtConfig")
            .field("secret", &"<redacted>")
            .field(
                "access_token_expiration_minutes",
                &self.access_token_expiration_minutes,
            )
            .field(
                "refresh_token_expiration_days",
                &self.refresh_token_expiration_days,
            )
            .field("issuer", &self.issuer)
            .finish()
    }
}

impl JwtConfig {
    /// Create a new JWT configuration
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            access_token_expiration_minutes: ACCESS_TOKEN_EXPIRATION_MINUTES,
            refresh_token_expiration_days: REFRESH_TOKEN_EXPIRATION_DAYS,
            issuer: DEFAULT_ISSUER.to_string(),
        }
    }

    /// Create config from environment variables
    pub fn from_env() -> Result<Self, JwtError> {
        let secret = std::env::var("JWT_SECRET")
            .ok()
            .filter(|s| !s.is_empty())
            .ok_or(JwtError::MissingSecret)?;

        Ok(Self::new(secret).with_env_overrides())
    }

    /// Apply `JWT_ISSUER` on top of this config
    pub fn with_env_overrides(self) -> Self {
        match std::env::var("JWT_ISSUER") {
            Ok(issuer) if !issuer.trim().is_empty() => self.issuer(issuer.trim()),
            _ => self,
        }
    }

    /// Set access token expiration
    pub fn access_token_expiration(mut self, minutes: i64) -> Self {
        self.access_token_expiration_minutes = minutes;
        self
    }

    /// Set refresh token expiration
    pub fn refresh_token_expiration(mut self, days: i64) -> Self {
        self.refresh_token_expiration_days = days;
        self
    }

    /// Set issuer
    pub fn issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = issuer.into();
        self
    }

    /// Access token lifetime
    pub fn access_ttl(&self) -> Duration {
        Duration::minutes(self.access_token_expiration_minutes)
    }

    /// Refresh token lifetime
    pub fn refresh_ttl(&self) -> Duration {
        Duration::days(self.refresh_token_expiration_days)
    }
}

/// JWT errors
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("JWT_SECRET environment variable not set")]
    MissingSecret,

    #[error("Token encoding failed: {0}")]
    EncodingError(String),

    #[error("Token decoding failed: {0}")]
    DecodingError(String),

    #[error("Token expired")]
    Expired,

    #[error("Invalid token")]
    InvalidToken,
}

impl From<jsonwebtoken::errors::Error> for JwtError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match err.kind() {
            ErrorKind::ExpiredSignature => JwtError::Expired,
            ErrorKind::InvalidToken
            | ErrorKind::InvalidSignature
            | ErrorKind::InvalidAlgorithm
            | ErrorKind::InvalidIssuer => JwtError::InvalidToken,
            _ => JwtError::DecodingError(err.to_string()),
        }
    }
}

/// JWT claims structure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (external member identifier)
    pub sub: String,
    /// User email
    pub email: String,
    /// Admin flag at issue time
    pub admin: bool,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issuer
    pub iss: String,
    /// JWT ID (unique identifier for this token)
    pub jti: String,
}

/// Token pair (access + refresh)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    /// Access token (short-lived JWT)
    pub access_token: String,
    /// Refresh token (long-lived opaque value)
    pub refresh_token: String,
    /// Access token expiration (Unix timestamp)
    pub access_expires_at: i64,
    /// Refresh token expiration (Unix timestamp)
    pub refresh_expires_at: i64,
    /// Token type (always "Bearer")
    pub token_type: String,
}

impl TokenPair {
    pub fn bearer(
        access_token: String,
        access_expires_at: DateTime<Utc>,
        refresh_token: String,
        refresh_expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            access_token,
            refresh_token,
            access_expires_at: access_expires_at.timestamp(),
            refresh_expires_at: refresh_expires_at.timestamp(),
            token_type: "Bearer".to_string(),
        }
    }
}

/// JWT service for token operations
#[derive(Clone)]
pub struct JwtService {
    config: JwtConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    clock: SharedClock,
}

impl JwtService {
    /// Create a new JWT service
    pub fn new(config: JwtConfig) -> Self {
        let encoding_key = EncodingKey::from_secret(config.secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(config.secret.as_bytes());

        Self {
            config,
            encoding_key,
            decoding_key,
            clock: Arc::new(SystemClock),
        }
    }

    /// Use `clock` for issue and expiry checks
    pub fn with_clock(mut self, clock: SharedClock) -> Self {
        self.clock = clock;
        self
    }

    /// Issue an access token for `subject`; returns the token and its expiry
    pub fn issue_access_token(
        &self,
        subject: &str,
        email: &str,
        is_admin: bool,
    ) -> Result<(String, DateTime<Utc>), JwtError> {
        let now = self.clock.now();
        let exp = now + self.config.access_ttl();

        let claims = Claims {
            sub: subject.to_string(),
            email: email.to_string(),
            admin: is_admin,
            iat: now.timestamp(),
            exp: exp.timestamp(),
            iss: self.config.issuer.clone(),
            jti: Uuid::new_v4().to_string(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| JwtError::EncodingError(e.to_string()))?;

        Ok((token, exp))
    }

    /// Validate and decode a token.
    ///
    /// Signature, algorithm and issuer are checked by `jsonwebtoken`; expiry
    /// is checked against the service clock with zero leeway, so a token is
    /// rejected from its `exp` second onwards.
    pub fn verify(&self, token: &str) -> Result<Claims, JwtError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.config.issuer]);
        validation.validate_exp = false;
        validation.leeway = 0;

        let token_data = decode::<Claims>(token, &self.decoding_key, &validation)?;
        let claims = token_data.claims;

        if self.clock.now().timestamp() >= claims.exp {
            return Err(JwtError::Expired);
        }

        Ok(claims)
    }

    /// Configuration in use
    pub fn config(&self) -> &JwtConfig {
        &self.config
    }
}
