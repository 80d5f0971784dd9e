//! Application configuration from environment variables.
//!
//! Load configuration using `Config::from_env()` after calling `dotenvy::dotenv()`.

use chrono::Duration;
use chrono_tz::Tz;
use std::net::SocketAddr;
use std::ops::RangeInclusive;
use std::str::FromStr;

use crate::core::attendance::calendar::{
    CheckInPolicy, DEFAULT_SERVICE_START_HOUR, DEFAULT_TIMEZONE,
};
use crate::core::auth::jwt::{JwtConfig, JwtError};
use crate::core::auth::password::{BCRYPT_COST_RANGE, DEFAULT_BCRYPT_COST};
use crate::core::auth::service::{AuthSettings, PASSWORD_RESET_TOKEN_LIFESPAN_HOURS};
use crate::core::db::DbConfig;
use crate::core::notify::ResendConfig;
use crate::core::qr::DEFAULT_QR_CODE_SIZE;

/// Default listen address
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";

/// Default frontend base URL for emailed links
pub const DEFAULT_FRONTEND_URL: &str = "http://localhost:3000";

/// Default interval between expired refresh token sweeps (1 hour)
pub const DEFAULT_REFRESH_SWEEP_INTERVAL_SECS: u64 = 3600;

/// Signing secret used by debug builds when `JWT_SECRET` is unset
#[cfg(debug_assertions)]
const DEV_JWT_SECRET: &str = "dev-only-insecure-jwt-secret-change-me";

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("JWT_SECRET environment variable not set")]
    MissingJwtSecret,

    #[error("Invalid value for {name}: {value:?}")]
    InvalidValue { name: &'static str, value: String },
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// PostgreSQL settings; `None` selects the in-memory store
    pub database: Option<DbConfig>,
    pub jwt: JwtConfig,
    pub check_in: CheckInPolicy,
    pub auth: AuthSettings,
    /// Edge length of generated QR codes, in pixels
    pub qr_code_size: u32,
    /// Resend settings; `None` logs notifications instead of emailing them
    pub resend: Option<ResendConfig>,
    pub bind_addr: SocketAddr,
    pub refresh_sweep_interval: std::time::Duration,
}

/// Longest accepted access token lifetime (1 day)
pub const MAX_ACCESS_TOKEN_MINUTES: i64 = 24 * 60;

/// Longest accepted refresh token lifetime (1 year)
pub const MAX_REFRESH_TOKEN_DAYS: i64 = 365;

/// Longest accepted password reset token lifetime (30 days)
pub const MAX_PASSWORD_RESET_HOURS: i64 = 30 * 24;

/// Longest accepted refresh sweep interval (1 week)
pub const MAX_REFRESH_SWEEP_INTERVAL_SECS: u64 = 7 * 24 * 3600;

/// Largest accepted QR code edge, in pixels
pub const MAX_QR_CODE_SIZE: u32 = 2048;

/// Parse `raw` as a number within `range`
pub fn parse_bounded<T>(
    name: &'static str,
    raw: &str,
    range: RangeInclusive<T>,
) -> Result<T, ConfigError>
where
    T: FromStr + PartialOrd,
{
    match raw.trim().parse::<T>() {
        Ok(value) if range.contains(&value) => Ok(value),
        _ => Err(ConfigError::InvalidValue {
            name,
            value: raw.to_string(),
        }),
    }
}

/// `name` parsed within `range`, or `None` when unset or blank
fn env_bounded<T>(name: &'static str, range: RangeInclusive<T>) -> Result<Option<T>, ConfigError>
where
    T: FromStr + PartialOrd,
{
    match std::env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => parse_bounded(name, &raw, range).map(Some),
        _ => Ok(None),
    }
}

/// Parse an IANA timezone name such as `Africa/Lagos`
pub fn parse_timezone(raw: &str) -> Result<Tz, ConfigError> {
    raw.trim()
        .parse::<Tz>()
        .map_err(|_| ConfigError::InvalidValue {
            name: "TIMEZONE",
            value: raw.to_string(),
        })
}

/// Parse an hour of day in `0..=23`
pub fn parse_service_start_hour(raw: &str) -> Result<u32, ConfigError> {
    parse_bounded("SERVICE_START_HOUR", raw, 0..=23)
}

/// Parse a socket address such as `0.0.0.0:8080`
pub fn parse_bind_addr(raw: &str) -> Result<SocketAddr, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
        name: "BIND_ADDR",
        value: raw.to_string(),
    })
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Call `dotenvy::dotenv()` before this to load from `.env` file.
    /// Unset variables take their defaults; a set but malformed or
    /// out-of-range value is an error.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut jwt = match JwtConfig::from_env() {
            Ok(config) => config,
            Err(JwtError::MissingSecret) => Self::fallback_jwt_config()?,
            Err(_) => return Err(ConfigError::MissingJwtSecret),
        };
        if let Some(minutes) =
            env_bounded("JWT_ACCESS_EXPIRATION_MINUTES", 1..=MAX_ACCESS_TOKEN_MINUTES)?
        {
            jwt = jwt.access_token_expiration(minutes);
        }
        if let Some(days) = env_bounded("JWT_REFRESH_EXPIRATION_DAYS", 1..=MAX_REFRESH_TOKEN_DAYS)? {
            jwt = jwt.refresh_token_expiration(days);
        }

        let tz = match std::env::var("TIMEZONE") {
            Ok(raw) if !raw.trim().is_empty() => parse_timezone(&raw)?,
            _ => DEFAULT_TIMEZONE,
        };
        let service_start_hour = match std::env::var("SERVICE_START_HOUR") {
            Ok(raw) if !raw.trim().is_empty() => parse_service_start_hour(&raw)?,
            _ => DEFAULT_SERVICE_START_HOUR,
        };
        let bind_addr = parse_bind_addr(
            &std::env::var("BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string()),
        )?;

        let reset_hours = env_bounded(
            "PASSWORD_RESET_TOKEN_LIFESPAN_HOURS",
            1..=MAX_PASSWORD_RESET_HOURS,
        )?
        .unwrap_or(PASSWORD_RESET_TOKEN_LIFESPAN_HOURS);
        let auth = AuthSettings {
            frontend_url: std::env::var("FRONTEND_URL")
                .unwrap_or_else(|_| DEFAULT_FRONTEND_URL.to_string()),
            password_reset_lifespan: Duration::hours(reset_hours),
            bcrypt_cost: env_bounded("BCRYPT_COST", BCRYPT_COST_RANGE)?
                .unwrap_or(DEFAULT_BCRYPT_COST),
        };

        let sweep_secs = env_bounded(
            "REFRESH_SWEEP_INTERVAL_SECS",
            1..=MAX_REFRESH_SWEEP_INTERVAL_SECS,
        )?
        .unwrap_or(DEFAULT_REFRESH_SWEEP_INTERVAL_SECS);

        Ok(Self {
            database: DbConfig::from_env_optional(),
            jwt,
            check_in: CheckInPolicy::new(tz, service_start_hour),
            auth,
            qr_code_size: env_bounded("QR_CODE_SIZE", 1..=MAX_QR_CODE_SIZE)?
                .unwrap_or(DEFAULT_QR_CODE_SIZE),
            resend: ResendConfig::from_env(),
            bind_addr,
            refresh_sweep_interval: std::time::Duration::from_secs(sweep_secs),
        })
    }

    #[cfg(debug_assertions)]
    fn fallback_jwt_config() -> Result<JwtConfig, ConfigError> {
        tracing::warn!("JWT_SECRET not set, using insecure development secret");
        Ok(JwtConfig::new(DEV_JWT_SECRET).with_env_overrides())
    }

    #[cfg(not(debug_assertions))]
    fn fallback_jwt_config() -> Result<JwtConfig, ConfigError> {
        Err(ConfigError::MissingJwtSecret)
    }

    /// Configuration with defaults and the given signing secret
    pub fn new(jwt_secret: impl Into<String>) -> Self {
        Self {
            database: None,
            jwt: JwtConfig::new(jwt_secret),
            check_in: CheckInPolicy::default(),
            auth: AuthSettings::default(),
            qr_code_size: DEFAULT_QR_CODE_SIZE,
            resend: None,
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            refresh_sweep_interval: std::time::Duration::from_secs(
                DEFAULT_REFRESH_SWEEP_INTERVAL_SECS,
            ),
        }
    }

    /// Use PostgreSQL
    pub fn database(mut self, database: DbConfig) -> Self {
        self.database = Some(database);
        self
    }

    /// Set timezone and service start hour
    pub fn check_in(mut self, policy: CheckInPolicy) -> Self {
        self.check_in = policy;
        self
    }

    pub fn bind_addr(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    pub fn frontend_url(mut self, url: impl Into<String>) -> Self {
        self.auth.frontend_url = url.into();
        self
    }

    /// Check if database is configured
    pub fn has_database(&self) -> bool {
        self.database.is_some()
    }

    /// Check if an email provider is configured
    pub fn has_email_provider(&self) -> bool {
        self.resend.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ========================================================================
    // Parser Tests (no env var dependencies - thread safe)
    // ========================================================================

    #[test]
    fn test_parse_timezone() {
        assert_eq!(parse_timezone("Africa/Lagos").unwrap(), DEFAULT_TIMEZONE);
        assert_eq!(
            parse_timezone(" Europe/London ").unwrap(),
            chrono_tz::Europe::London
        );
        assert!(matches!(
            parse_timezone("Mars/Olympus"),
            Err(ConfigError::InvalidValue { name: "TIMEZONE", .. })
        ));
    }

    #[test]
    fn test_parse_service_start_hour() {
        assert_eq!(parse_service_start_hour("9").unwrap(), 9);
        assert_eq!(parse_service_start_hour("0").unwrap(), 0);
        assert_eq!(parse_service_start_hour("23").unwrap(), 23);
        assert!(parse_service_start_hour("24").is_err());
        assert!(parse_service_start_hour("nine").is_err());
    }

    #[test]
    fn test_parse_bounded_rejects_zero_negative_and_huge() {
        assert_eq!(
            parse_bounded("REFRESH_SWEEP_INTERVAL_SECS", "60", 1..=MAX_REFRESH_SWEEP_INTERVAL_SECS)
                .unwrap(),
            60
        );
        assert!(matches!(
            parse_bounded("REFRESH_SWEEP_INTERVAL_SECS", "0", 1..=MAX_REFRESH_SWEEP_INTERVAL_SECS),
            Err(ConfigError::InvalidValue {
                name: "REFRESH_SWEEP_INTERVAL_SECS",
                ..
            })
        ));

        let access = 1..=MAX_ACCESS_TOKEN_MINUTES;
        assert_eq!(
            parse_bounded("JWT_ACCESS_EXPIRATION_MINUTES", " 15 ", access.clone()).unwrap(),
            15
        );
        assert!(parse_bounded("JWT_ACCESS_EXPIRATION_MINUTES", "-5", access.clone()).is_err());
        assert!(parse_bounded("JWT_ACCESS_EXPIRATION_MINUTES", "0", access.clone()).is_err());
        assert!(
            parse_bounded("JWT_ACCESS_EXPIRATION_MINUTES", &i64::MAX.to_string(), access).is_err()
        );

        let refresh = 1..=MAX_REFRESH_TOKEN_DAYS;
        assert!(parse_bounded("JWT_REFRESH_EXPIRATION_DAYS", "-1", refresh.clone()).is_err());
        assert!(
            parse_bounded("JWT_REFRESH_EXPIRATION_DAYS", "9999999999999", refresh.clone()).is_err()
        );
        assert_eq!(
            parse_bounded("JWT_REFRESH_EXPIRATION_DAYS", "30", refresh).unwrap(),
            30
        );

        assert!(
            parse_bounded(
                "PASSWORD_RESET_TOKEN_LIFESPAN_HOURS",
                &i64::MAX.to_string(),
                1..=MAX_PASSWORD_RESET_HOURS
            )
            .is_err()
        );
        assert!(parse_bounded("BCRYPT_COST", "2", BCRYPT_COST_RANGE).is_err());
        assert!(parse_bounded("QR_CODE_SIZE", "0", 1..=MAX_QR_CODE_SIZE).is_err());
        assert!(parse_bounded("QR_CODE_SIZE", "abc", 1..=MAX_QR_CODE_SIZE).is_err());
    }

    #[test]
    fn test_parse_bind_addr() {
        assert_eq!(
            parse_bind_addr(DEFAULT_BIND_ADDR).unwrap(),
            SocketAddr::from(([0, 0, 0, 0], 8080))
        );
        assert!(parse_bind_addr("localhost").is_err());
    }

    // ========================================================================
    // Config Struct Tests
    // ========================================================================

    #[test]
    fn test_config_defaults() {
        let config = Config::new("secret");

        assert!(!config.has_database());
        assert!(!config.has_email_provider());
        assert_eq!(config.qr_code_size, 256);
        assert_eq!(config.check_in, CheckInPolicy::default());
        assert_eq!(config.auth.frontend_url, DEFAULT_FRONTEND_URL);
        assert_eq!(config.auth.password_reset_lifespan, Duration::hours(24));
        assert_eq!(
            config.refresh_sweep_interval,
            std::time::Duration::from_secs(3600)
        );
        assert_eq!(config.jwt.access_token_expiration_minutes, 15);
        assert_eq!(config.jwt.refresh_token_expiration_days, 7);
    }

    #[test]
    fn test_config_builder() {
        let config = Config::new("secret")
            .database(DbConfig::new("postgres://localhost/cci"))
            .check_in(CheckInPolicy::new(chrono_tz::UTC, 10))
            .frontend_url("https://portal.example")
            .bind_addr(SocketAddr::from(([127, 0, 0, 1], 3000)));

        assert!(config.has_database());
        assert_eq!(config.check_in.timezone(), chrono_tz::UTC);
        assert_eq!(config.auth.frontend_url, "https://portal.example");
        assert_eq!(config.bind_addr.port(), 3000);
    }

    #[test]
    fn test_config_debug_hides_secret() {
        let config = Config::new("super-secret-key-123");
        let debug = format!("{:?}", config);

        assert!(!debug.contains("super-secret-key-123"));
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::InvalidValue {
            name: "TIMEZONE",
            value: "Mars/Olympus".to_string(),
        };
        assert_eq!(err.to_string(), "Invalid value for TIMEZONE: \"Mars/Olympus\"");
        assert_eq!(
            ConfigError::MissingJwtSecret.to_string(),
            "JWT_SECRET environment variable not set"
        );
    }
}
