//! Authentication service
//!
//! Provides business logic for two-phase registration, password setting,
//! login, refresh token rotation and logout. Coordinates between the user
//! store, the refresh token ledger, the JWT service and the notification
//! dispatcher.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

use crate::core::auth::jwt::{JwtError, JwtService, TokenPair};
use crate::core::auth::ledger::{LedgerError, RefreshTokenLedger};
use crate::core::auth::password::{
    DEFAULT_BCRYPT_COST, PasswordPolicyViolation, check_password_policy, generate_external_id,
    generate_token, hash_password, is_valid_email, verify_password,
};
use crate::core::clock::SharedClock;
use crate::core::db::models::{
    NewUser, PasswordReset, RoleFlags, User, UserProfile, UserResponse, UserSummary,
};
use crate::core::db::repositories::UserRepositoryError;
use crate::core::db::store::UserStore;
use crate::core::error::{Classify, ErrorKind};
use crate::core::notify::{Notification, NotificationDispatcher, SIGNUP_TEMPLATE};

/// Default lifetime of a password-set token (24 hours)
pub const PASSWORD_RESET_TOKEN_LIFESPAN_HOURS: i64 = 24;

/// Subject line of the signup email
pub const SIGNUP_SUBJECT: &str = "Welcome to CCI Member Portal, Set Your Password";

/// Attempts at drawing an unused external identifier before giving up
const EXTERNAL_ID_ATTEMPTS: usize = 8;

/// Authentication service error types
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Email already registered")]
    DuplicateEmail,

    #[error("Passwords do not match")]
    PasswordMismatch,

    #[error("Password too weak: {0}")]
    WeakPassword(PasswordPolicyViolation),

    #[error("Invalid email format")]
    InvalidEmail,

    #[error("Invalid profile: {0}")]
    InvalidProfile(String),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Invalid or expired token")]
    InvalidOrExpiredToken,

    #[error("Invalid refresh token")]
    InvalidRefreshToken,

    #[error("Invalid token")]
    InvalidToken,

    #[error("User not found")]
    UserNotFound,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<UserRepositoryError> for AuthError {
    fn from(err: UserRepositoryError) -> Self {
        match err {
            UserRepositoryError::NotFound => AuthError::UserNotFound,
            UserRepositoryError::EmailAlreadyExists => AuthError::DuplicateEmail,
            _ => AuthError::Internal(format!("user store: {}", err)),
        }
    }
}

impl From<LedgerError> for AuthError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::NotFound | LedgerError::Expired => AuthError::InvalidRefreshToken,
            LedgerError::Store(e) => AuthError::Internal(format!("refresh token store: {}", e)),
        }
    }
}

impl From<JwtError> for AuthError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::Expired | JwtError::InvalidToken | JwtError::DecodingError(_) => {
                AuthError::InvalidToken
            }
            JwtError::MissingSecret | JwtError::EncodingError(_) => {
                AuthError::Internal(format!("token codec: {}", err))
            }
        }
    }
}

impl Classify for AuthError {
    fn kind(&self) -> ErrorKind {
        match self {
            AuthError::PasswordMismatch
            | AuthError::WeakPassword(_)
            | AuthError::InvalidEmail
            | AuthError::InvalidProfile(_) => ErrorKind::Validation,
            AuthError::DuplicateEmail => ErrorKind::Conflict,
            AuthError::InvalidCredentials
            | AuthError::InvalidOrExpiredToken
            | AuthError::InvalidRefreshToken
            | AuthError::InvalidToken => ErrorKind::Auth,
            AuthError::UserNotFound => ErrorKind::NotFound,
            AuthError::Internal(_) => ErrorKind::Internal,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            AuthError::DuplicateEmail => "DUPLICATE_EMAIL",
            AuthError::PasswordMismatch => "PASSWORD_MISMATCH",
            AuthError::WeakPassword(_) => "WEAK_PASSWORD",
            AuthError::InvalidEmail => "INVALID_EMAIL",
            AuthError::InvalidProfile(_) => "INVALID_PROFILE",
            AuthError::InvalidCredentials => "INVALID_CREDENTIALS",
            AuthError::InvalidOrExpiredToken => "INVALID_OR_EXPIRED_TOKEN",
            AuthError::InvalidRefreshToken => "INVALID_REFRESH_TOKEN",
            AuthError::InvalidToken => "INVALID_TOKEN",
            AuthError::UserNotFound => "USER_NOT_FOUND",
            AuthError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

// ============================================================================
// Request/Response DTOs
// ============================================================================

/// Phase-one registration: credentials only
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

/// Phase-two registration: full profile, password set later by email link
#[derive(Debug, Clone, Deserialize)]
pub struct CompleteRegisterRequest {
    pub email: String,
    #[serde(flatten)]
    pub profile: UserProfile,
    #[serde(default)]
    pub member: bool,
    #[serde(default)]
    pub visitor: bool,
    #[serde(default)]
    pub usher: bool,
    #[serde(default)]
    pub family_head: bool,
}

/// Redeem a password-set token
#[derive(Debug, Clone, Deserialize)]
pub struct SetPasswordRequest {
    pub token: String,
    pub password: String,
    pub confirm_password: String,
}

/// Login request data
#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Token refresh request
#[derive(Debug, Clone, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Result of phase-one registration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub user_id: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

/// Result of a successful password set
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetPasswordResponse {
    pub user_id: String,
    pub email: String,
    pub password_set_at: DateTime<Utc>,
}

/// Tokens and identity returned by login
#[derive(Debug, Clone, Serialize)]
pub struct LoginResponse {
    #[serde(flatten)]
    pub tokens: TokenPair,
    pub user: UserSummary,
}

/// Tunables for the auth flows
#[derive(Debug, Clone)]
pub struct AuthSettings {
    /// Base URL of the web frontend, used in emailed links
    pub frontend_url: String,
    /// How long a password-set token stays valid
    pub password_reset_lifespan: Duration,
    /// bcrypt cost factor
    pub bcrypt_cost: u32,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            frontend_url: "http://localhost:3000".to_string(),
            password_reset_lifespan: Duration::hours(PASSWORD_RESET_TOKEN_LIFESPAN_HOURS),
            bcrypt_cost: DEFAULT_BCRYPT_COST,
        }
    }
}

/// Authentication service
#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserStore>,
    ledger: RefreshTokenLedger,
    jwt: JwtService,
    notifications: NotificationDispatcher,
    clock: SharedClock,
    settings: AuthSettings,
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

impl AuthService {
    /// Create a new authentication service
    pub fn new(
        users: Arc<dyn UserStore>,
        ledger: RefreshTokenLedger,
        jwt: JwtService,
        notifications: NotificationDispatcher,
        clock: SharedClock,
        settings: AuthSettings,
    ) -> Self {
        Self {
            users,
            ledger,
            jwt,
            notifications,
            clock,
            settings,
        }
    }

    /// Token codec used by this service
    pub fn jwt(&self) -> &JwtService {
        &self.jwt
    }

    fn validate_email(email: &str) -> Result<(), AuthError> {
        if is_valid_email(email) {
            Ok(())
        } else {
            Err(AuthError::InvalidEmail)
        }
    }

    fn validate_new_password(password: &str, confirm: &str) -> Result<(), AuthError> {
        if password != confirm {
            return Err(AuthError::PasswordMismatch);
        }
        check_password_policy(password).map_err(AuthError::WeakPassword)
    }

    fn validate_profile(request: &CompleteRegisterRequest) -> Result<(), AuthError> {
        let profile = &request.profile;

        for (field, value) in [
            ("first_name", &profile.first_name),
            ("last_name", &profile.last_name),
        ] {
            let len = value.trim().chars().count();
            if !(2..=50).contains(&len) {
                return Err(AuthError::InvalidProfile(format!(
                    "{field} must be between 2 and 50 characters"
                )));
            }
        }

        if !matches!(profile.gender.as_str(), "Male" | "Female") {
            return Err(AuthError::InvalidProfile(
                "gender must be Male or Female".to_string(),
            ));
        }

        if !profile.emergency_contact_email.is_empty()
            && !is_valid_email(&profile.emergency_contact_email)
        {
            return Err(AuthError::InvalidProfile(
                "emergency_contact_email is not a valid email".to_string(),
            ));
        }

        Ok(())
    }

    fn hash(&self, password: &str) -> Result<String, AuthError> {
        hash_password(password, self.settings.bcrypt_cost)
            .map_err(|e| AuthError::Internal(format!("password hashing: {}", e)))
    }

    /// Insert `template` under a freshly drawn external identifier, redrawing on collision
    async fn insert_with_external_id(&self, mut template: NewUser) -> Result<User, AuthError> {
        for _ in 0..EXTERNAL_ID_ATTEMPTS {
            template.external_id = generate_external_id();
            match self.users.insert_user(template.clone()).await {
                Ok(user) => return Ok(user),
                Err(UserRepositoryError::ExternalIdAlreadyExists) => {
                    tracing::debug!("External id {} taken, retrying", template.external_id);
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(AuthError::Internal(
            "external id allocation: identifier space exhausted".to_string(),
        ))
    }

    /// Issue an access token and a refresh token for `user`
    async fn issue_tokens(&self, user: &User) -> Result<TokenPair, AuthError> {
        let (access_token, access_expires_at) =
            self.jwt
                .issue_access_token(&user.external_id, &user.email, user.roles.is_admin)?;
        let refresh = self.ledger.issue(user.id).await?;

        Ok(TokenPair::bearer(
            access_token,
            access_expires_at,
            refresh.token,
            refresh.expires_at,
        ))
    }

    /// Phase-one registration with email and password
    pub async fn register(&self, request: RegisterRequest) -> Result<RegisterResponse, AuthError> {
        let email = normalize_email(&request.email);
        Self::validate_email(&email)?;

        if self.users.find_by_email(&email).await?.is_some() {
            return Err(AuthError::DuplicateEmail);
        }

        Self::validate_new_password(&request.password, &request.confirm_password)?;
        let password_hash = self.hash(&request.password)?;

        let user = self
            .insert_with_external_id(NewUser {
                external_id: String::new(),
                email,
                password_hash: Some(password_hash),
                profile: UserProfile::default(),
                roles: RoleFlags {
                    is_member: true,
                    is_visitor: false,
                    ..Default::default()
                },
                password_reset: None,
                created_at: self.clock.now(),
            })
            .await?;

        tracing::info!("User registered: {}", user.external_id);

        Ok(RegisterResponse {
            user_id: user.external_id,
            email: user.email,
            created_at: user.created_at,
        })
    }

    /// Phase-two registration with a full profile.
    ///
    /// The account has no password until the emailed set-password link is
    /// used. Email delivery happens in the background; a failed send does
    /// not fail the registration.
    pub async fn complete_register(
        &self,
        mut request: CompleteRegisterRequest,
    ) -> Result<UserResponse, AuthError> {
        let email = normalize_email(&request.email);
        Self::validate_email(&email)?;
        request.profile.first_name = request.profile.first_name.trim().to_string();
        request.profile.last_name = request.profile.last_name.trim().to_string();
        Self::validate_profile(&request)?;

        if self.users.find_by_email(&email).await?.is_some() {
            return Err(AuthError::DuplicateEmail);
        }

        let now = self.clock.now();
        let reset_token = generate_token();

        let user = self
            .insert_with_external_id(NewUser {
                external_id: String::new(),
                email,
                password_hash: None,
                profile: request.profile,
                roles: RoleFlags {
                    is_member: request.member,
                    is_visitor: request.visitor,
                    is_usher: request.usher,
                    is_admin: false,
                    is_family_head: request.family_head,
                },
                password_reset: Some(PasswordReset {
                    token: reset_token.clone(),
                    expires_at: now + self.settings.password_reset_lifespan,
                }),
                created_at: now,
            })
            .await?;

        let link = format!(
            "{}/set-password?token={}",
            self.settings.frontend_url.trim_end_matches('/'),
            reset_token
        );
        self.notifications.dispatch(Notification {
            to: user.email.clone(),
            subject: SIGNUP_SUBJECT.to_string(),
            template: SIGNUP_TEMPLATE.to_string(),
            data: json!({
                "FirstName": user.profile.first_name,
                "Link": link,
            }),
        });

        tracing::info!("User registered with full profile: {}", user.external_id);

        Ok(user.into())
    }

    /// Set the password of an account through its single-use token
    pub async fn set_password(
        &self,
        request: SetPasswordRequest,
    ) -> Result<SetPasswordResponse, AuthError> {
        if request.token.is_empty() {
            return Err(AuthError::InvalidOrExpiredToken);
        }

        let now = self.clock.now();
        let user = self
            .users
            .find_by_reset_token(&request.token)
            .await?
            .ok_or(AuthError::InvalidOrExpiredToken)?;

        match user.password_reset_expires_at {
            Some(expires_at) if now <= expires_at => {}
            _ => return Err(AuthError::InvalidOrExpiredToken),
        }

        check_password_policy(&request.password).map_err(AuthError::WeakPassword)?;
        if request.password != request.confirm_password {
            return Err(AuthError::PasswordMismatch);
        }

        let password_hash = self.hash(&request.password)?;

        // Conditional on the token still being pending; a concurrent redeemer loses here
        if !self
            .users
            .redeem_reset_token(&request.token, &password_hash, now)
            .await?
        {
            return Err(AuthError::InvalidOrExpiredToken);
        }

        tracing::info!("Password set for user {}", user.external_id);

        Ok(SetPasswordResponse {
            user_id: user.external_id,
            email: user.email,
            password_set_at: now,
        })
    }

    /// Login an existing user
    pub async fn login(&self, request: LoginRequest) -> Result<LoginResponse, AuthError> {
        let email = normalize_email(&request.email);

        let user = self
            .users
            .find_by_email(&email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        let password_ok = user
            .password_hash
            .as_deref()
            .is_some_and(|hash| verify_password(&request.password, hash));
        if !password_ok {
            return Err(AuthError::InvalidCredentials);
        }

        let tokens = self.issue_tokens(&user).await?;

        tracing::info!("User logged in: {}", user.external_id);

        Ok(LoginResponse {
            tokens,
            user: UserSummary::from(&user),
        })
    }

    /// Exchange a refresh token for a new token pair. The presented token
    /// is spent whether or not the rest of the rotation succeeds.
    pub async fn refresh(&self, request: RefreshRequest) -> Result<TokenPair, AuthError> {
        let user_id = match self.ledger.consume(&request.refresh_token).await {
            Ok(user_id) => user_id,
            Err(e) => {
                tracing::debug!("Refresh rejected: {}", e);
                return Err(e.into());
            }
        };

        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        self.issue_tokens(&user).await
    }

    /// Revoke every refresh token of the member identified by `subject`
    pub async fn logout(&self, subject: &str) -> Result<u64, AuthError> {
        let user = self
            .users
            .find_by_external_id(subject)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        let revoked = self.ledger.revoke_all(user.id).await?;

        tracing::info!(
            "User logged out: {} ({} refresh tokens revoked)",
            user.external_id,
            revoked
        );
        Ok(revoked)
    }
}
