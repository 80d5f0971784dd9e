//! Auth API endpoints
//!
//! Provides REST API endpoints for authentication:
//! - POST /api/v1/auth/register - Register with email and password
//! - POST /api/v1/auth/register/complete - Register with a full profile
//! - POST /api/v1/auth/set-password - Redeem a password-set token
//! - POST /api/v1/auth/login - Login and get tokens
//! - POST /api/v1/auth/refresh - Rotate a refresh token
//! - POST /api/v1/logout - Revoke every refresh token of the caller

use axum::{
    Json, Router,
    extract::{FromRef, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
};
use serde::{Deserialize, Serialize};

use crate::core::auth::extractor::AuthenticatedUser;
use crate::core::auth::jwt::{JwtService, TokenPair};
use crate::core::auth::service::{
    AuthError, AuthService, CompleteRegisterRequest, LoginRequest, LoginResponse, RefreshRequest,
    RegisterRequest, RegisterResponse, SetPasswordRequest, SetPasswordResponse,
};
use crate::core::db::models::UserResponse;
use crate::core::error::{JsonBody, error_response};

/// Auth API state containing the auth service
#[derive(Clone)]
pub struct AuthApiState {
    pub auth_service: AuthService,
}

impl FromRef<AuthApiState> for JwtService {
    fn from_ref(state: &AuthApiState) -> Self {
        state.auth_service.jwt().clone()
    }
}

/// Convert AuthError to API response
impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        error_response(&self)
    }
}

/// Response for logout
#[derive(Debug, Serialize, Deserialize)]
pub struct LogoutResponse {
    pub message: String,
    pub revoked_sessions: u64,
}

/// Create the auth API router
pub fn auth_api_router(state: AuthApiState) -> Router {
    Router::new()
        .route("/api/v1/auth/register", post(register_handler))
        .route(
            "/api/v1/auth/register/complete",
            post(complete_register_handler),
        )
        .route("/api/v1/auth/set-password", post(set_password_handler))
        .route("/api/v1/auth/login", post(login_handler))
        .route("/api/v1/auth/refresh", post(refresh_handler))
        .route("/api/v1/logout", post(logout_handler))
        .with_state(state)
}

/// POST /api/v1/auth/register
async fn register_handler(
    State(state): State<AuthApiState>,
    JsonBody(request): JsonBody<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), AuthError> {
    let response = state.auth_service.register(request).await?;

    Ok((StatusCode::CREATED, Json(response)))
}

/// POST /api/v1/auth/register/complete
async fn complete_register_handler(
    State(state): State<AuthApiState>,
    JsonBody(request): JsonBody<CompleteRegisterRequest>,
) -> Result<(StatusCode, Json<UserResponse>), AuthError> {
    let user = state.auth_service.complete_register(request).await?;

    Ok((StatusCode::CREATED, Json(user)))
}

/// POST /api/v1/auth/set-password
async fn set_password_handler(
    State(state): State<AuthApiState>,
    JsonBody(request): JsonBody<SetPasswordRequest>,
) -> Result<Json<SetPasswordResponse>, AuthError> {
    let response = state.auth_service.set_password(request).await?;

    Ok(Json(response))
}

/// POST /api/v1/auth/login
async fn login_handler(
    State(state): State<AuthApiState>,
    JsonBody(request): JsonBody<LoginRequest>,
) -> Result<Json<LoginResponse>, AuthError> {
    let response = state.auth_service.login(request).await?;

    Ok(Json(response))
}

/// POST /api/v1/auth/refresh
async fn refresh_handler(
    State(state): State<AuthApiState>,
    JsonBody(request): JsonBody<RefreshRequest>,
) -> Result<Json<TokenPair>, AuthError> {
    tracing::debug!("Token refresh request");

    let tokens = state.auth_service.refresh(request).await?;

    Ok(Json(tokens))
}

/// POST /api/v1/logout
async fn logout_handler(
    State(state): State<AuthApiState>,
    user: AuthenticatedUser,
) -> Result<Json<LogoutResponse>, AuthError> {
    let revoked = state.auth_service.logout(user.subject()).await?;

    Ok(Json(LogoutResponse {
        message: "Logged out successfully".to_string(),
        revoked_sessions: revoked,
    }))
}
