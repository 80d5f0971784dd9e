//! QR API endpoints
//!
//! - POST /api/v1/qr/generate - Issue a new QR code for a member (bearer)
//! - GET /api/v1/qr/{user_id} - Fetch a member's current QR code (bearer)

use axum::{
    Json, Router,
    extract::{FromRef, Path, State},
    response::{IntoResponse, Response},
    routing::{get, post},
};

use super::{GenerateQrRequest, QrCodeResponse, QrError, QrService};
use crate::core::auth::{AuthenticatedUser, JwtService};
use crate::core::error::{JsonBody, error_response};

/// QR API state
#[derive(Clone)]
pub struct QrApiState {
    pub qr_service: QrService,
    pub jwt: JwtService,
}

impl FromRef<QrApiState> for JwtService {
    fn from_ref(state: &QrApiState) -> Self {
        state.jwt.clone()
    }
}

impl IntoResponse for QrError {
    fn into_response(self) -> Response {
        error_response(&self)
    }
}

/// Create the QR API router
pub fn qr_api_router(state: QrApiState) -> Router {
    Router::new()
        .route("/api/v1/qr/generate", post(generate_handler))
        .route("/api/v1/qr/{user_id}", get(current_handler))
        .with_state(state)
}

/// POST /api/v1/qr/generate
async fn generate_handler(
    State(state): State<QrApiState>,
    caller: AuthenticatedUser,
    JsonBody(request): JsonBody<GenerateQrRequest>,
) -> Result<Json<QrCodeResponse>, QrError> {
    tracing::debug!(
        "QR generation for {} requested by {}",
        request.user_id,
        caller.subject()
    );

    let response = state.qr_service.generate(&request.user_id).await?;

    Ok(Json(response))
}

/// GET /api/v1/qr/{user_id}
async fn current_handler(
    State(state): State<QrApiState>,
    _caller: AuthenticatedUser,
    Path(user_id): Path<String>,
) -> Result<Json<QrCodeResponse>, QrError> {
    let response = state.qr_service.current(&user_id).await?;

    Ok(Json(response))
}
