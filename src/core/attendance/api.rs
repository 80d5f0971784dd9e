//! Attendance API endpoints
//!
//! All routes require a bearer access token:
//! - POST /api/v1/attendance - Manual check-in by external identifier
//! - POST /api/v1/attendance/qr-checkin - Check-in with a scanned QR token
//! - GET /api/v1/attendance/history - Per-day totals, paginated
//! - GET /api/v1/attendance/analytics - Headline numbers for one day

use axum::{
    Json, Router,
    extract::{FromRef, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};

use crate::core::attendance::service::{
    AnalyticsQuery, AttendanceAnalytics, AttendanceError, AttendanceHistory, AttendanceRecord,
    AttendanceService, CheckInRequest, HistoryQuery, QrCheckInRequest, parse_date,
};
use crate::core::auth::{AuthenticatedUser, JwtService};
use crate::core::error::{JsonBody, QueryParams, error_response};

/// Attendance API state
#[derive(Clone)]
pub struct AttendanceApiState {
    pub attendance_service: AttendanceService,
    pub jwt: JwtService,
}

impl FromRef<AttendanceApiState> for JwtService {
    fn from_ref(state: &AttendanceApiState) -> Self {
        state.jwt.clone()
    }
}

impl IntoResponse for AttendanceError {
    fn into_response(self) -> Response {
        error_response(&self)
    }
}

/// Create the attendance API router
pub fn attendance_api_router(state: AttendanceApiState) -> Router {
    Router::new()
        .route("/api/v1/attendance", post(check_in_handler))
        .route("/api/v1/attendance/qr-checkin", post(qr_check_in_handler))
        .route("/api/v1/attendance/history", get(history_handler))
        .route("/api/v1/attendance/analytics", get(analytics_handler))
        .with_state(state)
}

/// POST /api/v1/attendance
async fn check_in_handler(
    State(state): State<AttendanceApiState>,
    caller: AuthenticatedUser,
    JsonBody(request): JsonBody<CheckInRequest>,
) -> Result<(StatusCode, Json<AttendanceRecord>), AttendanceError> {
    tracing::debug!(
        "Manual check-in of {} by {}",
        request.user_id,
        caller.subject()
    );

    let record = state
        .attendance_service
        .check_in_manual(&request.user_id)
        .await?;

    Ok((StatusCode::CREATED, Json(record)))
}

/// POST /api/v1/attendance/qr-checkin
async fn qr_check_in_handler(
    State(state): State<AttendanceApiState>,
    caller: AuthenticatedUser,
    JsonBody(request): JsonBody<QrCheckInRequest>,
) -> Result<(StatusCode, Json<AttendanceRecord>), AttendanceError> {
    tracing::debug!("QR check-in scanned by {}", caller.subject());

    let record = state
        .attendance_service
        .check_in_by_qr(&request.qr_code_token)
        .await?;

    Ok((StatusCode::CREATED, Json(record)))
}

/// GET /api/v1/attendance/history
async fn history_handler(
    State(state): State<AttendanceApiState>,
    _caller: AuthenticatedUser,
    QueryParams(query): QueryParams<HistoryQuery>,
) -> Result<Json<AttendanceHistory>, AttendanceError> {
    let history = state.attendance_service.history(query).await?;

    Ok(Json(history))
}

/// GET /api/v1/attendance/analytics
async fn analytics_handler(
    State(state): State<AttendanceApiState>,
    _caller: AuthenticatedUser,
    QueryParams(query): QueryParams<AnalyticsQuery>,
) -> Result<Json<AttendanceAnalytics>, AttendanceError> {
    let raw = query
        .date
        .filter(|d| !d.trim().is_empty())
        .ok_or_else(|| {
            AttendanceError::InvalidDate("date query parameter is required".to_string())
        })?;
    let date = parse_date("date", &raw)?;

    let analytics = state.attendance_service.analytics(date).await?;

    Ok(Json(analytics))
}
