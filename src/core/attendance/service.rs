//! Attendance service
//!
//! Records at most one check-in per user per local service day, through
//! either a manual lookup by external identifier or a scanned QR token, and
//! answers the history and analytics queries.

use chrono::{DateTime, Months, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::core::attendance::calendar::CheckInPolicy;
use crate::core::clock::SharedClock;
use crate::core::db::models::{Attendance, DailyAttendance, NewAttendance, User};
use crate::core::db::repositories::{AttendanceRepositoryError, UserRepositoryError};
use crate::core::db::store::{AttendanceStore, UserStore};
use crate::core::error::{Classify, ErrorKind};
use crate::core::pagination::{PageRequest, Pagination, paginate};

/// Attendance service error types
#[derive(Debug, thiserror::Error)]
pub enum AttendanceError {
    #[error("User not found")]
    UserNotFound,

    #[error("Invalid QR code")]
    InvalidQrToken,

    #[error("User already checked in today")]
    AlreadyCheckedIn,

    #[error("Invalid date: {0}")]
    InvalidDate(String),

    #[error("start_date must not be after end_date")]
    InvalidDateRange,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<UserRepositoryError> for AttendanceError {
    fn from(err: UserRepositoryError) -> Self {
        match err {
            UserRepositoryError::NotFound => AttendanceError::UserNotFound,
            _ => AttendanceError::Internal(format!("user store: {}", err)),
        }
    }
}

impl From<AttendanceRepositoryError> for AttendanceError {
    fn from(err: AttendanceRepositoryError) -> Self {
        AttendanceError::Internal(format!("attendance store: {}", err))
    }
}

impl Classify for AttendanceError {
    fn kind(&self) -> ErrorKind {
        match self {
            AttendanceError::UserNotFound => ErrorKind::NotFound,
            AttendanceError::AlreadyCheckedIn => ErrorKind::Conflict,
            AttendanceError::InvalidQrToken
            | AttendanceError::InvalidDate(_)
            | AttendanceError::InvalidDateRange => ErrorKind::Validation,
            AttendanceError::Internal(_) => ErrorKind::Internal,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            AttendanceError::UserNotFound => "USER_NOT_FOUND",
            AttendanceError::InvalidQrToken => "INVALID_QR_CODE",
            AttendanceError::AlreadyCheckedIn => "ALREADY_CHECKED_IN",
            AttendanceError::InvalidDate(_) => "INVALID_DATE_FORMAT",
            AttendanceError::InvalidDateRange => "INVALID_DATE_RANGE",
            AttendanceError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

// ============================================================================
// Request/Response DTOs
// ============================================================================

/// Manual check-in request
#[derive(Debug, Clone, Deserialize)]
pub struct CheckInRequest {
    pub user_id: String,
}

/// QR check-in request
#[derive(Debug, Clone, Deserialize)]
pub struct QrCheckInRequest {
    pub qr_code_token: String,
}

/// Query string of the history endpoint
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HistoryQuery {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

/// Query string of the analytics endpoint
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AnalyticsQuery {
    pub date: Option<String>,
}

/// A recorded check-in as returned to clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    pub id: uuid::Uuid,
    /// External identifier of the member
    pub user_id: String,
    pub checked_in_at: DateTime<Utc>,
    pub service_date: NaiveDate,
    pub qr_based: bool,
    pub late: bool,
    pub manual: bool,
    pub visitor: bool,
    pub member: bool,
}

impl AttendanceRecord {
    fn new(record: Attendance, user: &User) -> Self {
        Self {
            id: record.id,
            user_id: user.external_id.clone(),
            checked_in_at: record.checked_in_at,
            service_date: record.service_date,
            qr_based: record.qr_based,
            late: record.late,
            manual: record.manual,
            visitor: record.visitor,
            member: record.member,
        }
    }
}

/// One page of per-day totals
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttendanceHistory {
    pub data: Vec<DailyAttendance>,
    pub pagination: Pagination,
}

/// Headline numbers for one day
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceAnalytics {
    pub total_active_users_all_time: i64,
    pub total_attendance_for_date: i64,
    pub members_for_date: i64,
    pub visitors_for_date: i64,
}

/// How a check-in was made
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckInMethod {
    Manual,
    Qr,
}

/// Parse a `YYYY-MM-DD` query value
pub fn parse_date(field: &str, raw: &str) -> Result<NaiveDate, AttendanceError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|_| {
        AttendanceError::InvalidDate(format!("{field} must be in YYYY-MM-DD format"))
    })
}

fn parse_optional_date(field: &str, raw: Option<&str>) -> Result<Option<NaiveDate>, AttendanceError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        Some(value) => parse_date(field, value).map(Some),
        None => Ok(None),
    }
}

/// Attendance service
#[derive(Clone)]
pub struct AttendanceService {
    users: Arc<dyn UserStore>,
    attendance: Arc<dyn AttendanceStore>,
    policy: CheckInPolicy,
    clock: SharedClock,
}

impl AttendanceService {
    pub fn new(
        users: Arc<dyn UserStore>,
        attendance: Arc<dyn AttendanceStore>,
        policy: CheckInPolicy,
        clock: SharedClock,
    ) -> Self {
        Self {
            users,
            attendance,
            policy,
            clock,
        }
    }

    /// Check in the member with external identifier `user_id`
    pub async fn check_in_manual(&self, user_id: &str) -> Result<AttendanceRecord, AttendanceError> {
        let user = self
            .users
            .find_by_external_id(user_id.trim())
            .await?
            .ok_or(AttendanceError::UserNotFound)?;

        self.check_in(&user, CheckInMethod::Manual).await
    }

    /// Check in the owner of `qr_token`
    pub async fn check_in_by_qr(&self, qr_token: &str) -> Result<AttendanceRecord, AttendanceError> {
        let qr_token = qr_token.trim();
        if qr_token.is_empty() {
            return Err(AttendanceError::InvalidQrToken);
        }

        let user = self
            .users
            .find_by_qr_token(qr_token)
            .await?
            .ok_or(AttendanceError::InvalidQrToken)?;

        self.check_in(&user, CheckInMethod::Qr).await
    }

    async fn check_in(
        &self,
        user: &User,
        method: CheckInMethod,
    ) -> Result<AttendanceRecord, AttendanceError> {
        let now = self.clock.now();
        let service_date = self.policy.local_day(now);
        let (start, end) = self.policy.day_window(service_date);

        if self
            .attendance
            .find_in_window(user.id, start, end)
            .await?
            .is_some()
        {
            tracing::warn!(
                "Duplicate check-in for {} on {}",
                user.external_id,
                service_date
            );
            return Err(AttendanceError::AlreadyCheckedIn);
        }

        let late = self.policy.is_late(now);
        let inserted = self
            .attendance
            .insert_once(NewAttendance {
                user_id: user.id,
                checked_in_at: now,
                service_date,
                qr_based: method == CheckInMethod::Qr,
                manual: method == CheckInMethod::Manual,
                late,
                visitor: user.roles.is_visitor,
                member: user.roles.is_member,
            })
            .await?;

        // A concurrent check-in won the (user, day) slot after our lookup
        let Some(record) = inserted else {
            tracing::warn!(
                "Duplicate check-in for {} on {} (concurrent)",
                user.external_id,
                service_date
            );
            return Err(AttendanceError::AlreadyCheckedIn);
        };

        tracing::info!(
            "Checked in {} on {} ({:?}, late={})",
            user.external_id,
            service_date,
            method,
            late
        );

        Ok(AttendanceRecord::new(record, user))
    }

    /// Per-day totals between two local dates, newest first.
    /// Defaults to the month ending today.
    pub async fn history(&self, query: HistoryQuery) -> Result<AttendanceHistory, AttendanceError> {
        let today = self.policy.local_day(self.clock.now());

        let end = parse_optional_date("end_date", query.end_date.as_deref())?.unwrap_or(today);
        let start = match parse_optional_date("start_date", query.start_date.as_deref())? {
            Some(start) => start,
            None => today.checked_sub_months(Months::new(1)).unwrap_or(today),
        };

        if start > end {
            return Err(AttendanceError::InvalidDateRange);
        }

        let days = self.attendance.daily_summaries(start, end).await?;
        let (data, pagination) = paginate(days, PageRequest::new(query.page, query.limit));

        Ok(AttendanceHistory { data, pagination })
    }

    /// Headline numbers for `date`
    pub async fn analytics(&self, date: NaiveDate) -> Result<AttendanceAnalytics, AttendanceError> {
        let total_users = self.users.count().await?;
        let counts = self.attendance.day_counts(date).await?;

        Ok(AttendanceAnalytics {
            total_active_users_all_time: total_users,
            total_attendance_for_date: counts.total,
            members_for_date: counts.members,
            visitors_for_date: counts.visitors,
        })
    }
}
