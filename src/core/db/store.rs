//! Storage traits consumed by the services
//!
//! Each logical collection (`users`, `refresh_tokens`, `attendance`) has a
//! trait with a PostgreSQL implementation in [`super::repositories`] and an
//! in-memory implementation in [`super::memory`]. Every write that guards an
//! invariant is a single conditional statement so concurrent callers cannot
//! race past it.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::sync::Arc;
use uuid::Uuid;

use super::models::{
    Attendance, DailyAttendance, NewAttendance, NewRefreshToken, NewUser, RefreshToken, User,
};
use super::repositories::{
    AttendanceRepositoryError, RefreshTokenRepositoryError, UserRepositoryError,
};

/// Attendance counts for a single day
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DayCounts {
    pub total: i64,
    pub members: i64,
    pub visitors: i64,
}

/// Persisted user records
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Insert a user, failing on duplicate email or external identifier
    async fn insert_user(&self, user: NewUser) -> Result<User, UserRepositoryError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, UserRepositoryError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, UserRepositoryError>;

    async fn find_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<User>, UserRepositoryError>;

    async fn find_by_qr_token(&self, token: &str) -> Result<Option<User>, UserRepositoryError>;

    async fn find_by_reset_token(&self, token: &str)
    -> Result<Option<User>, UserRepositoryError>;

    /// Store `password_hash` and clear the reset token pair, but only if
    /// `token` is still pending and not expired at `now`.
    /// Returns false when another caller redeemed it first.
    async fn redeem_reset_token(
        &self,
        token: &str,
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, UserRepositoryError>;

    /// Replace the user's QR check-in token and its rendered image
    async fn set_qr_code(
        &self,
        id: Uuid,
        token: &str,
        image: &str,
        now: DateTime<Utc>,
    ) -> Result<(), UserRepositoryError>;

    async fn count(&self) -> Result<i64, UserRepositoryError>;
}

/// Persisted refresh tokens, keyed by the hash of the opaque value
#[async_trait]
pub trait RefreshTokenStore: Send + Sync {
    async fn insert_token(
        &self,
        token: NewRefreshToken,
    ) -> Result<RefreshToken, RefreshTokenRepositoryError>;

    /// Atomically remove and return the record for `token_hash`
    async fn take_by_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<RefreshToken>, RefreshTokenRepositoryError>;

    async fn delete_all_for_user(&self, user_id: Uuid) -> Result<u64, RefreshTokenRepositoryError>;

    /// Delete every record with `expires_at <= now`
    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, RefreshTokenRepositoryError>;

    async fn count_for_user(&self, user_id: Uuid) -> Result<i64, RefreshTokenRepositoryError>;
}

/// Persisted attendance records
#[async_trait]
pub trait AttendanceStore: Send + Sync {
    /// Find the user's record with `start <= checked_in_at < end`
    async fn find_in_window(
        &self,
        user_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Option<Attendance>, AttendanceRepositoryError>;

    /// Insert unless a record for `(user_id, service_date)` exists.
    /// Returns `None` when the slot was already taken.
    async fn insert_once(
        &self,
        record: NewAttendance,
    ) -> Result<Option<Attendance>, AttendanceRepositoryError>;

    /// Per-day totals for `from..=to`, newest day first, with member/visitor
    /// counts taken from the users' current flags
    async fn daily_summaries(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<DailyAttendance>, AttendanceRepositoryError>;

    async fn day_counts(&self, day: NaiveDate) -> Result<DayCounts, AttendanceRepositoryError>;
}

/// Bundle of store handles passed to the services
#[derive(Clone)]
pub struct Stores {
    pub users: Arc<dyn UserStore>,
    pub refresh_tokens: Arc<dyn RefreshTokenStore>,
    pub attendance: Arc<dyn AttendanceStore>,
}

impl Stores {
    /// Use one value for all three collections
    pub fn from_single<S>(store: Arc<S>) -> Self
    where
        S: UserStore + RefreshTokenStore + AttendanceStore + 'static,
    {
        Self {
            users: store.clone(),
            refresh_tokens: store.clone(),
            attendance: store,
        }
    }
}
