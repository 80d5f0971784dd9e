//! Attendance repository
//!
//! One row per user per local service day, guarded by the
//! `attendance_user_day_key` unique constraint.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::core::db::models::{Attendance, DailyAttendance, NewAttendance};
use crate::core::db::store::{AttendanceStore, DayCounts};

/// Attendance repository error types
#[derive(Debug, thiserror::Error)]
pub enum AttendanceRepositoryError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

/// Attendance repository for database operations
#[derive(Clone)]
pub struct AttendanceRepository {
    pool: PgPool,
}

impl AttendanceRepository {
    /// Create a new attendance repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AttendanceStore for AttendanceRepository {
    async fn find_in_window(
        &self,
        user_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Option<Attendance>, AttendanceRepositoryError> {
        let record = sqlx::query_as::<_, Attendance>(
            r#"
            SELECT id, user_id, checked_in_at, service_date, qr_based, manual, late, visitor, member
            FROM attendance
            WHERE user_id = $1 AND checked_in_at >= $2 AND checked_in_at < $3
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .bind(start)
        .bind(end)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn insert_once(
        &self,
        record: NewAttendance,
    ) -> Result<Option<Attendance>, AttendanceRepositoryError> {
        let inserted = sqlx::query_as::<_, Attendance>(
            r#"
            INSERT INTO attendance
                (id, user_id, checked_in_at, service_date, qr_based, manual, late, visitor, member)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (user_id, service_date) DO NOTHING
            RETURNING id, user_id, checked_in_at, service_date, qr_based, manual, late, visitor, member
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(record.user_id)
        .bind(record.checked_in_at)
        .bind(record.service_date)
        .bind(record.qr_based)
        .bind(record.manual)
        .bind(record.late)
        .bind(record.visitor)
        .bind(record.member)
        .fetch_optional(&self.pool)
        .await?;

        Ok(inserted)
    }

    async fn daily_summaries(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<DailyAttendance>, AttendanceRepositoryError> {
        let rows = sqlx::query_as::<_, DailyAttendance>(
            r#"
            SELECT
                a.service_date AS "date",
                COUNT(*) FILTER (WHERE u.is_member) AS members,
                COUNT(*) FILTER (WHERE u.is_visitor) AS visitors,
                COUNT(*) AS total_attendance
            FROM attendance a
            JOIN users u ON u.id = a.user_id
            WHERE a.service_date BETWEEN $1 AND $2
            GROUP BY a.service_date
            ORDER BY a.service_date DESC
            "#,
        )
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn day_counts(&self, day: NaiveDate) -> Result<DayCounts, AttendanceRepositoryError> {
        let (total, members, visitors): (i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT
                COUNT(*),
                COUNT(*) FILTER (WHERE u.is_member),
                COUNT(*) FILTER (WHERE u.is_visitor)
            FROM attendance a
            JOIN users u ON u.id = a.user_id
            WHERE a.service_date = $1
            "#,
        )
        .bind(day)
        .fetch_one(&self.pool)
        .await?;

        Ok(DayCounts {
            total,
            members,
            visitors,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attendance_repository_error_display() {
        let err = AttendanceRepositoryError::from(sqlx::Error::RowNotFound);
        assert!(format!("{}", err).starts_with("Database error"));
    }

    // ========================================================================
    // Integration Tests (require database)
    // ========================================================================

    fn record(user_id: Uuid, day: NaiveDate, at: DateTime<Utc>) -> NewAttendance {
        NewAttendance {
            user_id,
            checked_in_at: at,
            service_date: day,
            qr_based: false,
            manual: true,
            late: false,
            visitor: false,
            member: true,
        }
    }

    #[tokio::test]
    #[ignore = "requires running PostgreSQL database"]
    async fn test_insert_once_rejects_second_row_for_day() {
        let (pool, user_id) = setup_test_user().await;
        let repo = AttendanceRepository::new(pool.clone());

        let now = Utc::now();
        let day = now.date_naive();

        let first = repo.insert_once(record(user_id, day, now)).await.unwrap();
        let second = repo.insert_once(record(user_id, day, now)).await.unwrap();
        assert!(first.is_some());
        assert!(second.is_none());

        let counts = repo.day_counts(day).await.unwrap();
        assert!(counts.total >= 1);

        // Cleanup
        cleanup_test_user(&pool, user_id).await;
    }

    #[tokio::test]
    #[ignore = "requires running PostgreSQL database"]
    async fn test_find_in_window() {
        let (pool, user_id) = setup_test_user().await;
        let repo = AttendanceRepository::new(pool.clone());

        let now = Utc::now();
        repo.insert_once(record(user_id, now.date_naive(), now))
            .await
            .unwrap();

        let hit = repo
            .find_in_window(user_id, now - chrono::Duration::hours(1), now + chrono::Duration::hours(1))
            .await
            .unwrap();
        let miss = repo
            .find_in_window(user_id, now + chrono::Duration::hours(1), now + chrono::Duration::hours(2))
            .await
            .unwrap();
        assert!(hit.is_some());
        assert!(miss.is_none());

        // Cleanup
        cleanup_test_user(&pool, user_id).await;
    }

    // Helper functions for integration tests
    async fn setup_test_user() -> (PgPool, Uuid) {
        use crate::core::db::pool::{DbConfig, create_pool_with_migrations};

        let config = DbConfig::from_env().expect("DATABASE_URL must be set for tests");
        let pool = create_pool_with_migrations(&config)
            .await
            .expect("Failed to create test pool");

        let user_id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO users (id, external_id, email, is_member)
            VALUES ($1, $2, $3, TRUE)
            "#,
        )
        .bind(user_id)
        .bind(format!("TEST-{}", &user_id.simple().to_string()[..8]))
        .bind(format!("attendance_test_{}@example.com", user_id))
        .execute(&pool)
        .await
        .expect("Failed to create test user");

        (pool, user_id)
    }

    async fn cleanup_test_user(pool: &PgPool, user_id: Uuid) {
        sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(user_id)
            .execute(pool)
            .await
            .expect("Failed to cleanup test user");
    }
}
