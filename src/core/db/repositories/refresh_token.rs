//! Refresh token repository
//!
//! Stores opaque refresh tokens as SHA-256 hashes. Consumption is a single
//! `DELETE ... RETURNING` so two concurrent refreshes with the same token
//! cannot both succeed.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::core::db::models::{NewRefreshToken, RefreshToken};
use crate::core::db::store::RefreshTokenStore;

/// Refresh token repository error types
#[derive(Debug, thiserror::Error)]
pub enum RefreshTokenRepositoryError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

/// Refresh token repository for database operations
#[derive(Clone)]
pub struct RefreshTokenRepository {
    pool: PgPool,
}

impl RefreshTokenRepository {
    /// Create a new refresh token repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RefreshTokenStore for RefreshTokenRepository {
    async fn insert_token(
        &self,
        token: NewRefreshToken,
    ) -> Result<RefreshToken, RefreshTokenRepositoryError> {
        let record = sqlx::query_as::<_, RefreshToken>(
            r#"
            INSERT INTO refresh_tokens (id, user_id, token_hash, expires_at, created_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, user_id, token_hash, expires_at, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(token.user_id)
        .bind(&token.token_hash)
        .bind(token.expires_at)
        .bind(token.created_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(record)
    }

    async fn take_by_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<RefreshToken>, RefreshTokenRepositoryError> {
        let record = sqlx::query_as::<_, RefreshToken>(
            r#"
            DELETE FROM refresh_tokens
            WHERE token_hash = $1
            RETURNING id, user_id, token_hash, expires_at, created_at
            "#,
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn delete_all_for_user(&self, user_id: Uuid) -> Result<u64, RefreshTokenRepositoryError> {
        let result = sqlx::query(
            r#"
            DELETE FROM refresh_tokens
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, RefreshTokenRepositoryError> {
        let result = sqlx::query(
            r#"
            DELETE FROM refresh_tokens
            WHERE expires_at <= $1
            "#,
        )
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn count_for_user(&self, user_id: Uuid) -> Result<i64, RefreshTokenRepositoryError> {
        let count: (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM refresh_tokens
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count.0)
    }
}
