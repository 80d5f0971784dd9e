//! Refresh token ledger
//!
//! Issues opaque refresh tokens, persists their SHA-256 hashes with an expiry,
//! and consumes them exactly once. Consumption removes the record in the same
//! store operation that reads it, so a token can be redeemed by at most one
//! caller even under concurrent refreshes.

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::core::auth::password::{generate_token, hash_token};
use crate::core::clock::SharedClock;
use crate::core::db::models::NewRefreshToken;
use crate::core::db::repositories::RefreshTokenRepositoryError;
use crate::core::db::store::RefreshTokenStore;

/// Shortest interval accepted by [`RefreshTokenLedger::spawn_sweeper`]
pub const MIN_SWEEP_INTERVAL: std::time::Duration = std::time::Duration::from_secs(1);

/// Ledger error types
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("Refresh token not found")]
    NotFound,

    #[error("Refresh token expired")]
    Expired,

    #[error("Refresh token store failed: {0}")]
    Store(#[from] RefreshTokenRepositoryError),
}

/// A freshly issued refresh token; `token` is the only plaintext copy
#[derive(Debug, Clone)]
pub struct IssuedRefreshToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Refresh token ledger
#[derive(Clone)]
pub struct RefreshTokenLedger {
    store: Arc<dyn RefreshTokenStore>,
    ttl: Duration,
    clock: SharedClock,
}

impl RefreshTokenLedger {
    pub fn new(store: Arc<dyn RefreshTokenStore>, ttl: Duration, clock: SharedClock) -> Self {
        Self { store, ttl, clock }
    }

    /// Issue a new refresh token for `user_id`
    pub async fn issue(&self, user_id: Uuid) -> Result<IssuedRefreshToken, LedgerError> {
        let now = self.clock.now();
        let token = generate_token();
        let expires_at = now + self.ttl;

        self.store
            .insert_token(NewRefreshToken {
                user_id,
                token_hash: hash_token(&token),
                expires_at,
                created_at: now,
            })
            .await?;

        Ok(IssuedRefreshToken { token, expires_at })
    }

    /// Redeem `token`, returning its owner. The record is gone afterwards
    /// whether or not it had expired.
    pub async fn consume(&self, token: &str) -> Result<Uuid, LedgerError> {
        let record = self
            .store
            .take_by_hash(&hash_token(token))
            .await?
            .ok_or(LedgerError::NotFound)?;

        if record.is_expired_at(self.clock.now()) {
            return Err(LedgerError::Expired);
        }

        Ok(record.user_id)
    }

    /// Delete every refresh token owned by `user_id`
    pub async fn revoke_all(&self, user_id: Uuid) -> Result<u64, LedgerError> {
        Ok(self.store.delete_all_for_user(user_id).await?)
    }

    /// Delete all tokens past expiry
    pub async fn sweep_expired(&self) -> Result<u64, LedgerError> {
        Ok(self.store.delete_expired(self.clock.now()).await?)
    }

    /// Run [`Self::sweep_expired`] every `every` on a background task.
    ///
    /// Intervals shorter than [`MIN_SWEEP_INTERVAL`] are raised to it.
    pub fn spawn_sweeper(self, every: std::time::Duration) -> JoinHandle<()> {
        let every = if every < MIN_SWEEP_INTERVAL {
            tracing::warn!(
                "Refresh token sweep interval {:?} too short, using {:?}",
                every,
                MIN_SWEEP_INTERVAL
            );
            MIN_SWEEP_INTERVAL
        } else {
            every
        };

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);

            loop {
                interval.tick().await;

                match self.sweep_expired().await {
                    Ok(0) => tracing::debug!("Refresh token sweep: nothing expired"),
                    Ok(count) => tracing::info!("Refresh token sweep removed {} tokens", count),
                    Err(e) => tracing::error!("Refresh token sweep failed: {}", e),
                }
            }
        })
    }
}
