//! In-memory store
//!
//! Implements every store trait without a database. Used by the test suites
//! and when the server starts without `DATABASE_URL`. Conditional writes use
//! the same single-step guarantees as the SQL statements: refresh tokens are
//! taken with `DashMap::remove`, attendance slots are claimed through
//! `DashMap::entry`.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::models::{
    Attendance, DailyAttendance, NewAttendance, NewRefreshToken, NewUser, RefreshToken, User,
};
use super::repositories::{
    AttendanceRepositoryError, RefreshTokenRepositoryError, UserRepositoryError,
};
use super::store::{AttendanceStore, DayCounts, RefreshTokenStore, UserStore};

/// Process-local implementation of all store traits
#[derive(Default)]
pub struct MemoryStore {
    users: RwLock<HashMap<Uuid, User>>,
    refresh_tokens: DashMap<String, RefreshToken>,
    attendance: DashMap<(Uuid, NaiveDate), Attendance>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn find_user<F>(&self, predicate: F) -> Option<User>
    where
        F: Fn(&User) -> bool,
    {
        let users = self.users.read().await;
        users.values().find(|u| predicate(u)).cloned()
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn insert_user(&self, user: NewUser) -> Result<User, UserRepositoryError> {
        let mut users = self.users.write().await;

        if users.values().any(|u| u.email == user.email) {
            return Err(UserRepositoryError::EmailAlreadyExists);
        }
        if users.values().any(|u| u.external_id == user.external_id) {
            return Err(UserRepositoryError::ExternalIdAlreadyExists);
        }

        let (reset_token, reset_expires_at) = match user.password_reset {
            Some(reset) => (Some(reset.token), Some(reset.expires_at)),
            None => (None, None),
        };

        let record = User {
            id: Uuid::new_v4(),
            external_id: user.external_id,
            email: user.email,
            password_hash: user.password_hash,
            profile: user.profile,
            roles: user.roles,
            qr_code_token: None,
            qr_code_image: None,
            password_reset_token: reset_token,
            password_reset_expires_at: reset_expires_at,
            created_at: user.created_at,
            updated_at: user.created_at,
        };
        users.insert(record.id, record.clone());

        Ok(record)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, UserRepositoryError> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, UserRepositoryError> {
        Ok(self.find_user(|u| u.email == email).await)
    }

    async fn find_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<User>, UserRepositoryError> {
        Ok(self.find_user(|u| u.external_id == external_id).await)
    }

    async fn find_by_qr_token(&self, token: &str) -> Result<Option<User>, UserRepositoryError> {
        Ok(self
            .find_user(|u| u.qr_code_token.as_deref() == Some(token))
            .await)
    }

    async fn find_by_reset_token(
        &self,
        token: &str,
    ) -> Result<Option<User>, UserRepositoryError> {
        Ok(self
            .find_user(|u| u.password_reset_token.as_deref() == Some(token))
            .await)
    }

    async fn redeem_reset_token(
        &self,
        token: &str,
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, UserRepositoryError> {
        let mut users = self.users.write().await;

        let pending = users.values_mut().find(|u| {
            u.password_reset_token.as_deref() == Some(token)
                && u.password_reset_expires_at.is_some_and(|exp| exp >= now)
        });

        match pending {
            Some(user) => {
                user.password_hash = Some(password_hash.to_string());
                user.password_reset_token = None;
                user.password_reset_expires_at = None;
                user.updated_at = now;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn set_qr_code(
        &self,
        id: Uuid,
        token: &str,
        image: &str,
        now: DateTime<Utc>,
    ) -> Result<(), UserRepositoryError> {
        let mut users = self.users.write().await;
        let user = users.get_mut(&id).ok_or(UserRepositoryError::NotFound)?;
        user.qr_code_token = Some(token.to_string());
        user.qr_code_image = Some(image.to_string());
        user.updated_at = now;
        Ok(())
    }

    async fn count(&self) -> Result<i64, UserRepositoryError> {
        Ok(self.users.read().await.len() as i64)
    }
}

#[async_trait]
impl RefreshTokenStore for MemoryStore {
    async fn insert_token(
        &self,
        token: NewRefreshToken,
    ) -> Result<RefreshToken, RefreshTokenRepositoryError> {
        let record = RefreshToken {
            id: Uuid::new_v4(),
            user_id: token.user_id,
            token_hash: token.token_hash,
            expires_at: token.expires_at,
            created_at: token.created_at,
        };
        self.refresh_tokens
            .insert(record.token_hash.clone(), record.clone());
        Ok(record)
    }

    async fn take_by_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<RefreshToken>, RefreshTokenRepositoryError> {
        Ok(self
            .refresh_tokens
            .remove(token_hash)
            .map(|(_, record)| record))
    }

    async fn delete_all_for_user(&self, user_id: Uuid) -> Result<u64, RefreshTokenRepositoryError> {
        let before = self.refresh_tokens.len();
        self.refresh_tokens
            .retain(|_, record| record.user_id != user_id);
        Ok(before.saturating_sub(self.refresh_tokens.len()) as u64)
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, RefreshTokenRepositoryError> {
        let before = self.refresh_tokens.len();
        self.refresh_tokens
            .retain(|_, record| !record.is_expired_at(now));
        Ok(before.saturating_sub(self.refresh_tokens.len()) as u64)
    }

    async fn count_for_user(&self, user_id: Uuid) -> Result<i64, RefreshTokenRepositoryError> {
        Ok(self
            .refresh_tokens
            .iter()
            .filter(|entry| entry.value().user_id == user_id)
            .count() as i64)
    }
}

#[async_trait]
impl AttendanceStore for MemoryStore {
    async fn find_in_window(
        &self,
        user_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Option<Attendance>, AttendanceRepositoryError> {
        Ok(self
            .attendance
            .iter()
            .find(|entry| {
                let record = entry.value();
                record.user_id == user_id
                    && record.checked_in_at >= start
                    && record.checked_in_at < end
            })
            .map(|entry| entry.value().clone()))
    }

    async fn insert_once(
        &self,
        record: NewAttendance,
    ) -> Result<Option<Attendance>, AttendanceRepositoryError> {
        match self.attendance.entry((record.user_id, record.service_date)) {
            Entry::Occupied(_) => Ok(None),
            Entry::Vacant(slot) => {
                let stored = Attendance {
                    id: Uuid::new_v4(),
                    user_id: record.user_id,
                    checked_in_at: record.checked_in_at,
                    service_date: record.service_date,
                    qr_based: record.qr_based,
                    manual: record.manual,
                    late: record.late,
                    visitor: record.visitor,
                    member: record.member,
                };
                slot.insert(stored.clone());
                Ok(Some(stored))
            }
        }
    }

    async fn daily_summaries(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<DailyAttendance>, AttendanceRepositoryError> {
        let users = self.users.read().await;
        let mut days: BTreeMap<NaiveDate, DailyAttendance> = BTreeMap::new();

        for entry in self.attendance.iter() {
            let record = entry.value();
            if record.service_date < from || record.service_date > to {
                continue;
            }
            // Inner join: records of deleted users do not count
            let Some(user) = users.get(&record.user_id) else {
                continue;
            };

            let day = days
                .entry(record.service_date)
                .or_insert_with(|| DailyAttendance {
                    date: record.service_date,
                    members: 0,
                    visitors: 0,
                    total_attendance: 0,
                });
            day.total_attendance += 1;
            if user.roles.is_member {
                day.members += 1;
            }
            if user.roles.is_visitor {
                day.visitors += 1;
            }
        }

        Ok(days.into_values().rev().collect())
    }

    async fn day_counts(&self, day: NaiveDate) -> Result<DayCounts, AttendanceRepositoryError> {
        let summary = self.daily_summaries(day, day).await?;
        Ok(summary
            .first()
            .map(|d| DayCounts {
                total: d.total_attendance,
                members: d.members,
                visitors: d.visitors,
            })
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::db::models::{PasswordReset, RoleFlags, UserProfile};
    use chrono::{Duration, TimeZone};
    use std::sync::Arc;

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, day, hour, 0, 0).unwrap()
    }

    fn new_user(external_id: &str, email: &str, roles: RoleFlags) -> NewUser {
        NewUser {
            external_id: external_id.to_string(),
            email: email.to_string(),
            password_hash: None,
            profile: UserProfile::default(),
            roles,
            password_reset: None,
            created_at: at(1, 8),
        }
    }

    fn member() -> RoleFlags {
        RoleFlags {
            is_member: true,
            ..Default::default()
        }
    }

    fn visitor() -> RoleFlags {
        RoleFlags {
            is_visitor: true,
            ..Default::default()
        }
    }

    fn attendance(user_id: Uuid, day: u32) -> NewAttendance {
        NewAttendance {
            user_id,
            checked_in_at: at(day, 8),
            service_date: at(day, 8).date_naive(),
            qr_based: false,
            manual: true,
            late: false,
            visitor: false,
            member: true,
        }
    }

    // ========================================================================
    // Users
    // ========================================================================

    #[tokio::test]
    async fn test_insert_user_rejects_duplicates() {
        let store = MemoryStore::new();
        store
            .insert_user(new_user("CCIMRB-00001", "a@x.com", member()))
            .await
            .unwrap();

        let dup_email = store
            .insert_user(new_user("CCIMRB-00002", "a@x.com", member()))
            .await;
        let dup_external = store
            .insert_user(new_user("CCIMRB-00001", "b@x.com", member()))
            .await;

        assert!(matches!(
            dup_email,
            Err(UserRepositoryError::EmailAlreadyExists)
        ));
        assert!(matches!(
            dup_external,
            Err(UserRepositoryError::ExternalIdAlreadyExists)
        ));
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_redeem_reset_token_single_use_and_expiry() {
        let store = MemoryStore::new();
        let mut dto = new_user("CCIMRB-00001", "a@x.com", member());
        dto.password_reset = Some(PasswordReset {
            token: "reset".to_string(),
            expires_at: at(2, 8),
        });
        let user = store.insert_user(dto).await.unwrap();

        // Expired
        assert!(
            !store
                .redeem_reset_token("reset", "h", at(2, 8) + Duration::seconds(1))
                .await
                .unwrap()
        );
        // Valid exactly at expiry, then gone
        assert!(store.redeem_reset_token("reset", "h", at(2, 8)).await.unwrap());
        assert!(!store.redeem_reset_token("reset", "h", at(2, 8)).await.unwrap());

        let reloaded = store.find_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(reloaded.password_hash.as_deref(), Some("h"));
        assert!(reloaded.password_reset_token.is_none());
        assert!(reloaded.password_reset_expires_at.is_none());
    }

    #[tokio::test]
    async fn test_set_qr_code_replaces_previous() {
        let store = MemoryStore::new();
        let user = store
            .insert_user(new_user("CCIMRB-00001", "a@x.com", member()))
            .await
            .unwrap();

        store
            .set_qr_code(user.id, "first", "img-1", at(1, 9))
            .await
            .unwrap();
        store
            .set_qr_code(user.id, "second", "img-2", at(1, 10))
            .await
            .unwrap();

        assert!(store.find_by_qr_token("first").await.unwrap().is_none());
        let owner = store.find_by_qr_token("second").await.unwrap().unwrap();
        assert_eq!(owner.id, user.id);
        assert_eq!(owner.qr_code_image.as_deref(), Some("img-2"));

        let missing = store
            .set_qr_code(Uuid::new_v4(), "x", "img", at(1, 10))
            .await;
        assert!(matches!(missing, Err(UserRepositoryError::NotFound)));
    }

    // ========================================================================
    // Refresh tokens
    // ========================================================================

    #[tokio::test]
    async fn test_take_by_hash_is_single_use() {
        let store = MemoryStore::new();
        let user_id = Uuid::new_v4();
        store
            .insert_token(NewRefreshToken {
                user_id,
                token_hash: "h1".to_string(),
                expires_at: at(8, 8),
                created_at: at(1, 8),
            })
            .await
            .unwrap();

        assert!(store.take_by_hash("h1").await.unwrap().is_some());
        assert!(store.take_by_hash("h1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_expired_and_all_for_user() {
        let store = MemoryStore::new();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        for (user_id, hash, expires_at) in [
            (alice, "a1", at(2, 8)),
            (alice, "a2", at(9, 8)),
            (bob, "b1", at(9, 8)),
        ] {
            store
                .insert_token(NewRefreshToken {
                    user_id,
                    token_hash: hash.to_string(),
                    expires_at,
                    created_at: at(1, 8),
                })
                .await
                .unwrap();
        }

        assert_eq!(store.delete_expired(at(2, 8)).await.unwrap(), 1);
        assert_eq!(store.count_for_user(alice).await.unwrap(), 1);
        assert_eq!(store.delete_all_for_user(alice).await.unwrap(), 1);
        assert_eq!(store.count_for_user(bob).await.unwrap(), 1);
    }

    // ========================================================================
    // Attendance
    // ========================================================================

    #[tokio::test]
    async fn test_insert_once_concurrent_single_winner() {
        let store = Arc::new(MemoryStore::new());
        let user_id = Uuid::new_v4();

        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.insert_once(attendance(user_id, 1)).await.unwrap()
            }));
        }

        let mut wins = 0;
        for handle in handles {
            if handle.await.unwrap().is_some() {
                wins += 1;
            }
        }
        assert_eq!(wins, 1);
    }

    #[tokio::test]
    async fn test_daily_summaries_use_current_flags_newest_first() {
        let store = MemoryStore::new();
        let m = store
            .insert_user(new_user("CCIMRB-00001", "m@x.com", member()))
            .await
            .unwrap();
        let v = store
            .insert_user(new_user("CCIMRB-00002", "v@x.com", visitor()))
            .await
            .unwrap();

        store.insert_once(attendance(m.id, 1)).await.unwrap();
        store.insert_once(attendance(m.id, 2)).await.unwrap();
        store.insert_once(attendance(v.id, 2)).await.unwrap();
        store.insert_once(attendance(v.id, 5)).await.unwrap();

        let days = store
            .daily_summaries(at(1, 0).date_naive(), at(3, 0).date_naive())
            .await
            .unwrap();

        assert_eq!(days.len(), 2);
        assert_eq!(days[0].date, at(2, 0).date_naive());
        assert_eq!(days[0].members, 1);
        assert_eq!(days[0].visitors, 1);
        assert_eq!(days[0].total_attendance, 2);
        assert_eq!(days[1].date, at(1, 0).date_naive());

        let counts = store.day_counts(at(5, 0).date_naive()).await.unwrap();
        assert_eq!(
            counts,
            DayCounts {
                total: 1,
                members: 0,
                visitors: 1
            }
        );
    }
}
