//! Database models for the membership portal
//!
//! This module defines the database entity structs that map to PostgreSQL tables.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

// ============================================================================
// User Model
// ============================================================================

/// Descriptive member fields collected at full registration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, FromRow)]
#[serde(default)]
pub struct UserProfile {
    pub first_name: String,
    pub last_name: String,
    pub bio: String,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: String,
    pub work_department: String,
    pub date_joined_church: Option<NaiveDate>,
    pub campus: String,
    pub campus_state: String,
    pub campus_country: String,
    pub profession: String,
    pub house_address: String,
    pub phone_number: String,
    pub instagram_handle: String,
    pub emergency_contact_name: String,
    pub emergency_contact_phone: String,
    pub emergency_contact_email: String,
    pub emergency_contact_relationship: String,
}

/// Role flags carried on every user
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, FromRow)]
#[serde(default)]
pub struct RoleFlags {
    pub is_member: bool,
    pub is_visitor: bool,
    pub is_usher: bool,
    pub is_admin: bool,
    pub is_family_head: bool,
}

/// User entity representing a registered member or visitor
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub external_id: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub profile: UserProfile,
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub roles: RoleFlags,
    #[serde(skip_serializing)]
    pub qr_code_token: Option<String>,
    /// Base64 PNG rendering of `qr_code_token`
    #[serde(skip_serializing)]
    pub qr_code_image: Option<String>,
    #[serde(skip_serializing)]
    pub password_reset_token: Option<String>,
    #[serde(skip_serializing)]
    pub password_reset_expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Pending password-set token; the token and its expiry are always written together
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordReset {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// User data for creation (without id)
#[derive(Debug, Clone)]
pub struct NewUser {
    pub external_id: String,
    pub email: String,
    pub password_hash: Option<String>,
    pub profile: UserProfile,
    pub roles: RoleFlags,
    pub password_reset: Option<PasswordReset>,
    pub created_at: DateTime<Utc>,
}

/// User without sensitive data (for API responses)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserResponse {
    pub user_id: String,
    pub email: String,
    #[serde(flatten)]
    pub profile: UserProfile,
    #[serde(flatten)]
    pub roles: RoleFlags,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            user_id: user.external_id,
            email: user.email,
            profile: user.profile,
            roles: user.roles,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

/// Short identity block returned with login tokens
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    pub user_id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.external_id.clone(),
            first_name: user.profile.first_name.clone(),
            last_name: user.profile.last_name.clone(),
            email: user.email.clone(),
        }
    }
}

// ============================================================================
// Refresh Token Model
// ============================================================================

/// Persisted refresh token; only the SHA-256 hash of the opaque value is stored
#[derive(Debug, Clone, FromRow)]
pub struct RefreshToken {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl RefreshToken {
    /// Whether the token is past its expiry at `now`
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Refresh token data for creation
#[derive(Debug, Clone)]
pub struct NewRefreshToken {
    pub user_id: Uuid,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// Attendance Model
// ============================================================================

/// One check-in of one user on one local service day
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct Attendance {
    pub id: Uuid,
    pub user_id: Uuid,
    pub checked_in_at: DateTime<Utc>,
    pub service_date: NaiveDate,
    pub qr_based: bool,
    pub manual: bool,
    pub late: bool,
    pub visitor: bool,
    pub member: bool,
}

/// Attendance data for creation
#[derive(Debug, Clone)]
pub struct NewAttendance {
    pub user_id: Uuid,
    pub checked_in_at: DateTime<Utc>,
    pub service_date: NaiveDate,
    pub qr_based: bool,
    pub manual: bool,
    pub late: bool,
    pub visitor: bool,
    pub member: bool,
}

/// Per-day attendance totals
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct DailyAttendance {
    pub date: NaiveDate,
    pub members: i64,
    pub visitors: i64,
    pub total_attendance: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn sample_user() -> User {
        let now = Utc.with_ymd_and_hms(2025, 1, 5, 10, 0, 0).unwrap();
        User {
            id: Uuid::new_v4(),
            external_id: "CCIMRB-00042".to_string(),
            email: "ada@example.com".to_string(),
            password_hash: Some("$2b$04$hash".to_string()),
            profile: UserProfile {
                first_name: "Ada".to_string(),
                last_name: "Obi".to_string(),
                ..Default::default()
            },
            roles: RoleFlags {
                is_member: true,
                ..Default::default()
            },
            qr_code_token: Some("qr-secret".to_string()),
            qr_code_image: Some("iVBORw0KGgo".to_string()),
            password_reset_token: Some("reset-secret".to_string()),
            password_reset_expires_at: Some(now + Duration::hours(24)),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_user_serialization_hides_secrets() {
        let json = serde_json::to_string(&sample_user()).unwrap();

        assert!(!json.contains("password_hash"));
        assert!(!json.contains("$2b$04$hash"));
        assert!(!json.contains("qr-secret"));
        assert!(!json.contains("iVBORw0KGgo"));
        assert!(!json.contains("reset-secret"));
        assert!(json.contains("\"first_name\":\"Ada\""));
        assert!(json.contains("\"is_member\":true"));
    }

    #[test]
    fn test_user_response_from_user() {
        let user = sample_user();
        let response = UserResponse::from(user.clone());

        assert_eq!(response.user_id, "CCIMRB-00042");
        assert_eq!(response.email, user.email);
        assert_eq!(response.profile, user.profile);

        let json = serde_json::to_string(&response).unwrap();
        assert!(!json.contains("password"));
    }

    #[test]
    fn test_user_summary_from_user() {
        let summary = UserSummary::from(&sample_user());

        assert_eq!(
            summary,
            UserSummary {
                user_id: "CCIMRB-00042".to_string(),
                first_name: "Ada".to_string(),
                last_name: "Obi".to_string(),
                email: "ada@example.com".to_string(),
            }
        );
    }

    #[test]
    fn test_refresh_token_expiry_boundary() {
        let now = Utc.with_ymd_and_hms(2025, 1, 5, 10, 0, 0).unwrap();
        let token = RefreshToken {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            token_hash: "abc".to_string(),
            expires_at: now,
            created_at: now - Duration::days(7),
        };

        assert!(!token.is_expired_at(now - Duration::seconds(1)));
        assert!(token.is_expired_at(now));
    }

    #[test]
    fn test_profile_deserializes_with_missing_fields() {
        let profile: UserProfile =
            serde_json::from_str(r#"{"first_name":"Ada","date_of_birth":"1990-04-01"}"#).unwrap();

        assert_eq!(profile.first_name, "Ada");
        assert_eq!(profile.date_of_birth, NaiveDate::from_ymd_opt(1990, 4, 1));
        assert!(profile.last_name.is_empty());
    }
}
