//! User repository for database operations
//!
//! PostgreSQL implementation of [`UserStore`]. Password hashing lives in the
//! auth layer; this repository only ever sees finished hashes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::core::db::models::{NewUser, User};
use crate::core::db::store::UserStore;

/// Column list matching [`User`]'s `FromRow` layout
const USER_COLUMNS: &str = r#"
    id, external_id, email, password_hash,
    first_name, last_name, bio, date_of_birth, gender, work_department,
    date_joined_church, campus, campus_state, campus_country, profession,
    house_address, phone_number, instagram_handle,
    emergency_contact_name, emergency_contact_phone, emergency_contact_email,
    emergency_contact_relationship,
    is_member, is_visitor, is_usher, is_admin, is_family_head,
    qr_code_token, qr_code_image, password_reset_token, password_reset_expires_at,
    created_at, updated_at
"#;

/// User repository error types
#[derive(Debug, thiserror::Error)]
pub enum UserRepositoryError {
    #[error("User not found")]
    NotFound,

    #[error("Email already exists")]
    EmailAlreadyExists,

    #[error("External identifier already exists")]
    ExternalIdAlreadyExists,

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

/// Translate unique-constraint violations into domain errors
fn map_insert_error(err: sqlx::Error) -> UserRepositoryError {
    if let sqlx::Error::Database(db_err) = &err {
        match db_err.constraint() {
            Some("users_email_key") => return UserRepositoryError::EmailAlreadyExists,
            Some("users_external_id_key") => return UserRepositoryError::ExternalIdAlreadyExists,
            _ => {}
        }
    }
    UserRepositoryError::DatabaseError(err)
}

/// User repository for database operations
#[derive(Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    /// Create a new user repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn find_one_by(
        &self,
        column: &str,
        value: &str,
    ) -> Result<Option<User>, UserRepositoryError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE {column} = $1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(value)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }
}

#[async_trait]
impl UserStore for UserRepository {
    async fn insert_user(&self, user: NewUser) -> Result<User, UserRepositoryError> {
        // Check if email already exists
        if self.find_by_email(&user.email).await?.is_some() {
            return Err(UserRepositoryError::EmailAlreadyExists);
        }

        let (reset_token, reset_expires_at) = match &user.password_reset {
            Some(reset) => (Some(reset.token.as_str()), Some(reset.expires_at)),
            None => (None, None),
        };
        let profile = &user.profile;
        let roles = &user.roles;

        let sql = format!(
            r#"
            INSERT INTO users (
                id, external_id, email, password_hash,
                first_name, last_name, bio, date_of_birth, gender, work_department,
                date_joined_church, campus, campus_state, campus_country, profession,
                house_address, phone_number, instagram_handle,
                emergency_contact_name, emergency_contact_phone, emergency_contact_email,
                emergency_contact_relationship,
                is_member, is_visitor, is_usher, is_admin, is_family_head,
                password_reset_token, password_reset_expires_at,
                created_at, updated_at
            )
            VALUES (
                $1, $2, $3, $4,
                $5, $6, $7, $8, $9, $10,
                $11, $12, $13, $14, $15,
                $16, $17, $18,
                $19, $20, $21,
                $22,
                $23, $24, $25, $26, $27,
                $28, $29,
                $30, $30
            )
            RETURNING {USER_COLUMNS}
            "#
        );

        sqlx::query_as::<_, User>(&sql)
            .bind(Uuid::new_v4())
            .bind(&user.external_id)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(&profile.first_name)
            .bind(&profile.last_name)
            .bind(&profile.bio)
            .bind(profile.date_of_birth)
            .bind(&profile.gender)
            .bind(&profile.work_department)
            .bind(profile.date_joined_church)
            .bind(&profile.campus)
            .bind(&profile.campus_state)
            .bind(&profile.campus_country)
            .bind(&profile.profession)
            .bind(&profile.house_address)
            .bind(&profile.phone_number)
            .bind(&profile.instagram_handle)
            .bind(&profile.emergency_contact_name)
            .bind(&profile.emergency_contact_phone)
            .bind(&profile.emergency_contact_email)
            .bind(&profile.emergency_contact_relationship)
            .bind(roles.is_member)
            .bind(roles.is_visitor)
            .bind(roles.is_usher)
            .bind(roles.is_admin)
            .bind(roles.is_family_head)
            .bind(reset_token)
            .bind(reset_expires_at)
            .bind(user.created_at)
            .fetch_one(&self.pool)
            .await
            .map_err(map_insert_error)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, UserRepositoryError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, UserRepositoryError> {
        self.find_one_by("email", email).await
    }

    async fn find_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<User>, UserRepositoryError> {
        self.find_one_by("external_id", external_id).await
    }

    async fn find_by_qr_token(&self, token: &str) -> Result<Option<User>, UserRepositoryError> {
        self.find_one_by("qr_code_token", token).await
    }

    async fn find_by_reset_token(
        &self,
        token: &str,
    ) -> Result<Option<User>, UserRepositoryError> {
        self.find_one_by("password_reset_token", token).await
    }

    async fn redeem_reset_token(
        &self,
        token: &str,
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, UserRepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET password_hash = $2,
                password_reset_token = NULL,
                password_reset_expires_at = NULL,
                updated_at = $3
            WHERE password_reset_token = $1
              AND password_reset_expires_at >= $3
            "#,
        )
        .bind(token)
        .bind(password_hash)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn set_qr_code(
        &self,
        id: Uuid,
        token: &str,
        image: &str,
        now: DateTime<Utc>,
    ) -> Result<(), UserRepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET qr_code_token = $2, qr_code_image = $3, updated_at = $4
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(token)
        .bind(image)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(UserRepositoryError::NotFound);
        }

        Ok(())
    }

    async fn count(&self) -> Result<i64, UserRepositoryError> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;

        Ok(count.0)
    }
}
