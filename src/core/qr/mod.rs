//! QR check-in codes
//!
//! Each member can hold one QR token. Generating a new code replaces the
//! stored token and its rendered image, so previously printed codes stop
//! working. The current code can be fetched again without rotating it.

pub mod api;
pub mod render;

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::core::auth::password::generate_token;
use crate::core::clock::SharedClock;
use crate::core::db::repositories::UserRepositoryError;
use crate::core::db::store::UserStore;
use crate::core::error::{Classify, ErrorKind};

pub use api::{QrApiState, qr_api_router};
pub use render::{DEFAULT_QR_CODE_SIZE, QrRenderer};

/// QR service error types
#[derive(Debug, thiserror::Error)]
pub enum QrError {
    #[error("User not found")]
    UserNotFound,

    #[error("No QR code has been generated for this user")]
    NoQrCode,

    #[error("QR code rendering failed: {0}")]
    Render(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<UserRepositoryError> for QrError {
    fn from(err: UserRepositoryError) -> Self {
        match err {
            UserRepositoryError::NotFound => QrError::UserNotFound,
            _ => QrError::Internal(format!("user store: {}", err)),
        }
    }
}

impl Classify for QrError {
    fn kind(&self) -> ErrorKind {
        match self {
            QrError::UserNotFound | QrError::NoQrCode => ErrorKind::NotFound,
            QrError::Render(_) | QrError::Internal(_) => ErrorKind::Internal,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            QrError::UserNotFound => "USER_NOT_FOUND",
            QrError::NoQrCode => "QR_CODE_NOT_FOUND",
            QrError::Render(_) | QrError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

/// Request body for QR generation
#[derive(Debug, Clone, Deserialize)]
pub struct GenerateQrRequest {
    pub user_id: String,
}

/// A member's QR code
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QrCodeResponse {
    pub qr_code_token: String,
    /// Base64-encoded PNG
    pub qr_code_image: String,
}

/// QR service
#[derive(Clone)]
pub struct QrService {
    users: Arc<dyn UserStore>,
    renderer: QrRenderer,
    clock: SharedClock,
}

impl QrService {
    pub fn new(users: Arc<dyn UserStore>, renderer: QrRenderer, clock: SharedClock) -> Self {
        Self {
            users,
            renderer,
            clock,
        }
    }

    /// Issue a new QR token for the member with external identifier `user_id`
    pub async fn generate(&self, user_id: &str) -> Result<QrCodeResponse, QrError> {
        let user = self
            .users
            .find_by_external_id(user_id.trim())
            .await?
            .ok_or(QrError::UserNotFound)?;

        let token = generate_token();
        // Render before storing so a failed render leaves the old code valid
        let image = self.renderer.render(&token)?;

        self.users
            .set_qr_code(user.id, &token, &image, self.clock.now())
            .await?;

        tracing::info!("QR code generated for {}", user.external_id);

        Ok(QrCodeResponse {
            qr_code_token: token,
            qr_code_image: image,
        })
    }

    /// The stored QR code of the member with external identifier `user_id`
    pub async fn current(&self, user_id: &str) -> Result<QrCodeResponse, QrError> {
        let user = self
            .users
            .find_by_external_id(user_id.trim())
            .await?
            .ok_or(QrError::UserNotFound)?;

        match (user.qr_code_token, user.qr_code_image) {
            (Some(token), Some(image)) => Ok(QrCodeResponse {
                qr_code_token: token,
                qr_code_image: image,
            }),
            _ => Err(QrError::NoQrCode),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::clock::SystemClock;
    use crate::core::db::MemoryStore;
    use crate::core::db::models::{NewUser, RoleFlags, UserProfile};
    use chrono::Utc;

    async fn setup() -> (QrService, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        store
            .insert_user(NewUser {
                external_id: "CCIMRB-00001".to_string(),
                email: "a@x.com".to_string(),
                password_hash: None,
                profile: UserProfile::default(),
                roles: RoleFlags::default(),
                password_reset: None,
                created_at: Utc::now(),
            })
            .await
            .unwrap();

        let service = QrService::new(store.clone(), QrRenderer::new(128), Arc::new(SystemClock));
        (service, store)
    }

    #[tokio::test]
    async fn test_generate_stores_token() {
        let (service, store) = setup().await;

        let response = service.generate("CCIMRB-00001").await.unwrap();

        assert_eq!(response.qr_code_token.len(), 43);
        assert!(!response.qr_code_image.is_empty());

        let owner = store
            .find_by_qr_token(&response.qr_code_token)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(owner.external_id, "CCIMRB-00001");
    }

    #[tokio::test]
    async fn test_regenerate_invalidates_previous_token() {
        let (service, store) = setup().await;

        let first = service.generate("CCIMRB-00001").await.unwrap();
        let second = service.generate("CCIMRB-00001").await.unwrap();

        assert_ne!(first.qr_code_token, second.qr_code_token);
        assert!(
            store
                .find_by_qr_token(&first.qr_code_token)
                .await
                .unwrap()
                .is_none()
        );
        assert!(
            store
                .find_by_qr_token(&second.qr_code_token)
                .await
                .unwrap()
                .is_some()
        );
    }

    #[tokio::test]
    async fn test_current_returns_latest_generated_code() {
        let (service, store) = setup().await;

        assert!(matches!(
            service.current("CCIMRB-00001").await,
            Err(QrError::NoQrCode)
        ));

        service.generate("CCIMRB-00001").await.unwrap();
        let latest = service.generate("CCIMRB-00001").await.unwrap();

        let current = service.current("CCIMRB-00001").await.unwrap();
        assert_eq!(current.qr_code_token, latest.qr_code_token);
        assert_eq!(current.qr_code_image, latest.qr_code_image);

        let stored = store
            .find_by_external_id("CCIMRB-00001")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.qr_code_image, Some(latest.qr_code_image));
    }

    #[tokio::test]
    async fn test_current_unknown_user() {
        let (service, _store) = setup().await;

        assert!(matches!(
            service.current("CCIMRB-99999").await,
            Err(QrError::UserNotFound)
        ));
    }

    #[tokio::test]
    async fn test_generate_unknown_user() {
        let (service, _store) = setup().await;

        assert!(matches!(
            service.generate("CCIMRB-99999").await,
            Err(QrError::UserNotFound)
        ));
    }
}
