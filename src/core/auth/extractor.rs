//! Bearer token extraction for protected routes

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{HeaderMap, header, request::Parts},
};

use crate::core::auth::jwt::{Claims, JwtService};
use crate::core::auth::service::AuthError;

/// Caller identity taken from a verified access token
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub claims: Claims,
}

impl AuthenticatedUser {
    /// External identifier of the caller
    pub fn subject(&self) -> &str {
        &self.claims.sub
    }

    pub fn is_admin(&self) -> bool {
        self.claims.admin
    }
}

/// Extract Bearer token from Authorization header
pub fn extract_bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let auth_header = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(AuthError::InvalidToken)?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or(AuthError::InvalidToken)?
        .trim();

    if token.is_empty() {
        return Err(AuthError::InvalidToken);
    }

    Ok(token)
}

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
    JwtService: FromRef<S>,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = extract_bearer_token(&parts.headers)?;
        let jwt = JwtService::from_ref(state);

        match jwt.verify(token) {
            Ok(claims) => Ok(Self { claims }),
            Err(e) => {
                tracing::debug!("Access token rejected: {}", e);
                Err(e.into())
            }
        }
    }
}
