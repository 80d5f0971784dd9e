//! Shared error taxonomy for the HTTP surface
//!
//! Domain error enums (`AuthError`, `AttendanceError`, `QrError`) classify
//! each variant into an [`ErrorKind`] and a stable machine-readable code.
//! [`error_response`] turns that into the JSON body every endpoint returns.

use axum::{
    Json,
    extract::{FromRequest, FromRequestParts, Query, Request},
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Broad failure categories
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Conflict,
    Auth,
    NotFound,
    Internal,
}

impl ErrorKind {
    /// HTTP status for this category
    pub fn status(self) -> StatusCode {
        match self {
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::Auth => StatusCode::UNAUTHORIZED,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Classification implemented by every domain error
pub trait Classify: std::fmt::Display {
    fn kind(&self) -> ErrorKind;
    fn code(&self) -> &'static str;
}

/// API error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: String,
    pub code: String,
}

impl ApiError {
    pub fn new(error: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: code.into(),
        }
    }
}

/// Build the HTTP response for a classified error.
///
/// Internal failures are logged with their cause and answered with a generic
/// message so store details never leak to clients.
pub fn error_response<E: Classify>(err: &E) -> Response {
    let kind = err.kind();
    let message = match kind {
        ErrorKind::Internal => {
            tracing::error!("Request failed: {}", err);
            "Internal server error".to_string()
        }
        _ => err.to_string(),
    };

    (kind.status(), Json(ApiError::new(message, err.code()))).into_response()
}

/// Code returned for bodies or query strings that fail to parse
pub const INVALID_REQUEST: &str = "INVALID_REQUEST";

fn invalid_request(message: String) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ApiError::new(message, INVALID_REQUEST)),
    )
        .into_response()
}

/// `Json` extractor whose rejection uses the [`ApiError`] body
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonBody<T>(pub T);

impl<S, T> FromRequest<S> for JsonBody<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(invalid_request(rejection.body_text())),
        }
    }
}

/// `Query` extractor whose rejection uses the [`ApiError`] body
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryParams<T>(pub T);

impl<S, T> FromRequestParts<S> for QueryParams<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Query::<T>::from_request_parts(parts, state).await {
            Ok(Query(value)) => Ok(Self(value)),
            Err(rejection) => Err(invalid_request(rejection.body_text())),
        }
    }
}
