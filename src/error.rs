use axum::{
    extract::rejection::{JsonRejection, PathRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::db::StoreError;

pub type ApiResult<T> = Result<T, ApiError>;

/// Every failure a handler can report to a client.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("User with this email already exists")]
    DuplicateEmail,

    #[error("Incorrect email or password")]
    InvalidCredentials,

    #[error("You are not logged in. Please log in to get access.")]
    Unauthenticated,

    #[error("Invalid token. Please log in again.")]
    InvalidSession,

    #[error("Your token has expired. Please log in again.")]
    ExpiredSession,

    #[error("The user belonging to this token no longer exists.")]
    AccountNotFound,

    #[error("{0}")]
    Forbidden(String),

    #[error("Your account is pending activation by an administrator")]
    AccountInactive,

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    InvalidTransition(String),

    #[error("This question has already been answered")]
    AlreadyAnswered,

    #[error("This service has already been paid")]
    AlreadyPaid,

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::Validation(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ApiError::Forbidden(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn invalid_transition(message: impl Into<String>) -> Self {
        ApiError::InvalidTransition(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_)
            | ApiError::DuplicateEmail
            | ApiError::InvalidTransition(_)
            | ApiError::AlreadyAnswered
            | ApiError::AlreadyPaid => StatusCode::BAD_REQUEST,
            ApiError::InvalidCredentials
            | ApiError::Unauthenticated
            | ApiError::InvalidSession
            | ApiError::ExpiredSession
            | ApiError::AccountNotFound => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) | ApiError::AccountInactive => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateEmail => ApiError::DuplicateEmail,
            StoreError::Sqlite(e) => ApiError::Internal(e.into()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}

/// Marker attached to 500 responses; the outermost middleware fills in the
/// request path.
#[derive(Debug, Clone)]
pub struct InternalFailure(pub String);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        if let ApiError::Internal(e) = &self {
            tracing::error!(error = ?e, "Request failed");
            let message = format!("{e:#}");
            let mut response = (
                status,
                Json(json!({ "status": "error", "message": message })),
            )
                .into_response();
            response.extensions_mut().insert(InternalFailure(message));
            return response;
        }

        (
            status,
            Json(json!({ "status": "error", "message": self.to_string() })),
        )
            .into_response()
    }
}
