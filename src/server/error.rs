//! HTTP error taxonomy. Every failure leaves the server as
//! `{"success": false, "message": "..."}` with a matching status.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::auth::AuthError;
use crate::imaging::ImageError;
use crate::model::ModelError;
use crate::render::RenderError;
use crate::report::ReportError;
use crate::users::UserStoreError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    InputValidation(String),

    #[error("{0}")]
    DuplicateResource(String),

    #[error("{0}")]
    Authentication(String),

    #[error("Rate limit exceeded. Maximum {0} requests per minute.")]
    RateLimited(u32),

    #[error("{0}")]
    Unavailable(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InputValidation(_) | Self::DuplicateResource(_) => StatusCode::BAD_REQUEST,
            Self::Authentication(_) => StatusCode::UNAUTHORIZED,
            Self::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn invalid_json(e: serde_json::Error) -> Self {
        Self::InputValidation(format!("Invalid JSON: {e}"))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %self, "request failed");
        }
        (
            status,
            axum::Json(serde_json::json!({
                "success": false,
                "message": self.to_string(),
            })),
        )
            .into_response()
    }
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::Validation(msg) => Self::InputValidation(msg.to_string()),
            AuthError::DuplicateEmail => Self::DuplicateResource(e.to_string()),
            AuthError::InvalidCredentials => Self::Authentication(e.to_string()),
            AuthError::InvalidToken(_) => Self::Authentication("Invalid or expired token".into()),
            AuthError::TokenEncoding(_) | AuthError::Hashing(_) | AuthError::Store(_) => {
                Self::Internal(e.to_string())
            }
        }
    }
}

impl From<ReportError> for ApiError {
    fn from(e: ReportError) -> Self {
        Self::InputValidation(e.to_string())
    }
}

impl From<UserStoreError> for ApiError {
    fn from(e: UserStoreError) -> Self {
        AuthError::from(e).into()
    }
}

impl From<ImageError> for ApiError {
    fn from(e: ImageError) -> Self {
        Self::Internal(e.to_string())
    }
}

impl From<ModelError> for ApiError {
    fn from(e: ModelError) -> Self {
        Self::Internal(e.to_string())
    }
}

impl From<RenderError> for ApiError {
    fn from(e: RenderError) -> Self {
        Self::Internal(e.to_string())
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(e: tokio::task::JoinError) -> Self {
        Self::Internal(format!("worker task failed: {e}"))
    }
}
