use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

pub type AppResult<T> = Result<T, AppError>;

/// Application error taxonomy. Variants carry the client-facing message;
/// `Internal` wraps anything unexpected and its details never leave the
/// server.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    NotFound(&'static str),
    #[error("{0}")]
    Conflict(&'static str),
    #[error("{0}")]
    Unauthorized(&'static str),
    #[error("{0}")]
    Forbidden(&'static str),
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    DeliveryFailed(&'static str),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::DeliveryFailed(_) => StatusCode::BAD_GATEWAY,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    success: bool,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            AppError::Internal(e) => {
                error!(error = ?e, "internal error");
                "Something went wrong".to_string()
            }
            other => other.to_string(),
        };
        (
            status,
            Json(ErrorBody {
                success: false,
                message,
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_hints() {
        assert_eq!(
            AppError::NotFound("Item not found").status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::Conflict("Email already taken").status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::Unauthorized("Password is wrong").status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AppError::Validation("title is required".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::DeliveryFailed("mail down").status(),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn internal_details_are_masked() {
        let err = AppError::Internal(anyhow::anyhow!("connection refused to 10.0.0.3"));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        // The client-facing conversion happens in into_response; the wrapped
        // message must not be what clients see.
        assert!(err.to_string().contains("connection refused"));
    }
}
