use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

/// Error type shared by every handler. Each auth failure is raised at the
/// point of detection and only translated to an HTTP response here.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Not authenticated")]
    Unauthenticated,

    #[error("This token is invalid or expired")]
    InvalidToken,

    #[error("This token is invalid or revoked")]
    RevokedToken,

    #[error("Please provide an access token")]
    AccessTokenRequired,

    #[error("Please provide a refresh token")]
    RefreshTokenRequired,

    #[error("User has no permission to perform the action")]
    InsufficientPermission,

    #[error("User already exists")]
    UserAlreadyExists,

    #[error("User not found")]
    UserNotFound,

    #[error("Book not found")]
    BookNotFound,

    #[error("Review not found")]
    ReviewNotFound,

    #[error("Passwords do not match")]
    PasswordsDoNotMatch,

    #[error("{0}")]
    Validation(String),

    #[error("database error")]
    Database(#[from] sqlx::Error),

    #[error("internal error")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidCredentials | ApiError::Unauthenticated => StatusCode::UNAUTHORIZED,
            ApiError::InvalidToken
            | ApiError::RevokedToken
            | ApiError::AccessTokenRequired
            | ApiError::RefreshTokenRequired
            | ApiError::InsufficientPermission => StatusCode::FORBIDDEN,
            ApiError::UserAlreadyExists => StatusCode::CONFLICT,
            ApiError::UserNotFound | ApiError::BookNotFound | ApiError::ReviewNotFound => {
                StatusCode::NOT_FOUND
            }
            ApiError::PasswordsDoNotMatch | ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Database(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            // Internal detail never reaches the client.
            ApiError::Database(e) => {
                error!(error = %e, "database error");
                "Something went wrong".to_string()
            }
            ApiError::Internal(e) => {
                error!(error = %e, "internal error");
                "Something went wrong".to_string()
            }
            other => other.to_string(),
        };
        (status, Json(json!({ "message": message }))).into_response()
    }
}
