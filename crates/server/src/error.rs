//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers should return `Result<T, AppError>`.
//! Every error renders as the JSON envelope `{"success": false, "message": ...}`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use pizza_time_core::{ApiResponse, StatusError};

use crate::db::{RepositoryError, StoreError};
use crate::services::auth::AuthError;
use crate::services::chat::ChatError;
use crate::services::email::EmailError;

/// Application-level error type for the gateway.
#[derive(Debug, Error)]
pub enum AppError {
    /// Repository operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Storage backend write failed.
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    /// Authentication operation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Chat upstream failed.
    #[error("Chat error: {0}")]
    Chat(#[from] ChatError),

    /// Support email rejected.
    #[error("Email error: {0}")]
    Email(#[from] EmailError),

    /// Illegal order status change.
    #[error("{0}")]
    Status(#[from] StatusError),

    /// Resource not found.
    #[error("{0}")]
    NotFound(String),

    /// No bearer token.
    #[error("{0}")]
    Unauthorized(String),

    /// Bearer token rejected.
    #[error("{0}")]
    Forbidden(String),

    /// Bad request from client.
    #[error("{0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Database(err) => match err {
                RepositoryError::NotFound => StatusCode::NOT_FOUND,
                RepositoryError::Conflict(_) => StatusCode::CONFLICT,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Store(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Auth(err) => match err {
                AuthError::MissingCredentials
                | AuthError::PasswordRequired
                | AuthError::WeakPassword(_)
                | AuthError::InvalidEmail(_) => StatusCode::BAD_REQUEST,
                AuthError::InvalidCredentials | AuthError::InvalidPassword => {
                    StatusCode::UNAUTHORIZED
                }
                AuthError::UserNotFound => StatusCode::NOT_FOUND,
                AuthError::UserAlreadyExists => StatusCode::CONFLICT,
                AuthError::Repository(_) | AuthError::PasswordHash | AuthError::Token(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::Chat(ChatError::NotConfigured) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Chat(_) => StatusCode::BAD_GATEWAY,
            Self::Email(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Status(_) => StatusCode::CONFLICT,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
        }
    }

    // Never exposes internal error details.
    fn public_message(&self) -> String {
        match self {
            Self::Database(RepositoryError::NotFound) => "Not found".to_string(),
            Self::Database(RepositoryError::Conflict(reason)) => reason.clone(),
            Self::Database(_) | Self::Store(_) | Self::Internal(_) => {
                "Internal server error".to_string()
            }
            Self::Auth(err) => match err {
                AuthError::MissingCredentials | AuthError::PasswordRequired => err.to_string(),
                AuthError::WeakPassword(msg) => msg.clone(),
                AuthError::InvalidEmail(_) => "Invalid email address".to_string(),
                AuthError::InvalidCredentials => "Invalid username or password".to_string(),
                AuthError::InvalidPassword => "Invalid password".to_string(),
                AuthError::UserNotFound => "User not found".to_string(),
                AuthError::UserAlreadyExists => "Username already exists".to_string(),
                _ => "Authentication error".to_string(),
            },
            Self::Chat(err) => err.user_message(),
            _ => self.to_string(),
        }
    }

    const fn is_server_error(&self) -> bool {
        matches!(
            self,
            Self::Database(
                RepositoryError::Store(_) | RepositoryError::DataCorruption(_)
            ) | Self::Store(_)
                | Self::Internal(_)
                | Self::Chat(_)
                | Self::Auth(AuthError::Repository(_) | AuthError::PasswordHash | AuthError::Token(_))
        )
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let status = self.status();
        let body = ApiResponse::<()>::failure(self.public_message());
        (status, Json(body)).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context for the authenticated caller.
pub fn set_sentry_user(user_id: &impl ToString, username: &str) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            username: Some(username.to_string()),
            ..Default::default()
        }));
    });
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pizza_time_core::OrderStatus;

    use super::*;

    fn get_status(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("Contact not found".to_string());
        assert_eq!(err.to_string(), "Contact not found");

        let err = AppError::BadRequest("Message is required".to_string());
        assert_eq!(err.to_string(), "Message is required");
    }

    #[test]
    fn test_app_error_status_codes() {
        assert_eq!(
            get_status(AppError::NotFound("test".to_string())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::Unauthorized("test".to_string())),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get_status(AppError::Forbidden("test".to_string())),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            get_status(AppError::BadRequest("test".to_string())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(AppError::Internal("test".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            get_status(AppError::Auth(AuthError::UserAlreadyExists)),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(AppError::Chat(ChatError::NotConfigured)),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn test_invalid_transition_is_conflict() {
        let err = OrderStatus::Delivered
            .transition_to(OrderStatus::Cancelled)
            .unwrap_err();
        assert_eq!(get_status(AppError::from(err)), StatusCode::CONFLICT);
    }

    #[test]
    fn test_repository_conflict_reason_is_public() {
        let err = AppError::Database(RepositoryError::Conflict(
            "Order was changed by another request".to_string(),
        ));
        assert_eq!(err.public_message(), "Order was changed by another request");
        assert_eq!(get_status(err), StatusCode::CONFLICT);
    }

    #[test]
    fn test_internal_details_hidden() {
        let err = AppError::Internal("disk on fire".to_string());
        assert_eq!(err.public_message(), "Internal server error");
    }
}
