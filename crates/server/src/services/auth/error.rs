//! Authentication error types.

use thiserror::Error;

use super::token::TokenError;
use crate::db::RepositoryError;

/// Errors that can occur during authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Username or password missing from the request.
    #[error("Username and password are required")]
    MissingCredentials,

    /// Password missing from an account deletion request.
    #[error("Password is required")]
    PasswordRequired,

    /// Invalid email format.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] pizza_time_core::EmailError),

    /// Unknown username or wrong password.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Wrong password on an authenticated re-proof.
    #[error("Invalid password")]
    InvalidPassword,

    /// User not found.
    #[error("user not found")]
    UserNotFound,

    /// User already exists.
    #[error("user already exists")]
    UserAlreadyExists,

    /// Password too weak or invalid.
    #[error("password validation failed: {0}")]
    WeakPassword(String),

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),

    /// Password hashing error.
    #[error("password hashing error")]
    PasswordHash,

    /// Token could not be issued.
    #[error("token error: {0}")]
    Token(#[from] TokenError),
}
