//! Authentication service.
//!
//! Username/password accounts with argon2 hashes and HMAC-signed bearer tokens.

mod error;
pub mod token;

pub use error::AuthError;
pub use token::{Claims, TokenError, TokenSigner};

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};

use pizza_time_core::{AuthResponse, Credentials, Email, PublicUser, UserId};

use crate::db::users::StoredUser;
use crate::db::{ContactRepository, Db, OrderRepository, RepositoryError, UserRepository};

/// Minimum password length.
const MIN_PASSWORD_LENGTH: usize = 8;

/// Authentication service.
///
/// Handles registration, login, the current-user lookup and account deletion.
pub struct AuthService<'a> {
    db: &'a Db,
    users: UserRepository<'a>,
    tokens: &'a TokenSigner,
}

impl<'a> AuthService<'a> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(db: &'a Db, tokens: &'a TokenSigner) -> Self {
        Self {
            db,
            users: UserRepository::new(db),
            tokens,
        }
    }

    /// Register a new account and sign it in.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::MissingCredentials` if username or password is blank.
    /// Returns `AuthError::InvalidEmail` if an email is given and malformed.
    /// Returns `AuthError::WeakPassword` if the password doesn't meet requirements.
    /// Returns `AuthError::UserAlreadyExists` if the username is taken.
    pub async fn register(&self, credentials: Credentials) -> Result<AuthResponse, AuthError> {
        let username = normalize_username(&credentials.username);
        if username.is_empty() || credentials.password.is_empty() {
            return Err(AuthError::MissingCredentials);
        }

        let email = match credentials.email.as_deref().map(str::trim) {
            Some(raw) if !raw.is_empty() => Some(Email::parse(raw)?),
            _ => None,
        };

        validate_password(&credentials.password)?;
        let password_hash = hash_password(&credentials.password)?;

        let user = self
            .users
            .create(&username, email.as_ref().map(Email::as_str), &password_hash)
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => AuthError::UserAlreadyExists,
                other => AuthError::Repository(other),
            })?;

        tracing::info!(user_id = %user.id, "account registered");
        self.signed_in(&user)
    }

    /// Log in with username and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::MissingCredentials` if username or password is blank.
    /// Returns `AuthError::InvalidCredentials` if the username/password is wrong.
    pub async fn login(&self, credentials: Credentials) -> Result<AuthResponse, AuthError> {
        let username = normalize_username(&credentials.username);
        if username.is_empty() || credentials.password.is_empty() {
            return Err(AuthError::MissingCredentials);
        }

        let user = self
            .users
            .get_by_username(&username)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;
        verify_password(&credentials.password, &user.password_hash)
            .map_err(|_| AuthError::InvalidCredentials)?;

        self.signed_in(&user)
    }

    /// Look up the account behind a verified token.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UserNotFound` if the account no longer exists.
    pub async fn current_user(&self, user_id: &UserId) -> Result<PublicUser, AuthError> {
        self.users
            .get_by_id(user_id)
            .await?
            .map(|user| user.to_public())
            .ok_or(AuthError::UserNotFound)
    }

    /// Delete an account after re-proving its password.
    ///
    /// Removes the owner's contacts and orders before the user record.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::PasswordRequired` if no password is supplied.
    /// Returns `AuthError::UserNotFound` if the account no longer exists.
    /// Returns `AuthError::InvalidPassword` if the password is wrong.
    pub async fn delete_account(&self, user_id: &UserId, password: &str) -> Result<(), AuthError> {
        if password.is_empty() {
            return Err(AuthError::PasswordRequired);
        }

        let user = self
            .users
            .get_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;
        verify_password(password, &user.password_hash)
            .map_err(|_| AuthError::InvalidPassword)?;

        ContactRepository::new(self.db)
            .delete_all_for_owner(user_id)
            .await?;
        OrderRepository::new(self.db)
            .delete_all_for_owner(user_id)
            .await?;
        self.users.delete(user_id).await?;

        tracing::info!(user_id = %user_id, "account deleted");
        Ok(())
    }

    fn signed_in(&self, user: &StoredUser) -> Result<AuthResponse, AuthError> {
        let token = self.tokens.issue(&user.id, &user.username)?;
        Ok(AuthResponse {
            success: true,
            token: Some(token),
            user: user.to_public(),
        })
    }
}

/// Usernames are case-insensitive.
fn normalize_username(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Validate password meets requirements.
fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }

    Ok(())
}

/// Hash a password using Argon2id.
fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;
    let argon2 = Argon2::default();

    argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}
