//! Signed-in account state.
//!
//! The bearer token lives in local storage under `pizza_time_auth_token`,
//! where [`crate::api::ApiClient`] picks it up for every request. Account
//! operations need the gateway; there is no offline sign-in.

use std::sync::Arc;

use pizza_time_core::{Credentials, Email, PublicUser};
use tracing::{info, instrument, warn};

use crate::api::Remote;
use crate::error::{ClientError, Result};
use crate::observable::{Observable, Subscription};
use crate::storage::{AUTH_TOKEN_KEY, LocalStore, SESSION_USER_KEY};

/// Character classes a password must mix, at least two of them.
const MIN_PASSWORD_CLASSES: usize = 2;

/// How many of upper case, lower case, digits and symbols `password` uses.
fn password_classes(password: &str) -> usize {
    let symbols = "!@#$%^&*(),.?\":{}|<>";
    [
        password.chars().any(|c| c.is_ascii_uppercase()),
        password.chars().any(|c| c.is_ascii_lowercase()),
        password.chars().any(|c| c.is_ascii_digit()),
        password.chars().any(|c| symbols.contains(c)),
    ]
    .into_iter()
    .filter(|present| *present)
    .count()
}

fn validate_registration(credentials: &Credentials) -> Result<()> {
    if credentials.username.trim().is_empty() || credentials.password.is_empty() {
        return Err(ClientError::Validation(
            "Username and password are required".to_owned(),
        ));
    }
    if let Some(email) = credentials.email.as_deref().filter(|e| !e.trim().is_empty()) {
        Email::parse(email.trim())
            .map_err(|_| ClientError::Validation("Please enter a valid email address".to_owned()))?;
    }
    if password_classes(&credentials.password) < MIN_PASSWORD_CLASSES {
        return Err(ClientError::Validation(
            "Password must mix at least two of: upper case, lower case, numbers, symbols"
                .to_owned(),
        ));
    }
    Ok(())
}

/// The signed-in user, if any.
pub struct Session {
    remote: Arc<dyn Remote>,
    store: LocalStore,
    user: Observable<Option<PublicUser>>,
}

impl Session {
    /// Restore the cached user when a token is present.
    pub fn new(remote: Arc<dyn Remote>, store: LocalStore) -> Self {
        let user = store
            .load_string(AUTH_TOKEN_KEY)
            .and_then(|_| store.load::<PublicUser>(SESSION_USER_KEY));
        Self {
            remote,
            store,
            user: Observable::new(user),
        }
    }

    #[must_use]
    pub fn current_user(&self) -> Option<PublicUser> {
        self.user.get()
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.user.get().is_some()
    }

    fn sign_in(&self, token: Option<String>, user: PublicUser) -> Result<PublicUser> {
        let token = token.ok_or_else(|| ClientError::Api {
            status: 200,
            message: "Server did not issue a token".to_owned(),
        })?;
        self.store.save(AUTH_TOKEN_KEY, &token)?;
        self.store.save(SESSION_USER_KEY, &user)?;
        self.user.set(Some(user.clone()));
        info!(user_id = %user.id, "signed in");
        Ok(user)
    }

    /// Create an account and sign in.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Validation`] for blank credentials, a malformed
    /// email or a weak password, otherwise the gateway's error.
    #[instrument(skip_all, fields(username = %credentials.username))]
    pub async fn register(&self, credentials: Credentials) -> Result<PublicUser> {
        validate_registration(&credentials)?;
        let response = self.remote.register(&credentials).await?;
        self.sign_in(response.token, response.user)
    }

    /// Sign in with existing credentials.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Validation`] for blank credentials, otherwise
    /// the gateway's error.
    #[instrument(skip_all, fields(username = %credentials.username))]
    pub async fn login(&self, credentials: Credentials) -> Result<PublicUser> {
        if credentials.username.trim().is_empty() || credentials.password.is_empty() {
            return Err(ClientError::Validation(
                "Username and password are required".to_owned(),
            ));
        }
        let response = self.remote.login(&credentials).await?;
        self.sign_in(response.token, response.user)
    }

    /// Revalidate the stored token against the gateway.
    ///
    /// A rejected token, or an account that no longer exists, signs the user
    /// out. When the gateway cannot be reached the cached user is kept.
    ///
    /// # Errors
    ///
    /// Returns an error if the refreshed user cannot be stored.
    pub async fn restore(&self) -> Result<Option<PublicUser>> {
        if self.store.load_string(AUTH_TOKEN_KEY).is_none() {
            return Ok(None);
        }
        match self.remote.current_user().await {
            Ok(user) => {
                self.store.save(SESSION_USER_KEY, &user)?;
                self.user.set(Some(user.clone()));
                Ok(Some(user))
            }
            Err(ClientError::Api {
                status: 401 | 403 | 404,
                ..
            }) => {
                self.logout();
                Ok(None)
            }
            Err(e) => {
                warn!(error = %e, "could not revalidate session, keeping cached user");
                Ok(self.user.get())
            }
        }
    }

    /// Forget the token and the cached user.
    pub fn logout(&self) {
        for key in [AUTH_TOKEN_KEY, SESSION_USER_KEY] {
            if let Err(e) = self.store.remove(key) {
                warn!(key, error = %e, "failed to clear session storage");
            }
        }
        self.user.set(None);
    }

    /// Delete the account on the gateway, then sign out.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::NotSignedIn`] without a session, otherwise the
    /// gateway's error (for example a wrong password).
    #[instrument(skip_all)]
    pub async fn delete_account(&self, password: &str) -> Result<()> {
        if !self.is_authenticated() {
            return Err(ClientError::NotSignedIn);
        }
        if password.is_empty() {
            return Err(ClientError::Validation("Password is required".to_owned()));
        }
        self.remote.delete_account(password).await?;
        self.logout();
        Ok(())
    }

    pub fn subscribe(
        &self,
        listener: impl Fn(&Option<PublicUser>) + Send + Sync + 'static,
    ) -> Subscription {
        self.user.subscribe(listener)
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("user", &self.user.get().map(|u| u.username))
            .finish_non_exhaustive()
    }
}
