//! Application state shared across handlers.

use std::sync::Arc;
use std::time::Duration;

use crate::config::ServerConfig;
use crate::db::Db;
use crate::services::auth::TokenSigner;
use crate::services::chat::{ChatError, ChatService};
use crate::services::email::SupportMailer;

/// How long a support email pretends to take in production.
pub const EMAIL_SEND_DELAY: Duration = Duration::from_millis(500);

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// the document store, token signer and outbound services.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ServerConfig,
    db: Db,
    tokens: TokenSigner,
    chat: ChatService,
    mailer: SupportMailer,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Errors
    ///
    /// Returns an error if the chat HTTP client cannot be built.
    pub fn new(config: ServerConfig, db: Db) -> Result<Self, ChatError> {
        Self::with_email_delay(config, db, EMAIL_SEND_DELAY)
    }

    /// Like [`AppState::new`] with a custom support email delay.
    ///
    /// # Errors
    ///
    /// Returns an error if the chat HTTP client cannot be built.
    pub fn with_email_delay(
        config: ServerConfig,
        db: Db,
        email_delay: Duration,
    ) -> Result<Self, ChatError> {
        let tokens = TokenSigner::new(config.token_secret.clone(), config.token_ttl);
        let chat = ChatService::new(config.chat.clone())?;
        let mailer = SupportMailer::new(config.email.clone(), email_delay);

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                db,
                tokens,
                chat,
                mailer,
            }),
        })
    }

    /// Get a reference to the server configuration.
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.inner.config
    }

    /// Get a reference to the document store.
    #[must_use]
    pub fn db(&self) -> &Db {
        &self.inner.db
    }

    /// Get a reference to the bearer token signer.
    #[must_use]
    pub fn tokens(&self) -> &TokenSigner {
        &self.inner.tokens
    }

    #[must_use]
    pub fn chat(&self) -> &ChatService {
        &self.inner.chat
    }

    #[must_use]
    pub fn mailer(&self) -> &SupportMailer {
        &self.inner.mailer
    }
}
