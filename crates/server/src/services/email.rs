//! Support email intake.
//!
//! Messages from the contact form are validated and logged, then
//! acknowledged. Nothing is delivered: the configured credentials are only
//! ever reported by [`SupportMailer::config_status`].

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::instrument;

use crate::config::EmailConfig;

/// Subject used when the form leaves it blank.
pub const DEFAULT_SUBJECT: &str = "Support Request";

const PREVIEW_CHARS: usize = 100;

/// Errors that can occur when accepting a support message.
#[derive(Debug, Error)]
pub enum EmailError {
    /// Name, email or message is blank.
    #[error("Name, email, and message are required")]
    MissingFields,
}

/// Contact form submission.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SupportMessage {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default)]
    pub message: String,
}

/// Presence report for the outbound email credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailConfigStatus {
    pub success: bool,
    pub email_configured: bool,
    pub has_email_user: bool,
    pub has_email_pass: bool,
    pub email_user: String,
}

/// Accepts support messages.
#[derive(Debug, Clone)]
pub struct SupportMailer {
    config: EmailConfig,
    delay: Duration,
}

impl SupportMailer {
    /// `delay` is how long a send pretends to take.
    #[must_use]
    pub const fn new(config: EmailConfig, delay: Duration) -> Self {
        Self { config, delay }
    }

    /// Accept a support message.
    ///
    /// # Errors
    ///
    /// Returns `EmailError::MissingFields` if name, email or message is blank.
    #[instrument(skip(self, message), fields(from = %message.email))]
    pub async fn send(&self, message: &SupportMessage) -> Result<(), EmailError> {
        if [&message.name, &message.email, &message.message]
            .iter()
            .any(|field| field.trim().is_empty())
        {
            return Err(EmailError::MissingFields);
        }

        let subject = message
            .subject
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(DEFAULT_SUBJECT);
        tracing::info!(
            name = %message.name,
            subject,
            preview = %preview(&message.message),
            "support email received"
        );

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(())
    }

    /// Report which credentials are present, masking the user.
    #[must_use]
    pub fn config_status(&self) -> EmailConfigStatus {
        let email_user = self.config.user.as_deref().map_or_else(
            || "not set".to_owned(),
            |user| format!("{}***", user.chars().take(3).collect::<String>()),
        );
        EmailConfigStatus {
            success: true,
            email_configured: self.config.is_configured(),
            has_email_user: self.config.user.is_some(),
            has_email_pass: self.config.password.is_some(),
            email_user,
        }
    }
}

fn preview(message: &str) -> String {
    if message.chars().count() > PREVIEW_CHARS {
        let head: String = message.chars().take(PREVIEW_CHARS).collect();
        format!("{head}...")
    } else {
        message.to_owned()
    }
}
