//! Support chat conversation.

use std::sync::Arc;

use pizza_time_core::chat::trailing_window;
use pizza_time_core::{ChatRequest, ChatTurn};
use tracing::{instrument, warn};

use crate::api::Remote;
use crate::error::ClientError;
use crate::observable::{Observable, Subscription};

pub const WELCOME_MESSAGE: &str =
    "Hello! I'm here to help you with Pizza Time. How can I assist you today?";

pub const FALLBACK_REPLY: &str =
    "Sorry, I encountered an error. Please try again or contact support via email.";

/// The reply shown when the assistant could not answer.
fn failure_reply(error: &ClientError) -> String {
    match error {
        ClientError::Api { message, .. } if !message.trim().is_empty() => message.clone(),
        _ => FALLBACK_REPLY.to_owned(),
    }
}

/// A conversation with the support assistant. History is kept in memory only.
pub struct ChatAssistant {
    remote: Arc<dyn Remote>,
    history: Observable<Vec<ChatTurn>>,
}

impl ChatAssistant {
    pub fn new(remote: Arc<dyn Remote>) -> Self {
        Self {
            remote,
            history: Observable::new(vec![ChatTurn::assistant(WELCOME_MESSAGE)]),
        }
    }

    /// Send `message` along with the preceding turns and return the reply.
    ///
    /// Failures never escape: the error text becomes the assistant's reply so
    /// the conversation stays readable. Blank messages are ignored.
    #[instrument(skip(self, message))]
    pub async fn send(&self, message: &str) -> Option<String> {
        let message = message.trim();
        if message.is_empty() {
            return None;
        }

        let request = self.history.update(|history| {
            let request = ChatRequest {
                message: message.to_owned(),
                history: trailing_window(history).to_vec(),
            };
            history.push(ChatTurn::user(message));
            request
        });

        let reply = match self.remote.send_chat(&request).await {
            Ok(reply) => reply.message,
            Err(e) => {
                warn!(error = %e, "chat request failed");
                failure_reply(&e)
            }
        };
        self.history
            .update(|history| history.push(ChatTurn::assistant(reply.clone())));
        Some(reply)
    }

    #[must_use]
    pub fn history(&self) -> Vec<ChatTurn> {
        self.history.get()
    }

    /// Start over with just the welcome message.
    pub fn clear(&self) {
        self.history
            .set(vec![ChatTurn::assistant(WELCOME_MESSAGE)]);
    }

    pub fn subscribe(
        &self,
        listener: impl Fn(&Vec<ChatTurn>) + Send + Sync + 'static,
    ) -> Subscription {
        self.history.subscribe(listener)
    }
}

impl std::fmt::Debug for ChatAssistant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatAssistant")
            .field("turns", &self.history.get().len())
            .finish_non_exhaustive()
    }
}
