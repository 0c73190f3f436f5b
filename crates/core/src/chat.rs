//! Support chat turns.

use serde::{Deserialize, Serialize};

/// Number of trailing turns sent along with each new message.
pub const HISTORY_WINDOW: usize = 10;

/// Who authored a chat turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    User,
    Assistant,
}

/// One message in the support conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
}

impl ChatTurn {
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// Body of `POST /api/chat/message`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub history: Vec<ChatTurn>,
}

/// Payload of a successful chat reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatReply {
    pub message: String,
}

/// The last [`HISTORY_WINDOW`] turns of `history`.
#[must_use]
pub fn trailing_window(history: &[ChatTurn]) -> &[ChatTurn] {
    let start = history.len().saturating_sub(HISTORY_WINDOW);
    history.get(start..).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trailing_window_keeps_last_ten() {
        let history: Vec<ChatTurn> = (0..14).map(|i| ChatTurn::user(i.to_string())).collect();
        let window = trailing_window(&history);
        assert_eq!(window.len(), HISTORY_WINDOW);
        assert_eq!(window.first().map(|t| t.content.as_str()), Some("4"));
    }

    #[test]
    fn test_trailing_window_short_history() {
        let history = vec![ChatTurn::assistant("hi")];
        assert_eq!(trailing_window(&history).len(), 1);
    }
}
