//! Validation and bounding of caller-supplied conversations.
//!
//! The widget posts its whole visible history on every turn. Nothing in that
//! payload is trusted: entries with unknown roles or non-string content are
//! dropped, only the most recent [`MAX_HISTORY_MESSAGES`] survive, and each
//! surviving message is trimmed and capped at [`MAX_MESSAGE_CHARS`].

use serde::Serialize;
use serde_json::Value;

/// Most recent messages forwarded upstream per request.
pub const MAX_HISTORY_MESSAGES: usize = 12;

/// Per-message cap, in characters, applied after trimming.
pub const MAX_MESSAGE_CHARS: usize = 2_000;

/// Speaker of a conversation turn. Callers may only send these two; the
/// `system` role is reserved for prompts the proxy injects itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "user" => Some(Self::User),
            "assistant" => Some(Self::Assistant),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// One sanitized conversation turn. `content` is never empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

/// Turn the raw `messages` field of a request body into a bounded conversation.
///
/// Anything that is not a JSON array yields an empty conversation; deciding
/// whether that is an error is left to the caller.
pub fn sanitize_messages(raw: &Value) -> Vec<ChatMessage> {
    let Some(entries) = raw.as_array() else {
        return Vec::new();
    };

    let well_formed: Vec<(Role, &str)> = entries
        .iter()
        .filter_map(|entry| {
            let role = entry.get("role")?.as_str().and_then(Role::parse)?;
            let content = entry.get("content")?.as_str()?;
            Some((role, content))
        })
        .collect();

    let skip = well_formed.len().saturating_sub(MAX_HISTORY_MESSAGES);

    well_formed
        .into_iter()
        .skip(skip)
        .map(|(role, content)| ChatMessage {
            role,
            content: content.trim().chars().take(MAX_MESSAGE_CHARS).collect(),
        })
        .filter(|message| !message.content.is_empty())
        .collect()
}
