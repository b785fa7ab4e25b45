//! Provider-agnostic chat representation.
//!
//! A [`Conversation`] is an ordered list of [`ChatMessage`]s, each holding an
//! ordered list of [`ContentPart`]s. Adapters translate this shape into each
//! provider's wire format; they never mutate the caller's conversation, so a
//! single conversation can back many concurrent sampling attempts.

use serde::{Deserialize, Serialize};

use crate::error::LlmError;

/// Message role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

/// One piece of message content.
///
/// `cache_hint` marks the end of a prefix the provider should persist in its
/// prompt cache. Providers without prompt caching ignore it; providers with
/// caching cap how many hints they accept (see the Anthropic adapter).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentPart {
    Text { text: String, cache_hint: bool },
    /// Base64-encoded PNG payload (no data-URL prefix).
    Image { data: String, cache_hint: bool },
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text {
            text: text.into(),
            cache_hint: false,
        }
    }

    /// Accepts either raw base64 or a `data:image/png;base64,` URL.
    pub fn image(data: impl Into<String>) -> Self {
        let data = data.into();
        let data = data
            .strip_prefix("data:image/png;base64,")
            .map(str::to_owned)
            .unwrap_or(data);
        Self::Image {
            data,
            cache_hint: false,
        }
    }

    /// Encodes raw PNG bytes.
    pub fn image_bytes(bytes: &[u8]) -> Self {
        use base64::Engine;
        Self::Image {
            data: base64::engine::general_purpose::STANDARD.encode(bytes),
            cache_hint: false,
        }
    }

    pub fn with_cache_hint(mut self) -> Self {
        match &mut self {
            Self::Text { cache_hint, .. } | Self::Image { cache_hint, .. } => *cache_hint = true,
        }
        self
    }

    pub fn cache_hint(&self) -> bool {
        match self {
            Self::Text { cache_hint, .. } | Self::Image { cache_hint, .. } => *cache_hint,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text, .. } => Some(text),
            Self::Image { .. } => None,
        }
    }

    pub fn is_image(&self) -> bool {
        matches!(self, Self::Image { .. })
    }
}

/// A single message: role plus ordered content parts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: Vec<ContentPart>,
}

impl ChatMessage {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: vec![ContentPart::text(text)],
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: vec![ContentPart::text(text)],
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: vec![ContentPart::text(text)],
        }
    }

    pub fn with_image(mut self, data: impl Into<String>) -> Self {
        self.content.push(ContentPart::image(data));
        self
    }

    pub fn with_part(mut self, part: ContentPart) -> Self {
        self.content.push(part);
        self
    }

    /// Joined text of all text parts, `None` when the message has no text.
    pub fn text(&self) -> Option<String> {
        let texts: Vec<&str> = self.content.iter().filter_map(|p| p.as_text()).collect();
        if texts.is_empty() {
            None
        } else {
            Some(texts.join("\n"))
        }
    }
}

/// An ordered conversation.
///
/// Invariant, enforced at construction: at most one system message, and only
/// at index 0.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    messages: Vec<ChatMessage>,
}

impl Conversation {
    pub fn new(messages: Vec<ChatMessage>) -> Result<Self, LlmError> {
        for (i, message) in messages.iter().enumerate() {
            if message.role == MessageRole::System && i != 0 {
                return Err(LlmError::InvalidInput(format!(
                    "system message allowed only at position 0, found one at {i}"
                )));
            }
        }
        Ok(Self { messages })
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Splits off the leading system message, if any.
    pub fn split_system(&self) -> (Option<&ChatMessage>, &[ChatMessage]) {
        match self.messages.first() {
            Some(first) if first.role == MessageRole::System => {
                (Some(first), &self.messages[1..])
            }
            _ => (None, &self.messages[..]),
        }
    }

    /// Projection for text-only model variants: image parts dropped, each
    /// message's text parts joined into one. Messages left with no text are
    /// dropped entirely. Cache hints do not survive the projection.
    pub fn text_only(&self) -> Self {
        let messages = self
            .messages
            .iter()
            .filter_map(|m| {
                m.text().map(|text| ChatMessage {
                    role: m.role,
                    content: vec![ContentPart::text(text)],
                })
            })
            .collect();
        Self { messages }
    }
}
