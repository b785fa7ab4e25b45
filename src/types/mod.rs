//! Core data model: conversations, model specs, and usage accounting.

pub mod chat;
pub mod model;
pub mod usage;

pub use chat::{ChatMessage, ContentPart, Conversation, MessageRole};
pub use model::{ModelSpec, ProviderFamily, models};
pub use usage::{Sample, TokenUsage};
