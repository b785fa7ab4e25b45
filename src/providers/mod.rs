//! Provider adapters.
//!
//! One adapter per backend. An adapter owns the translation between the
//! provider-agnostic [`Conversation`] and its provider's wire format, issues
//! the HTTP exchange (blocking or streamed), classifies failures into
//! [`LlmError`] variants at the response boundary, and maps raw usage counts
//! back into the normalized [`TokenUsage`] model.

pub mod anthropic;
pub mod deepseek;
pub mod gemini;
pub mod openai;
pub mod openrouter;
pub mod xai;

use async_trait::async_trait;

use crate::error::LlmError;
use crate::sink::DeltaSink;
use crate::types::{Conversation, ModelSpec, ProviderFamily, Sample};

/// Per-attempt options threaded into [`ProviderAdapter::send`].
pub struct SendOptions<'a> {
    /// Output-token ceiling override, set by the retry controller after a
    /// context-length overflow.
    pub max_tokens_override: Option<u32>,
    /// When present, the attempt streams and forwards each text delta here.
    pub sink: Option<&'a mut (dyn DeltaSink + 'static)>,
}

impl SendOptions<'_> {
    pub fn batch() -> Self {
        SendOptions {
            max_tokens_override: None,
            sink: None,
        }
    }

    pub(crate) fn streaming(&self) -> bool {
        self.sink.is_some()
    }
}

/// One backend's translation + transport implementation.
///
/// `send` issues exactly one attempt; retry policy lives in
/// [`crate::retry`], not here. Implementations must not mutate the caller's
/// conversation: translation works on borrowed data and produces wire JSON.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    fn family(&self) -> ProviderFamily;

    async fn send(
        &self,
        conversation: &Conversation,
        model: &ModelSpec,
        temperature: f32,
        opts: SendOptions<'_>,
    ) -> Result<Sample, LlmError>;
}
