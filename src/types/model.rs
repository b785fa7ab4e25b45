//! Model specifications and the known-model registry.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Provider family a model belongs to. Fixed set; adapter dispatch branches
/// on this exactly once, at the call boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderFamily {
    Anthropic,
    OpenAi,
    DeepSeek,
    OpenRouter,
    Xai,
    Gemini,
}

impl std::fmt::Display for ProviderFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Anthropic => write!(f, "anthropic"),
            Self::OpenAi => write!(f, "openai"),
            Self::DeepSeek => write!(f, "deepseek"),
            Self::OpenRouter => write!(f, "openrouter"),
            Self::Xai => write!(f, "xai"),
            Self::Gemini => write!(f, "gemini"),
        }
    }
}

impl ProviderFamily {
    /// Per-request timeout, enforced by the HTTP transport.
    pub fn request_timeout(&self) -> Duration {
        match self {
            Self::Anthropic => Duration::from_secs(120),
            Self::OpenAi => Duration::from_secs(1200),
            Self::DeepSeek => Duration::from_secs(600),
            Self::OpenRouter => Duration::from_secs(600),
            Self::Xai => Duration::from_secs(3600),
            Self::Gemini => Duration::from_secs(300),
        }
    }
}

/// Immutable description of one known model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSpec {
    /// Provider-side model identifier.
    pub id: &'static str,
    pub family: ProviderFamily,
    pub supports_streaming: bool,
    pub supports_vision: bool,
    /// Reasoning-tuned variants: temperature must be omitted (not defaulted)
    /// and content is sent text-only.
    pub reasoning: bool,
    /// Default output-token ceiling for the family's request shape.
    pub max_output_tokens: u32,
    /// Shared prompt+completion context window, for families where the
    /// output budget is dynamic. `None` means the ceiling is fixed.
    pub context_window: Option<u32>,
}

impl ModelSpec {
    const fn new(id: &'static str, family: ProviderFamily, max_output_tokens: u32) -> Self {
        Self {
            id,
            family,
            supports_streaming: true,
            supports_vision: false,
            reasoning: false,
            max_output_tokens,
            context_window: None,
        }
    }

    const fn vision(mut self) -> Self {
        self.supports_vision = true;
        self
    }

    const fn reasoning(mut self) -> Self {
        self.reasoning = true;
        self
    }

    const fn no_streaming(mut self) -> Self {
        self.supports_streaming = false;
        self
    }

    const fn window(mut self, tokens: u32) -> Self {
        self.context_window = Some(tokens);
        self
    }

    /// Whether a text-only projection of the conversation must be sent.
    pub fn text_only(&self) -> bool {
        self.reasoning || !self.supports_vision
    }
}

/// Registry of known models, one constant per model.
pub mod models {
    use super::{ModelSpec, ProviderFamily};

    pub const CLAUDE_3_5_SONNET: ModelSpec =
        ModelSpec::new("claude-3-5-sonnet-20241022", ProviderFamily::Anthropic, 8_192).vision();
    pub const CLAUDE_3_5_HAIKU: ModelSpec =
        ModelSpec::new("claude-3-5-haiku-20241022", ProviderFamily::Anthropic, 8_192);

    pub const GPT_4O: ModelSpec =
        ModelSpec::new("gpt-4o", ProviderFamily::OpenAi, 16_384).vision();
    pub const GPT_4O_MINI: ModelSpec =
        ModelSpec::new("gpt-4o-mini", ProviderFamily::OpenAi, 16_384).vision();
    pub const GPT_5: ModelSpec = ModelSpec::new("gpt-5", ProviderFamily::OpenAi, 16_384).vision();
    pub const O1_MINI: ModelSpec =
        ModelSpec::new("o1-mini", ProviderFamily::OpenAi, 16_384).reasoning();
    pub const O1_PREVIEW: ModelSpec =
        ModelSpec::new("o1-preview", ProviderFamily::OpenAi, 16_384).reasoning();
    pub const O3_MINI: ModelSpec =
        ModelSpec::new("o3-mini", ProviderFamily::OpenAi, 16_384).reasoning();

    pub const DEEPSEEK_R1: ModelSpec =
        ModelSpec::new("deepseek-reasoner", ProviderFamily::DeepSeek, 8_192)
            .reasoning()
            .window(65_536);

    pub const GROK_3: ModelSpec = ModelSpec::new("grok-3", ProviderFamily::Xai, 120_000).vision();
    pub const GROK_4: ModelSpec = ModelSpec::new("grok-4", ProviderFamily::Xai, 120_000).vision();

    pub const GEMINI_1_5_PRO: ModelSpec =
        ModelSpec::new("gemini-1.5-pro", ProviderFamily::Gemini, 10_000)
            .vision()
            .no_streaming();

    pub const OPENROUTER_CLAUDE_3_5_SONNET: ModelSpec = ModelSpec::new(
        "anthropic/claude-3.5-sonnet",
        ProviderFamily::OpenRouter,
        20_000,
    )
    .vision();
    pub const OPENROUTER_O1: ModelSpec =
        ModelSpec::new("openai/o1", ProviderFamily::OpenRouter, 20_000).reasoning();
    pub const OPENROUTER_O1_MINI: ModelSpec =
        ModelSpec::new("openai/o1-mini", ProviderFamily::OpenRouter, 20_000).reasoning();
    /// Passthrough entry for self-hosted OpenAI-compatible gateways.
    pub const OPENROUTER_CUSTOM: ModelSpec =
        ModelSpec::new("openrouter/custom", ProviderFamily::OpenRouter, 20_000);

    pub(super) const ALL: &[&ModelSpec] = &[
        &CLAUDE_3_5_SONNET,
        &CLAUDE_3_5_HAIKU,
        &GPT_4O,
        &GPT_4O_MINI,
        &GPT_5,
        &O1_MINI,
        &O1_PREVIEW,
        &O3_MINI,
        &DEEPSEEK_R1,
        &GROK_3,
        &GROK_4,
        &GEMINI_1_5_PRO,
        &OPENROUTER_CLAUDE_3_5_SONNET,
        &OPENROUTER_O1,
        &OPENROUTER_O1_MINI,
        &OPENROUTER_CUSTOM,
    ];
}

/// Look up a known model by its provider-side identifier.
pub fn lookup(id: &str) -> Option<&'static ModelSpec> {
    models::ALL.iter().copied().find(|m| m.id == id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_finds_registered_models() {
        let spec = lookup("claude-3-5-sonnet-20241022").unwrap();
        assert_eq!(spec.family, ProviderFamily::Anthropic);
        assert!(spec.supports_vision);
        assert!(lookup("not-a-model").is_none());
    }

    #[test]
    fn reasoning_models_are_text_only() {
        assert!(models::O1_MINI.text_only());
        assert!(models::CLAUDE_3_5_HAIKU.text_only());
        assert!(!models::GPT_4O.text_only());
    }

    #[test]
    fn deepseek_budget_is_dynamic() {
        assert_eq!(models::DEEPSEEK_R1.context_window, Some(65_536));
        assert!(models::GPT_4O.context_window.is_none());
    }
}
