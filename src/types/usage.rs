//! Normalized token accounting.

use serde::{Deserialize, Serialize};

/// Token usage for one attempt, normalized across providers.
///
/// Invariant: cached tokens are counted in `cache_read_tokens` only, never
/// double-counted into `input_tokens`. Providers that report a raw prompt
/// total including cached tokens go through [`TokenUsage::from_prompt_total`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub cache_creation_tokens: u64,
    pub cache_read_tokens: u64,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl TokenUsage {
    /// Normalize a raw `prompt_tokens` count that includes cached tokens.
    pub fn from_prompt_total(prompt_tokens: u64, cached_tokens: u64, output_tokens: u64) -> Self {
        Self {
            cache_creation_tokens: 0,
            cache_read_tokens: cached_tokens,
            input_tokens: prompt_tokens.saturating_sub(cached_tokens),
            output_tokens,
        }
    }

    /// All tokens billed for the attempt, cached reads included.
    pub fn total(&self) -> u64 {
        self.cache_creation_tokens + self.cache_read_tokens + self.input_tokens
            + self.output_tokens
    }
}

impl std::fmt::Display for TokenUsage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "in={} out={} cache_read={} cache_write={}",
            self.input_tokens, self.output_tokens, self.cache_read_tokens,
            self.cache_creation_tokens
        )
    }
}

/// One successful sample: final text plus its usage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sample {
    pub text: String,
    pub usage: TokenUsage,
}

impl Sample {
    pub fn new(text: impl Into<String>, usage: TokenUsage) -> Self {
        Self {
            text: text.into(),
            usage,
        }
    }
}
