//! Error taxonomy for provider calls.
//!
//! Adapters classify failures at the transport boundary, so downstream code
//! (retry controller, orchestrator) branches on variants instead of scraping
//! error text.

use thiserror::Error;

/// Classified failure of one provider attempt.
#[derive(Debug, Clone, Error)]
pub enum LlmError {
    /// Provider signalled request throttling (HTTP 429 or equivalent).
    #[error("{provider} rate limited: {message}")]
    RateLimited {
        provider: &'static str,
        message: String,
    },

    /// Credential rejected by the provider. Never retried.
    #[error("{provider} authentication rejected: {message}")]
    AuthInvalid {
        provider: &'static str,
        message: String,
    },

    /// The prompt does not fit the model's context window.
    ///
    /// `prompt_tokens` is the provider-reported prompt size when it could be
    /// recovered from the error body; the retry controller uses it to shrink
    /// the output budget once.
    #[error("{provider} context length exceeded: {message}")]
    ContextLengthExceeded {
        provider: &'static str,
        prompt_tokens: Option<u32>,
        message: String,
    },

    /// Server-side or network failure expected to clear on its own
    /// (5xx, gateway errors, connection resets, timeouts).
    #[error("{provider} transient error: {message}")]
    Transient {
        provider: &'static str,
        status: Option<u16>,
        message: String,
    },

    /// A well-formed response that carried no completion choices.
    /// Usually misconfiguration rather than load; fatal.
    #[error("{provider} returned no choices")]
    NoChoicesReturned { provider: &'static str },

    /// Response body did not match the provider's wire schema.
    #[error("malformed {provider} response: {message}")]
    MalformedResponse {
        provider: &'static str,
        message: String,
    },

    /// Local precondition failure: bad conversation shape, missing
    /// credential, unusable sink directory.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl LlmError {
    /// Whether the retry controller may re-issue the attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited { .. }
                | Self::Transient { .. }
                | Self::ContextLengthExceeded { .. }
        )
    }

    /// Whether the failure short-circuits the whole attempt chain.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::AuthInvalid { .. } | Self::NoChoicesReturned { .. } | Self::InvalidInput(_)
        )
    }

    /// HTTP status associated with the failure, when one was observed.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::RateLimited { .. } => Some(429),
            Self::AuthInvalid { .. } => Some(401),
            Self::Transient { status, .. } => *status,
            _ => None,
        }
    }
}
