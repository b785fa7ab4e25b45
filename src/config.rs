//! Sampler configuration.
//!
//! All process-wide knobs live here and are read exactly once, at startup,
//! into an explicit config value owned by the [`Sampler`](crate::Sampler).
//! Nothing in this crate reads the environment after construction.

use std::path::PathBuf;

use secrecy::SecretString;

use crate::error::LlmError;
use crate::types::ProviderFamily;

/// Per-provider API credentials.
#[derive(Clone, Default)]
pub struct Credentials {
    pub anthropic: Option<SecretString>,
    pub openai: Option<SecretString>,
    pub deepseek: Option<SecretString>,
    pub openrouter: Option<SecretString>,
    pub xai: Option<SecretString>,
    pub gemini: Option<SecretString>,
}

impl Credentials {
    /// Credential for a provider family, or an error naming the missing key.
    pub fn for_family(&self, family: ProviderFamily) -> Result<&SecretString, LlmError> {
        let key = match family {
            ProviderFamily::Anthropic => &self.anthropic,
            ProviderFamily::OpenAi => &self.openai,
            ProviderFamily::DeepSeek => &self.deepseek,
            ProviderFamily::OpenRouter => &self.openrouter,
            ProviderFamily::Xai => &self.xai,
            ProviderFamily::Gemini => &self.gemini,
        };
        key.as_ref()
            .ok_or_else(|| LlmError::InvalidInput(format!("no API key configured for {family}")))
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fn set(v: &Option<SecretString>) -> &'static str {
            if v.is_some() { "set" } else { "unset" }
        }
        f.debug_struct("Credentials")
            .field("anthropic", &set(&self.anthropic))
            .field("openai", &set(&self.openai))
            .field("deepseek", &set(&self.deepseek))
            .field("openrouter", &set(&self.openrouter))
            .field("xai", &set(&self.xai))
            .field("gemini", &set(&self.gemini))
            .finish()
    }
}

/// Configuration for a [`Sampler`](crate::Sampler).
#[derive(Debug, Clone, Default)]
pub struct SamplerConfig {
    pub credentials: Credentials,
    /// Stream the primary attempt of single-sample calls.
    pub stream: bool,
    /// Short-circuit every attempt to a canned response with zero usage and
    /// no network activity. For deterministic tests.
    pub offline: bool,
    /// Directory for streamed-attempt transcript files. When unset, streamed
    /// deltas echo to stdout instead.
    pub transcript_dir: Option<PathBuf>,
    /// Override for the OpenRouter-compatible base URL (local gateways).
    pub openrouter_base_url: Option<String>,
}

impl SamplerConfig {
    /// Read configuration from the conventional environment variables.
    ///
    /// `*_API_KEY` per provider, `STREAM_LLM=1` to enable streaming,
    /// `NO_WIFI=1` for offline mode, `STREAM_OUTPUT_DIR` for transcripts,
    /// `LLM_BASE_URL` for an OpenRouter-compatible gateway.
    pub fn from_env() -> Self {
        fn secret(name: &str) -> Option<SecretString> {
            std::env::var(name).ok().map(SecretString::from)
        }
        fn flag(name: &str) -> bool {
            std::env::var(name).map(|v| v == "1").unwrap_or(false)
        }

        Self {
            credentials: Credentials {
                anthropic: secret("ANTHROPIC_API_KEY"),
                openai: secret("OPENAI_API_KEY"),
                deepseek: secret("DEEPSEEK_API_KEY"),
                openrouter: secret("OPENROUTER_API_KEY"),
                xai: secret("XAI_API_KEY"),
                gemini: secret("GEMINI_API_KEY"),
            },
            stream: flag("STREAM_LLM"),
            offline: flag("NO_WIFI"),
            transcript_dir: std::env::var("STREAM_OUTPUT_DIR").ok().map(PathBuf::from),
            openrouter_base_url: std::env::var("LLM_BASE_URL").ok(),
        }
    }

    pub fn with_streaming(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    pub fn with_offline(mut self, offline: bool) -> Self {
        self.offline = offline;
        self
    }

    pub fn with_transcript_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.transcript_dir = Some(dir.into());
        self
    }

    pub fn with_openrouter_base_url(mut self, url: impl Into<String>) -> Self {
        self.openrouter_base_url = Some(url.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_credential_is_an_input_error() {
        let creds = Credentials::default();
        let err = creds.for_family(ProviderFamily::Anthropic).unwrap_err();
        assert!(matches!(err, LlmError::InvalidInput(_)));
    }

    #[test]
    fn debug_never_prints_key_material() {
        let creds = Credentials {
            openai: Some(SecretString::from("sk-very-secret".to_string())),
            ..Default::default()
        };
        let rendered = format!("{creds:?}");
        assert!(!rendered.contains("sk-very-secret"));
        assert!(rendered.contains("openai: \"set\""));
    }
}
