//! xAI adapter.
//!
//! Grok models speak the chat-completions dialect at `api.x.ai` with a very
//! large output ceiling and a very long request timeout; the family's retry
//! policy performs no retries.

use async_trait::async_trait;
use secrecy::SecretString;
use serde_json::{Value, json};

use crate::error::LlmError;
use crate::types::{Conversation, ModelSpec, ProviderFamily, Sample};

use super::openai::CompatEngine;
use super::{ProviderAdapter, SendOptions};

pub struct XaiAdapter {
    engine: CompatEngine,
}

impl XaiAdapter {
    pub const BASE_URL: &'static str = "https://api.x.ai/v1";

    pub fn new(http: reqwest::Client, api_key: SecretString) -> Self {
        Self {
            engine: CompatEngine {
                provider: "xai",
                http,
                base_url: Self::BASE_URL.to_string(),
                api_key,
                timeout: ProviderFamily::Xai.request_timeout(),
            },
        }
    }

    fn request_body(
        &self,
        conversation: &Conversation,
        model: &ModelSpec,
        temperature: f32,
        opts: &SendOptions<'_>,
    ) -> Value {
        let mut body = json!({
            "model": model.id,
            "messages": super::openai::wire_messages(conversation, "system"),
            "max_tokens": opts.max_tokens_override.unwrap_or(model.max_output_tokens),
            "temperature": temperature,
        });
        if opts.streaming() {
            body["stream"] = json!(true);
            body["stream_options"] = json!({ "include_usage": true });
        }
        body
    }
}

#[async_trait]
impl ProviderAdapter for XaiAdapter {
    fn family(&self) -> ProviderFamily {
        ProviderFamily::Xai
    }

    async fn send(
        &self,
        conversation: &Conversation,
        model: &ModelSpec,
        temperature: f32,
        opts: SendOptions<'_>,
    ) -> Result<Sample, LlmError> {
        let body = self.request_body(conversation, model, temperature, &opts);
        self.engine.chat(&body, opts.sink).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ChatMessage, models};

    #[test]
    fn grok_request_carries_large_output_ceiling() {
        let adapter = XaiAdapter::new(
            reqwest::Client::new(),
            SecretString::from("test-key".to_string()),
        );
        let convo = Conversation::new(vec![ChatMessage::user("q")]).unwrap();
        let body = adapter.request_body(&convo, &models::GROK_4, 0.5, &SendOptions::batch());
        assert_eq!(body["max_tokens"], 120_000);
        assert_eq!(body["model"], "grok-4");
        assert_eq!(body["temperature"], 0.5);
    }
}
