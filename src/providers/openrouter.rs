//! OpenRouter adapter.
//!
//! Chat-completions dialect against `openrouter.ai` or any compatible local
//! gateway (base URL is overridable). An empty `choices` array is treated as
//! fatal misconfiguration: the full outbound conversation is dumped to a
//! diagnostic file before the error surfaces.

use async_trait::async_trait;
use secrecy::SecretString;
use serde_json::{Value, json};

use crate::error::LlmError;
use crate::types::{Conversation, ModelSpec, ProviderFamily, Sample};

use super::openai::CompatEngine;
use super::{ProviderAdapter, SendOptions};

/// Where the outbound conversation lands when the provider returns no
/// choices.
pub const DIAGNOSTIC_DUMP_PATH: &str = "messages.json";

pub struct OpenRouterAdapter {
    engine: CompatEngine,
}

impl OpenRouterAdapter {
    pub const BASE_URL: &'static str = "https://openrouter.ai/api/v1";

    pub fn new(http: reqwest::Client, api_key: SecretString, base_url: Option<String>) -> Self {
        Self {
            engine: CompatEngine {
                provider: "openrouter",
                http,
                base_url: base_url.unwrap_or_else(|| Self::BASE_URL.to_string()),
                api_key,
                timeout: ProviderFamily::OpenRouter.request_timeout(),
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
        let projected;
        let conversation = if model.text_only() {
            projected = conversation.text_only();
            &projected
        } else {
            conversation
        };
        let mut body = json!({
            "model": model.id,
            "messages": super::openai::wire_messages(conversation, "system"),
            "max_tokens": opts.max_tokens_override.unwrap_or(model.max_output_tokens),
        });
        if !model.reasoning {
            body["temperature"] = json!(temperature);
        }
        if opts.streaming() {
            body["stream"] = json!(true);
            body["stream_options"] = json!({ "include_usage": true });
        }
        body
    }

    fn dump_conversation(&self, body: &Value) {
        let messages = body.get("messages").cloned().unwrap_or(Value::Null);
        match serde_json::to_string_pretty(&messages) {
            Ok(rendered) => {
                if let Err(e) = std::fs::write(DIAGNOSTIC_DUMP_PATH, rendered) {
                    tracing::warn!(error = %e, "failed to write diagnostic dump");
                } else {
                    tracing::warn!(path = DIAGNOSTIC_DUMP_PATH, "dumped outbound conversation");
                }
            }
            Err(e) => tracing::warn!(error = %e, "failed to serialize diagnostic dump"),
        }
    }
}

#[async_trait]
impl ProviderAdapter for OpenRouterAdapter {
    fn family(&self) -> ProviderFamily {
        ProviderFamily::OpenRouter
    }

    async fn send(
        &self,
        conversation: &Conversation,
        model: &ModelSpec,
        temperature: f32,
        opts: SendOptions<'_>,
    ) -> Result<Sample, LlmError> {
        let streaming = opts.streaming();
        let body = self.request_body(conversation, model, temperature, &opts);
        let result = self.engine.chat(&body, opts.sink).await;

        match result {
            Err(err @ LlmError::NoChoicesReturned { .. }) => {
                self.dump_conversation(&body);
                Err(err)
            }
            // A streamed exchange that produced no content at all is the
            // streaming shape of the same misconfiguration.
            Ok(sample) if streaming && sample.text.is_empty() => {
                self.dump_conversation(&body);
                Err(LlmError::NoChoicesReturned {
                    provider: "openrouter",
                })
            }
            other => other,
        }
    }
}
