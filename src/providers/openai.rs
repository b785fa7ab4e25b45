//! OpenAI adapter and the shared chat-completions wire engine.
//!
//! Several backends (OpenAI, DeepSeek, OpenRouter, xAI) speak the same
//! chat-completions dialect; [`CompatEngine`] owns that wire format once —
//! request dispatch, SSE consumption, status classification, and usage
//! normalization — and each adapter layers its own request shaping and
//! response post-processing on top.

use std::time::Duration;

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures_util::StreamExt;
use lazy_static::lazy_static;
use regex::Regex;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::error::LlmError;
use crate::sink::DeltaSink;
use crate::types::{Conversation, MessageRole, ModelSpec, ProviderFamily, Sample, TokenUsage};

use super::{ProviderAdapter, SendOptions};

/// Raw usage block of the chat-completions dialect.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct WireUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
    #[serde(default)]
    prompt_tokens_details: Option<WirePromptDetails>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct WirePromptDetails {
    #[serde(default)]
    cached_tokens: Option<u64>,
}

impl WireUsage {
    /// Cached tokens are included in `prompt_tokens` on this wire; split them
    /// out so they are never double-counted.
    pub(crate) fn normalize(&self) -> TokenUsage {
        let cached = self
            .prompt_tokens_details
            .as_ref()
            .and_then(|d| d.cached_tokens)
            .unwrap_or(0);
        TokenUsage::from_prompt_total(self.prompt_tokens, cached, self.completion_tokens)
    }
}

#[derive(Debug, Deserialize)]
struct WireCompletion {
    #[serde(default)]
    choices: Vec<WireChoice>,
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
struct WireChoice {
    message: WireMessage,
}

#[derive(Debug, Deserialize)]
struct WireMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireChunk {
    #[serde(default)]
    choices: Vec<WireChunkChoice>,
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
struct WireChunkChoice {
    #[serde(default)]
    delta: WireChunkDelta,
}

#[derive(Debug, Default, Deserialize)]
struct WireChunkDelta {
    content: Option<String>,
}

/// Build chat-completions `messages` from a conversation.
///
/// A leading system message is renamed to `system_role` (OpenAI expects
/// `developer`, the compatible gateways expect `system`). Single-text
/// messages serialize as plain string content; multimodal messages as typed
/// part arrays. Cache hints have no wire representation here — these
/// backends cache prompt prefixes implicitly — so they are dropped.
pub(crate) fn wire_messages(conversation: &Conversation, system_role: &str) -> Vec<Value> {
    conversation
        .messages()
        .iter()
        .map(|message| {
            let role = match message.role {
                MessageRole::System => system_role,
                MessageRole::User => "user",
                MessageRole::Assistant => "assistant",
            };
            let content = match message.content.as_slice() {
                [part] if part.as_text().is_some() => {
                    Value::String(part.as_text().unwrap_or_default().to_string())
                }
                parts => Value::Array(
                    parts
                        .iter()
                        .map(|part| match part {
                            crate::types::ContentPart::Text { text, .. } => {
                                json!({ "type": "text", "text": text })
                            }
                            crate::types::ContentPart::Image { data, .. } => json!({
                                "type": "image_url",
                                "image_url": { "url": format!("data:image/png;base64,{data}") }
                            }),
                        })
                        .collect(),
                ),
            };
            json!({ "role": role, "content": content })
        })
        .collect()
}

lazy_static! {
    // DeepSeek reports the offending prompt size as
    // "... you requested 70000 tokens (66000 in the messages ...".
    static ref REPORTED_PROMPT_TOKENS: Regex =
        Regex::new(r"tokens \((\d+) in the messages").expect("static regex");
}

/// Prompt-token count recovered from a context-overflow error body, if the
/// provider reported one.
pub(crate) fn reported_prompt_tokens(body: &str) -> Option<u32> {
    REPORTED_PROMPT_TOKENS
        .captures(body)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

fn excerpt(body: &str) -> String {
    body.chars().take(240).collect()
}

/// Map a non-success HTTP exchange to a classified error.
pub(crate) fn classify_status(provider: &'static str, status: u16, body: &str) -> LlmError {
    match status {
        401 | 403 => LlmError::AuthInvalid {
            provider,
            message: excerpt(body),
        },
        429 => LlmError::RateLimited {
            provider,
            message: excerpt(body),
        },
        400 if body.contains("context length") || body.contains("context_length") => {
            LlmError::ContextLengthExceeded {
                provider,
                prompt_tokens: reported_prompt_tokens(body),
                message: excerpt(body),
            }
        }
        _ => LlmError::Transient {
            provider,
            status: Some(status),
            message: excerpt(body),
        },
    }
}

pub(crate) fn transport_error(provider: &'static str, err: &reqwest::Error) -> LlmError {
    LlmError::Transient {
        provider,
        status: err.status().map(|s| s.as_u16()),
        message: err.to_string(),
    }
}

/// Shared transport for the chat-completions dialect.
pub(crate) struct CompatEngine {
    pub provider: &'static str,
    pub http: reqwest::Client,
    pub base_url: String,
    pub api_key: SecretString,
    pub timeout: Duration,
}

impl CompatEngine {
    /// Issue one chat exchange. Streams when the body says `"stream": true`,
    /// forwarding text deltas to `sink` as they arrive.
    pub(crate) async fn chat(
        &self,
        body: &Value,
        sink: Option<&mut (dyn DeltaSink + 'static)>,
    ) -> Result<Sample, LlmError> {
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        let streaming = body
            .get("stream")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        let response = self
            .http
            .post(&url)
            .bearer_auth(self.api_key.expose_secret())
            .timeout(self.timeout)
            .json(body)
            .send()
            .await
            .map_err(|e| transport_error(self.provider, &e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(self.provider, status.as_u16(), &body));
        }

        if streaming {
            self.consume_stream(response, sink).await
        } else {
            self.consume_batch(response).await
        }
    }

    async fn consume_batch(&self, response: reqwest::Response) -> Result<Sample, LlmError> {
        let completion: WireCompletion =
            response
                .json()
                .await
                .map_err(|e| LlmError::MalformedResponse {
                    provider: self.provider,
                    message: e.to_string(),
                })?;

        let Some(choice) = completion.choices.first() else {
            return Err(LlmError::NoChoicesReturned {
                provider: self.provider,
            });
        };
        let text = choice
            .message
            .content
            .clone()
            .ok_or(LlmError::MalformedResponse {
                provider: self.provider,
                message: "choice carried no content".into(),
            })?;
        let usage = completion
            .usage
            .map(|u| u.normalize())
            .unwrap_or_default();
        Ok(Sample::new(text, usage))
    }

    async fn consume_stream(
        &self,
        response: reqwest::Response,
        mut sink: Option<&mut (dyn DeltaSink + 'static)>,
    ) -> Result<Sample, LlmError> {
        let mut text = String::new();
        let mut usage = TokenUsage::default();
        let mut chunk_count = 0u64;

        let mut events = response.bytes_stream().eventsource();
        while let Some(event) = events.next().await {
            let event = event.map_err(|e| LlmError::Transient {
                provider: self.provider,
                status: None,
                message: format!("stream interrupted: {e}"),
            })?;
            if event.data.trim() == "[DONE]" {
                break;
            }
            let chunk: WireChunk =
                serde_json::from_str(&event.data).map_err(|e| LlmError::MalformedResponse {
                    provider: self.provider,
                    message: format!("bad stream chunk: {e}"),
                })?;
            chunk_count += 1;
            if chunk_count % 100 == 0 {
                tracing::debug!(provider = self.provider, chunk_count, "stream progress");
            }
            if let Some(choice) = chunk.choices.first() {
                if let Some(fragment) = &choice.delta.content {
                    text.push_str(fragment);
                    if let Some(sink) = sink.as_deref_mut() {
                        sink.on_delta(fragment);
                    }
                }
            } else if let Some(wire_usage) = &chunk.usage {
                // The terminal usage chunk has an empty choices array.
                usage = wire_usage.normalize();
            }
        }
        if let Some(sink) = sink.as_deref_mut() {
            sink.finish();
        }
        Ok(Sample::new(text, usage))
    }
}

/// OpenAI adapter.
///
/// System role is renamed to `developer`; reasoning-tuned variants forbid a
/// temperature parameter (omitted, never defaulted) and are sent text-only.
pub struct OpenAiAdapter {
    engine: CompatEngine,
}

impl OpenAiAdapter {
    pub const BASE_URL: &'static str = "https://api.openai.com/v1";

    pub fn new(http: reqwest::Client, api_key: SecretString) -> Self {
        Self {
            engine: CompatEngine {
                provider: "openai",
                http,
                base_url: Self::BASE_URL.to_string(),
                api_key,
                timeout: ProviderFamily::OpenAi.request_timeout(),
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
            "messages": wire_messages(conversation, "developer"),
            "max_completion_tokens": opts.max_tokens_override.unwrap_or(model.max_output_tokens),
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
}

#[async_trait]
impl ProviderAdapter for OpenAiAdapter {
    fn family(&self) -> ProviderFamily {
        ProviderFamily::OpenAi
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

    fn convo() -> Conversation {
        Conversation::new(vec![
            ChatMessage::system("solve puzzles"),
            ChatMessage::user("here").with_image("aWicZQ=="),
        ])
        .unwrap()
    }

    #[test]
    fn system_renamed_to_developer() {
        let messages = wire_messages(&convo(), "developer");
        assert_eq!(messages[0]["role"], "developer");
        assert_eq!(messages[0]["content"], "solve puzzles");
    }

    #[test]
    fn multimodal_content_uses_typed_parts() {
        let messages = wire_messages(&convo(), "developer");
        let parts = messages[1]["content"].as_array().unwrap();
        assert_eq!(parts[0]["type"], "text");
        assert_eq!(parts[1]["type"], "image_url");
        assert_eq!(
            parts[1]["image_url"]["url"],
            "data:image/png;base64,aWicZQ=="
        );
    }

    #[test]
    fn reasoning_models_omit_temperature_and_images() {
        let adapter = OpenAiAdapter::new(
            reqwest::Client::new(),
            SecretString::from("test-key".to_string()),
        );
        let body = adapter.request_body(&convo(), &models::O1_MINI, 0.7, &SendOptions::batch());
        assert!(body.get("temperature").is_none());
        // Text-only projection: image part gone, content collapsed to string.
        assert_eq!(body["messages"][1]["content"], "here");
        assert_eq!(body["max_completion_tokens"], 16_384);
    }

    #[test]
    fn standard_models_carry_temperature() {
        let adapter = OpenAiAdapter::new(
            reqwest::Client::new(),
            SecretString::from("test-key".to_string()),
        );
        let body = adapter.request_body(&convo(), &models::GPT_4O, 0.7, &SendOptions::batch());
        assert_eq!(body["temperature"], 0.7);
    }

    #[test]
    fn usage_normalization_subtracts_cached_tokens() {
        let wire: WireUsage = serde_json::from_value(json!({
            "prompt_tokens": 100,
            "completion_tokens": 5,
            "prompt_tokens_details": { "cached_tokens": 40 }
        }))
        .unwrap();
        let usage = wire.normalize();
        assert_eq!(usage.input_tokens, 60);
        assert_eq!(usage.cache_read_tokens, 40);
        assert_eq!(usage.output_tokens, 5);
    }

    #[test]
    fn status_classification_table() {
        assert!(matches!(
            classify_status("openai", 401, "bad key"),
            LlmError::AuthInvalid { .. }
        ));
        assert!(matches!(
            classify_status("openai", 429, "slow down"),
            LlmError::RateLimited { .. }
        ));
        assert!(matches!(
            classify_status("openai", 503, "overloaded"),
            LlmError::Transient {
                status: Some(503),
                ..
            }
        ));
        let overflow = classify_status(
            "deepseek",
            400,
            "This model's maximum context length is 65536 tokens. However, you requested \
             70000 tokens (66000 in the messages), Please reduce the length.",
        );
        match overflow {
            LlmError::ContextLengthExceeded { prompt_tokens, .. } => {
                assert_eq!(prompt_tokens, Some(66_000));
            }
            other => panic!("expected context overflow, got {other:?}"),
        }
    }
}
