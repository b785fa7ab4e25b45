//! Anthropic adapter.
//!
//! Translation notes: the leading system message moves into the request's
//! `system` field; image parts are re-encoded into Anthropic's base64 source
//! blocks; cache hints become `cache_control` markers, capped at two outside
//! the final content part, which is always marked so the provider caches the
//! whole prefix.

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures_util::StreamExt;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::error::LlmError;
use crate::sink::DeltaSink;
use crate::types::{
    ContentPart, Conversation, MessageRole, ModelSpec, ProviderFamily, Sample, TokenUsage,
};

use super::{ProviderAdapter, SendOptions, openai::transport_error};

const API_VERSION: &str = "2023-06-01";
const CACHE_BETA: &str = "prompt-caching-2024-07-31";
/// Cache hints kept outside the final content part.
const MAX_EARLY_CACHE_HINTS: usize = 2;

fn part_json(part: &ContentPart, cache_hint: bool) -> Value {
    let mut value = match part {
        ContentPart::Text { text, .. } => json!({ "type": "text", "text": text }),
        ContentPart::Image { data, .. } => json!({
            "type": "image",
            "source": {
                "type": "base64",
                "media_type": "image/png",
                "data": data,
            }
        }),
    };
    if cache_hint {
        value["cache_control"] = json!({ "type": "ephemeral" });
    }
    value
}

/// Translate a conversation into the `(system, messages)` request halves.
fn translate(conversation: &Conversation) -> (Vec<Value>, Vec<Value>) {
    let (system, rest) = conversation.split_system();

    let system_parts: Vec<Value> = system
        .map(|m| {
            m.content
                .iter()
                .map(|p| part_json(p, p.cache_hint()))
                .collect()
        })
        .unwrap_or_default();

    let mut early_hints = 0usize;
    let last_message = rest.len().checked_sub(1);
    let messages = rest
        .iter()
        .enumerate()
        .map(|(mi, message)| {
            let role = match message.role {
                MessageRole::Assistant => "assistant",
                _ => "user",
            };
            let last_part = message.content.len().checked_sub(1);
            let parts: Vec<Value> = message
                .content
                .iter()
                .enumerate()
                .map(|(pi, part)| {
                    let is_final = last_message == Some(mi) && last_part == Some(pi);
                    let hint = if is_final {
                        // The final part always carries a hint so the full
                        // prefix is cacheable on the next turn.
                        true
                    } else if part.cache_hint() && early_hints < MAX_EARLY_CACHE_HINTS {
                        early_hints += 1;
                        true
                    } else {
                        false
                    };
                    part_json(part, hint)
                })
                .collect();
            json!({ "role": role, "content": parts })
        })
        .collect();

    (system_parts, messages)
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    #[serde(default)]
    content: Vec<WireBlock>,
    #[serde(default)]
    usage: WireUsage,
}

#[derive(Debug, Deserialize)]
struct WireBlock {
    #[serde(rename = "type")]
    kind: String,
    text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct WireUsage {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
    #[serde(default)]
    cache_creation_input_tokens: u64,
    #[serde(default)]
    cache_read_input_tokens: u64,
}

impl WireUsage {
    /// Anthropic already reports billed input and cached reads separately;
    /// no subtraction needed.
    fn normalize(&self) -> TokenUsage {
        TokenUsage {
            cache_creation_tokens: self.cache_creation_input_tokens,
            cache_read_tokens: self.cache_read_input_tokens,
            input_tokens: self.input_tokens,
            output_tokens: self.output_tokens,
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireErrorEnvelope {
    error: Option<WireErrorBody>,
}

#[derive(Debug, Deserialize)]
struct WireErrorBody {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    message: String,
}

fn classify(status: u16, body: &str) -> LlmError {
    let parsed: Option<WireErrorBody> = serde_json::from_str::<WireErrorEnvelope>(body)
        .ok()
        .and_then(|e| e.error);
    let (kind, message) = parsed
        .map(|e| (e.kind, e.message))
        .unwrap_or_else(|| (String::new(), body.chars().take(240).collect()));
    classify_error(status, &kind, message)
}

/// Anthropic's error envelope carries its own `type`; classification trusts
/// it over the HTTP status, which some gateways rewrite.
fn classify_error(status: u16, kind: &str, message: String) -> LlmError {
    let provider = "anthropic";
    match kind {
        "authentication_error" | "permission_error" => {
            LlmError::AuthInvalid { provider, message }
        }
        "rate_limit_error" => LlmError::RateLimited { provider, message },
        "invalid_request_error" if message.contains("prompt is too long") => {
            LlmError::ContextLengthExceeded {
                provider,
                prompt_tokens: None,
                message,
            }
        }
        _ => match status {
            401 | 403 => LlmError::AuthInvalid { provider, message },
            429 => LlmError::RateLimited { provider, message },
            _ => LlmError::Transient {
                provider,
                status: Some(status),
                message,
            },
        },
    }
}

// Streaming wire shapes. Usage arrives split across `message_start`
// (input side) and `message_delta` (output side); fields merge as seen.

#[derive(Debug, Deserialize)]
struct StreamEvent {
    #[serde(rename = "type")]
    kind: String,
    message: Option<StreamMessage>,
    delta: Option<StreamDelta>,
    usage: Option<StreamUsage>,
    error: Option<WireErrorBody>,
}

#[derive(Debug, Deserialize)]
struct StreamMessage {
    usage: Option<StreamUsage>,
}

#[derive(Debug, Default, Deserialize)]
struct StreamDelta {
    text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct StreamUsage {
    input_tokens: Option<u64>,
    output_tokens: Option<u64>,
    cache_creation_input_tokens: Option<u64>,
    cache_read_input_tokens: Option<u64>,
}

fn merge_usage(into: &mut TokenUsage, from: &StreamUsage) {
    if let Some(v) = from.input_tokens {
        into.input_tokens = v;
    }
    if let Some(v) = from.output_tokens {
        into.output_tokens = v;
    }
    if let Some(v) = from.cache_creation_input_tokens {
        into.cache_creation_tokens = v;
    }
    if let Some(v) = from.cache_read_input_tokens {
        into.cache_read_tokens = v;
    }
}

pub struct AnthropicAdapter {
    http: reqwest::Client,
    api_key: SecretString,
    base_url: String,
}

impl AnthropicAdapter {
    pub const BASE_URL: &'static str = "https://api.anthropic.com";

    pub fn new(http: reqwest::Client, api_key: SecretString) -> Self {
        Self {
            http,
            api_key,
            base_url: Self::BASE_URL.to_string(),
        }
    }

    fn request(&self, body: &Value) -> reqwest::RequestBuilder {
        self.http
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", self.api_key.expose_secret())
            .header("anthropic-version", API_VERSION)
            .header("anthropic-beta", CACHE_BETA)
            .timeout(ProviderFamily::Anthropic.request_timeout())
            .json(body)
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
        let (system, messages) = translate(conversation);
        let mut body = json!({
            "model": model.id,
            "messages": messages,
            "max_tokens": opts.max_tokens_override.unwrap_or(model.max_output_tokens),
            "temperature": temperature,
        });
        if !system.is_empty() {
            body["system"] = Value::Array(system);
        }
        if opts.streaming() {
            body["stream"] = json!(true);
        }
        body
    }

    async fn consume_stream(
        &self,
        response: reqwest::Response,
        mut sink: Option<&mut (dyn DeltaSink + 'static)>,
    ) -> Result<Sample, LlmError> {
        let mut text = String::new();
        let mut usage = TokenUsage::default();

        let mut events = response.bytes_stream().eventsource();
        while let Some(event) = events.next().await {
            let event = event.map_err(|e| LlmError::Transient {
                provider: "anthropic",
                status: None,
                message: format!("stream interrupted: {e}"),
            })?;
            let parsed: StreamEvent =
                serde_json::from_str(&event.data).map_err(|e| LlmError::MalformedResponse {
                    provider: "anthropic",
                    message: format!("bad stream event: {e}"),
                })?;
            match parsed.kind.as_str() {
                "message_start" => {
                    if let Some(stream_usage) = parsed.message.and_then(|m| m.usage) {
                        merge_usage(&mut usage, &stream_usage);
                    }
                }
                "content_block_delta" => {
                    if let Some(fragment) = parsed.delta.and_then(|d| d.text) {
                        text.push_str(&fragment);
                        if let Some(sink) = sink.as_deref_mut() {
                            sink.on_delta(&fragment);
                        }
                    }
                }
                "message_delta" => {
                    if let Some(stream_usage) = &parsed.usage {
                        merge_usage(&mut usage, stream_usage);
                    }
                }
                "message_stop" => break,
                "error" => {
                    let body = parsed.error.unwrap_or(WireErrorBody {
                        kind: "api_error".into(),
                        message: "stream error".into(),
                    });
                    return Err(classify_error(500, &body.kind, body.message));
                }
                // ping, content_block_start, content_block_stop
                _ => {}
            }
        }
        if let Some(sink) = sink.as_deref_mut() {
            sink.finish();
        }
        Ok(Sample::new(text, usage))
    }
}

#[async_trait]
impl ProviderAdapter for AnthropicAdapter {
    fn family(&self) -> ProviderFamily {
        ProviderFamily::Anthropic
    }

    async fn send(
        &self,
        conversation: &Conversation,
        model: &ModelSpec,
        temperature: f32,
        opts: SendOptions<'_>,
    ) -> Result<Sample, LlmError> {
        let body = self.request_body(conversation, model, temperature, &opts);
        let response = self
            .request(&body)
            .send()
            .await
            .map_err(|e| transport_error("anthropic", &e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify(status.as_u16(), &body));
        }

        if opts.streaming() {
            return self.consume_stream(response, opts.sink).await;
        }

        let wire: WireResponse = response
            .json()
            .await
            .map_err(|e| LlmError::MalformedResponse {
                provider: "anthropic",
                message: e.to_string(),
            })?;
        // The text block of interest is the last one; thinking blocks and
        // other block kinds precede it.
        let text = wire
            .content
            .iter()
            .rev()
            .find(|b| b.kind == "text")
            .and_then(|b| b.text.clone())
            .ok_or(LlmError::NoChoicesReturned {
                provider: "anthropic",
            })?;
        Ok(Sample::new(text, wire.usage.normalize()))
    }
}
