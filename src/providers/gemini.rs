//! Gemini adapter.
//!
//! Non-streaming `generateContent` exchange. Translation: the leading system
//! message becomes `systemInstruction`, the assistant role is renamed
//! `model`, images become `inlineData` parts, and sampling parameters nest
//! under `generationConfig`.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::error::LlmError;
use crate::types::{
    ContentPart, Conversation, MessageRole, ModelSpec, ProviderFamily, Sample, TokenUsage,
};

use super::{ProviderAdapter, SendOptions, openai::transport_error};

fn part_json(part: &ContentPart) -> Value {
    match part {
        ContentPart::Text { text, .. } => json!({ "text": text }),
        ContentPart::Image { data, .. } => json!({
            "inlineData": { "mimeType": "image/png", "data": data }
        }),
    }
}

/// Translate a conversation into `(systemInstruction, contents)`.
fn translate(conversation: &Conversation) -> (Option<Value>, Vec<Value>) {
    let (system, rest) = conversation.split_system();
    let instruction = system.map(|m| {
        json!({
            "parts": m.content.iter().map(part_json).collect::<Vec<_>>()
        })
    });
    let contents = rest
        .iter()
        .map(|message| {
            let role = match message.role {
                MessageRole::Assistant => "model",
                _ => "user",
            };
            json!({
                "role": role,
                "parts": message.content.iter().map(part_json).collect::<Vec<_>>(),
            })
        })
        .collect();
    (instruction, contents)
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    #[serde(default)]
    candidates: Vec<WireCandidate>,
    #[serde(rename = "usageMetadata", default)]
    usage: WireUsageMetadata,
}

#[derive(Debug, Deserialize)]
struct WireCandidate {
    content: Option<WireContent>,
}

#[derive(Debug, Deserialize)]
struct WireContent {
    #[serde(default)]
    parts: Vec<WirePart>,
}

#[derive(Debug, Deserialize)]
struct WirePart {
    text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct WireUsageMetadata {
    #[serde(rename = "promptTokenCount", default)]
    prompt_token_count: u64,
    #[serde(rename = "candidatesTokenCount", default)]
    candidates_token_count: u64,
    #[serde(rename = "cachedContentTokenCount", default)]
    cached_content_token_count: u64,
}

impl WireUsageMetadata {
    fn normalize(&self) -> TokenUsage {
        TokenUsage::from_prompt_total(
            self.prompt_token_count,
            self.cached_content_token_count,
            self.candidates_token_count,
        )
    }
}

fn classify(status: u16, body: &str) -> LlmError {
    let provider = "gemini";
    let message: String = body.chars().take(240).collect();
    match status {
        401 | 403 => LlmError::AuthInvalid { provider, message },
        429 => LlmError::RateLimited { provider, message },
        _ => LlmError::Transient {
            provider,
            status: Some(status),
            message,
        },
    }
}

pub struct GeminiAdapter {
    http: reqwest::Client,
    api_key: SecretString,
    base_url: String,
}

impl GeminiAdapter {
    pub const BASE_URL: &'static str = "https://generativelanguage.googleapis.com";

    pub fn new(http: reqwest::Client, api_key: SecretString) -> Self {
        Self {
            http,
            api_key,
            base_url: Self::BASE_URL.to_string(),
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
        let (instruction, contents) = translate(conversation);
        let mut body = json!({
            "contents": contents,
            "generationConfig": {
                "temperature": temperature,
                "maxOutputTokens": opts.max_tokens_override.unwrap_or(model.max_output_tokens),
            }
        });
        if let Some(instruction) = instruction {
            body["systemInstruction"] = instruction;
        }
        body
    }
}

#[async_trait]
impl ProviderAdapter for GeminiAdapter {
    fn family(&self) -> ProviderFamily {
        ProviderFamily::Gemini
    }

    async fn send(
        &self,
        conversation: &Conversation,
        model: &ModelSpec,
        temperature: f32,
        opts: SendOptions<'_>,
    ) -> Result<Sample, LlmError> {
        let body = self.request_body(conversation, model, temperature, &opts);
        let url = format!("{}/v1beta/models/{}:generateContent", self.base_url, model.id);
        let response = self
            .http
            .post(url)
            .header("x-goog-api-key", self.api_key.expose_secret())
            .timeout(ProviderFamily::Gemini.request_timeout())
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error("gemini", &e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify(status.as_u16(), &body));
        }

        let wire: WireResponse = response
            .json()
            .await
            .map_err(|e| LlmError::MalformedResponse {
                provider: "gemini",
                message: e.to_string(),
            })?;

        let Some(candidate) = wire.candidates.first() else {
            return Err(LlmError::NoChoicesReturned { provider: "gemini" });
        };
        let text: String = candidate
            .content
            .as_ref()
            .map(|c| {
                c.parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        let sample = Sample::new(text, wire.usage.normalize());
        // This family never streams, but honor a sink if one was attached so
        // transcripts still capture the body.
        if let SendOptions {
            sink: Some(sink), ..
        } = opts
        {
            sink.on_delta(&sample.text);
            sink.finish();
        }
        Ok(sample)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ChatMessage;

    #[test]
    fn assistant_role_renamed_to_model() {
        let convo = Conversation::new(vec![
            ChatMessage::system("sys"),
            ChatMessage::user("u"),
            ChatMessage::assistant("a"),
        ])
        .unwrap();
        let (instruction, contents) = translate(&convo);
        assert_eq!(instruction.unwrap()["parts"][0]["text"], "sys");
        assert_eq!(contents[0]["role"], "user");
        assert_eq!(contents[1]["role"], "model");
    }

    #[test]
    fn images_become_inline_data() {
        let convo = Conversation::new(vec![ChatMessage::user("see").with_image("aW1n")]).unwrap();
        let (_, contents) = translate(&convo);
        let part = &contents[0]["parts"][1];
        assert_eq!(part["inlineData"]["mimeType"], "image/png");
        assert_eq!(part["inlineData"]["data"], "aW1n");
    }

    #[test]
    fn usage_subtracts_cached_content() {
        let wire: WireUsageMetadata = serde_json::from_value(json!({
            "promptTokenCount": 120,
            "candidatesTokenCount": 30,
            "cachedContentTokenCount": 100,
        }))
        .unwrap();
        let usage = wire.normalize();
        assert_eq!(usage.input_tokens, 20);
        assert_eq!(usage.cache_read_tokens, 100);
        assert_eq!(usage.output_tokens, 30);
    }
}
