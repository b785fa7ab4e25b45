//! DeepSeek adapter.
//!
//! Chat-completions dialect with two quirks: the model shares a 65k context
//! window between prompt and completion, so context overflows are recoverable
//! by shrinking the output budget (the overflow error reports the prompt
//! size, surfaced through [`LlmError::ContextLengthExceeded`]); and reasoning
//! output arrives wrapped in `<think>` markup that must be stripped before
//! the text is returned.

use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use secrecy::SecretString;
use serde_json::{Value, json};

use crate::error::LlmError;
use crate::types::{Conversation, ModelSpec, ProviderFamily, Sample};

use super::openai::CompatEngine;
use super::{ProviderAdapter, SendOptions};

lazy_static! {
    static ref THINK_REGION: Regex = Regex::new(r"(?s)<think>.*?</think>").expect("static regex");
}

/// Remove `<think>…</think>` regions from model output.
pub(crate) fn strip_thinking(text: &str) -> String {
    THINK_REGION.replace_all(text, "").into_owned()
}

pub struct DeepSeekAdapter {
    engine: CompatEngine,
}

impl DeepSeekAdapter {
    pub const BASE_URL: &'static str = "https://api.deepseek.com";

    pub fn new(http: reqwest::Client, api_key: SecretString) -> Self {
        Self {
            engine: CompatEngine {
                provider: "deepseek",
                http,
                base_url: Self::BASE_URL.to_string(),
                api_key,
                timeout: ProviderFamily::DeepSeek.request_timeout(),
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
        let projected = conversation.text_only();
        let mut body = json!({
            "model": model.id,
            "messages": super::openai::wire_messages(&projected, "system"),
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
impl ProviderAdapter for DeepSeekAdapter {
    fn family(&self) -> ProviderFamily {
        ProviderFamily::DeepSeek
    }

    async fn send(
        &self,
        conversation: &Conversation,
        model: &ModelSpec,
        temperature: f32,
        opts: SendOptions<'_>,
    ) -> Result<Sample, LlmError> {
        let body = self.request_body(conversation, model, temperature, &opts);
        let sample = self.engine.chat(&body, opts.sink).await?;
        Ok(Sample::new(
            strip_thinking(&sample.text).trim().to_string(),
            sample.usage,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ChatMessage, models};

    #[test]
    fn thinking_regions_are_stripped() {
        let raw = "<think>let me reason\nover lines</think>\nanswer: [[1]]";
        assert_eq!(strip_thinking(raw).trim(), "answer: [[1]]");

        let multiple = "<think>a</think>x<think>b</think>y";
        assert_eq!(strip_thinking(multiple), "xy");

        let untouched = "no markup here";
        assert_eq!(strip_thinking(untouched), untouched);
    }

    #[test]
    fn request_is_text_only_with_flat_max_tokens() {
        let adapter = DeepSeekAdapter::new(
            reqwest::Client::new(),
            SecretString::from("test-key".to_string()),
        );
        let convo = Conversation::new(vec![ChatMessage::user("grid").with_image("aW1n")]).unwrap();
        let body = adapter.request_body(&convo, &models::DEEPSEEK_R1, 0.2, &SendOptions::batch());
        assert_eq!(body["max_tokens"], 8_192);
        assert_eq!(body["messages"][0]["content"], "grid");
    }

    #[test]
    fn budget_override_replaces_default() {
        let adapter = DeepSeekAdapter::new(
            reqwest::Client::new(),
            SecretString::from("test-key".to_string()),
        );
        let convo = Conversation::new(vec![ChatMessage::user("grid")]).unwrap();
        let opts = SendOptions {
            max_tokens_override: Some(1_536),
            sink: None,
        };
        let body = adapter.request_body(&convo, &models::DEEPSEEK_R1, 0.2, &opts);
        assert_eq!(body["max_tokens"], 1_536);
    }
}
