//! Fan-out orchestrator.
//!
//! [`Sampler`] owns the process-wide client state: configuration, the shared
//! HTTP client, and the attempt-id counter. One conversation fans out into N
//! concurrent sampling attempts; failed attempts are dropped rather than
//! surfaced, except on the legacy single-attempt path.

use std::sync::atomic::{AtomicU64, Ordering};

use futures::future::join_all;

use crate::config::SamplerConfig;
use crate::error::LlmError;
use crate::providers::{
    ProviderAdapter, anthropic::AnthropicAdapter, deepseek::DeepSeekAdapter,
    gemini::GeminiAdapter, openai::OpenAiAdapter, openrouter::OpenRouterAdapter, xai::XaiAdapter,
};
use crate::retry::{self, RetryPolicy};
use crate::sink::SinkPolicy;
use crate::types::{Conversation, ModelSpec, ProviderFamily, Sample, TokenUsage};

/// Canned response body used in offline mode.
pub const OFFLINE_RESPONSE: &str = "[[1, 2, 3], [4, 5, 6]]";

/// Multi-provider sampling client.
pub struct Sampler {
    config: SamplerConfig,
    http: reqwest::Client,
    attempt_counter: AtomicU64,
}

impl Sampler {
    pub fn new(config: SamplerConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
            attempt_counter: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &SamplerConfig {
        &self.config
    }

    fn next_attempt_id(&self) -> u64 {
        self.attempt_counter.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Select and build the adapter for a model's provider family.
    /// Dispatch happens here exactly once; downstream code only sees the
    /// trait object.
    fn adapter_for(&self, family: ProviderFamily) -> Result<Box<dyn ProviderAdapter>, LlmError> {
        let key = self.config.credentials.for_family(family)?.clone();
        Ok(match family {
            ProviderFamily::Anthropic => Box::new(AnthropicAdapter::new(self.http.clone(), key)),
            ProviderFamily::OpenAi => Box::new(OpenAiAdapter::new(self.http.clone(), key)),
            ProviderFamily::DeepSeek => Box::new(DeepSeekAdapter::new(self.http.clone(), key)),
            ProviderFamily::OpenRouter => Box::new(OpenRouterAdapter::new(
                self.http.clone(),
                key,
                self.config.openrouter_base_url.clone(),
            )),
            ProviderFamily::Xai => Box::new(XaiAdapter::new(self.http.clone(), key)),
            ProviderFamily::Gemini => Box::new(GeminiAdapter::new(self.http.clone(), key)),
        })
    }

    fn offline_sample() -> Sample {
        Sample::new(OFFLINE_RESPONSE, TokenUsage::default())
    }

    fn sink_policy(&self) -> SinkPolicy {
        match &self.config.transcript_dir {
            Some(dir) => SinkPolicy::Transcript { dir: dir.clone() },
            None => SinkPolicy::Console,
        }
    }

    /// One retry-driven attempt; failures are logged and folded to `None`.
    async fn attempt(
        &self,
        adapter: &dyn ProviderAdapter,
        policy: &RetryPolicy,
        conversation: &Conversation,
        model: &ModelSpec,
        temperature: f32,
        stream: bool,
    ) -> Option<Sample> {
        let attempt_id = self.next_attempt_id();
        let sink_policy = stream.then(|| self.sink_policy());
        match retry::drive(
            adapter,
            policy,
            conversation,
            model,
            temperature,
            sink_policy.as_ref(),
            attempt_id,
        )
        .await
        {
            Ok(sample) => Some(sample),
            Err(err) => {
                tracing::warn!(attempt_id, model = model.id, error = %err, "attempt abandoned");
                None
            }
        }
    }

    /// Fan a conversation out into `n` concurrent sampling attempts.
    ///
    /// Returns at most `n` samples; `n = 0` returns an empty list with zero
    /// network activity. The primary attempt (streamed when streaming is
    /// enabled and `n == 1`) occupies the first slot when it succeeded; no
    /// other ordering is guaranteed. Individual attempt failures never
    /// surface here — they are simply absent from the result.
    ///
    /// Concurrency is unbounded per call: all `n` requests may be in flight
    /// at once.
    pub async fn sample_n(
        &self,
        conversation: &Conversation,
        model: &ModelSpec,
        temperature: f32,
        n: usize,
    ) -> Vec<Sample> {
        if n == 0 {
            return Vec::new();
        }
        if self.config.offline {
            return (0..n).map(|_| Self::offline_sample()).collect();
        }

        let adapter = match self.adapter_for(model.family) {
            Ok(adapter) => adapter,
            Err(err) => {
                tracing::warn!(model = model.id, error = %err, "cannot build provider adapter");
                return Vec::new();
            }
        };
        let policy = RetryPolicy::for_family(model.family);
        let stream_primary = self.config.stream && n == 1 && model.supports_streaming;

        let primary = self
            .attempt(
                adapter.as_ref(),
                &policy,
                conversation,
                model,
                temperature,
                stream_primary,
            )
            .await;

        let followers = join_all((1..n).map(|_| {
            self.attempt(
                adapter.as_ref(),
                &policy,
                conversation,
                model,
                temperature,
                false,
            )
        }))
        .await;

        primary
            .into_iter()
            .chain(followers.into_iter().flatten())
            .collect()
    }

    /// Legacy single-attempt path: re-raises after exhausting retries
    /// instead of swallowing the failure.
    pub async fn sample_one(
        &self,
        conversation: &Conversation,
        model: &ModelSpec,
        temperature: f32,
    ) -> Result<Sample, LlmError> {
        if self.config.offline {
            return Ok(Self::offline_sample());
        }
        let adapter = self.adapter_for(model.family)?;
        let policy = RetryPolicy::for_family(model.family);
        let stream = self.config.stream && model.supports_streaming;
        let attempt_id = self.next_attempt_id();
        let sink_policy = stream.then(|| self.sink_policy());
        retry::drive(
            adapter.as_ref(),
            &policy,
            conversation,
            model,
            temperature,
            sink_policy.as_ref(),
            attempt_id,
        )
        .await
    }
}
