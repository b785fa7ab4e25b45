//! Retry/backoff controller.
//!
//! Wraps one adapter call in a bounded retry loop driven by the classified
//! error taxonomy. Policies are per provider family; waits are cooperative
//! (`tokio::time::sleep`), so a backoff never stalls other in-flight
//! attempts.

use std::time::{Duration, Instant};

use crate::error::LlmError;
use crate::providers::{ProviderAdapter, SendOptions};
use crate::sink::SinkPolicy;
use crate::types::{Conversation, ModelSpec, ProviderFamily, Sample};

/// Retry policy for one provider family.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, the first one included.
    pub max_attempts: u32,
    pub initial_delay: Duration,
    /// 1.0 keeps the delay fixed; >1.0 grows it per retry.
    pub backoff_multiplier: f64,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub const fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            initial_delay: delay,
            backoff_multiplier: 1.0,
            max_delay: delay,
        }
    }

    /// Default policy table.
    pub fn for_family(family: ProviderFamily) -> Self {
        match family {
            ProviderFamily::Anthropic => Self::fixed(200, Duration::from_secs(15)),
            ProviderFamily::OpenAi => Self::fixed(3, Duration::from_secs(15)),
            ProviderFamily::DeepSeek => Self::fixed(50, Duration::from_secs(15)),
            ProviderFamily::OpenRouter => Self {
                max_attempts: 5,
                initial_delay: Duration::from_secs(10),
                backoff_multiplier: 2.0,
                max_delay: Duration::from_secs(160),
            },
            ProviderFamily::Xai => Self::fixed(1, Duration::from_secs(15)),
            ProviderFamily::Gemini => Self::fixed(200, Duration::from_secs(15)),
        }
    }

    /// Delay before retry number `retry` (0-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        let millis =
            self.initial_delay.as_millis() as f64 * self.backoff_multiplier.powi(retry as i32);
        Duration::from_millis(millis as u64).min(self.max_delay)
    }
}

/// Drive one logical sample through its retry policy.
///
/// Returns the first successful sample, or the error that ended the chain:
/// a fatal error immediately, or the last retryable error once attempts are
/// exhausted. A context-length overflow that reports the prompt size gets a
/// single immediate budget-shrink retry before normal handling resumes.
pub(crate) async fn drive(
    adapter: &dyn ProviderAdapter,
    policy: &RetryPolicy,
    conversation: &Conversation,
    model: &ModelSpec,
    temperature: f32,
    sink_policy: Option<&SinkPolicy>,
    attempt_id: u64,
) -> Result<Sample, LlmError> {
    let started = Instant::now();
    let mut budget_override: Option<u32> = None;
    let mut shrunk = false;
    let mut last_err: Option<LlmError> = None;
    let mut attempt: u32 = 0;

    while attempt < policy.max_attempts {
        let mut sink = match sink_policy {
            Some(sp) => Some(sp.open(attempt_id)?),
            None => None,
        };
        let opts = SendOptions {
            max_tokens_override: budget_override,
            sink: sink.as_deref_mut(),
        };
        tracing::debug!(
            attempt_id,
            attempt,
            model = model.id,
            provider = %adapter.family(),
            "issuing attempt"
        );
        match adapter.send(conversation, model, temperature, opts).await {
            Ok(sample) => {
                tracing::debug!(
                    attempt_id,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    usage = %sample.usage,
                    "attempt succeeded"
                );
                return Ok(sample);
            }
            Err(err) => {
                if err.is_fatal() || !err.is_retryable() {
                    return Err(err);
                }
                if let LlmError::ContextLengthExceeded {
                    prompt_tokens: Some(prompt_tokens),
                    ..
                } = &err
                    && !shrunk
                    && let Some(window) = model.context_window
                {
                    let room = window.saturating_sub(*prompt_tokens);
                    if room == 0 {
                        return Err(err);
                    }
                    budget_override = Some(model.max_output_tokens.min(room));
                    shrunk = true;
                    attempt += 1;
                    tracing::debug!(
                        attempt_id,
                        budget = budget_override,
                        "context overflow, retrying with shrunk output budget"
                    );
                    last_err = Some(err);
                    continue;
                }
                attempt += 1;
                if attempt >= policy.max_attempts {
                    last_err = Some(err);
                    break;
                }
                let delay = policy.delay_for(attempt - 1);
                tracing::debug!(
                    attempt_id,
                    attempt,
                    max_attempts = policy.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "retrying"
                );
                last_err = Some(err);
                tokio::time::sleep(delay).await;
            }
        }
    }

    Err(last_err.unwrap_or_else(|| {
        LlmError::InvalidInput("retry policy allows zero attempts".to_string())
    }))
}
