//! # samovar
//!
//! Multi-provider LLM sampling client. One conversation goes in; N candidate
//! completions come back, sampled concurrently from a hosted model provider,
//! with normalized usage accounting, provider-specific retry policies,
//! streamed or batched delivery, and recovery of structured artifacts
//! (Python programs, integer grids) from free-form model text.
//!
//! ```rust,no_run
//! use samovar::{ChatMessage, Conversation, Sampler, SamplerConfig, models, parse};
//!
//! # async fn run() -> Result<(), samovar::LlmError> {
//! let sampler = Sampler::new(SamplerConfig::from_env());
//! let conversation = Conversation::new(vec![
//!     ChatMessage::system("You solve grid puzzles."),
//!     ChatMessage::user("Respond with a transform function."),
//! ])?;
//!
//! let samples = sampler
//!     .sample_n(&conversation, &models::CLAUDE_3_5_SONNET, 0.7, 4)
//!     .await;
//! for sample in &samples {
//!     let code = parse::parse_code_block(&sample.text);
//!     println!("{} ({} tokens out)", code, sample.usage.output_tokens);
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod orchestrator;
pub mod parse;
pub mod providers;
pub mod retry;
pub mod sink;
pub mod telemetry;
pub mod types;

pub use config::{Credentials, SamplerConfig};
pub use error::LlmError;
pub use orchestrator::Sampler;
pub use retry::RetryPolicy;
pub use sink::{DeltaSink, SinkPolicy};
pub use types::model::lookup;
pub use types::{
    ChatMessage, ContentPart, Conversation, MessageRole, ModelSpec, ProviderFamily, Sample,
    TokenUsage, models,
};
