//! Generation engine boundary.

use crate::error::TutorCoreError;
use async_trait::async_trait;
use futures_util::stream::Stream;
use mentora_rs_config::GenerationConfig;
use std::pin::Pin;

/// One streamed chunk; a finite sequence terminates with `done = true`.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamChunk {
    /// Token text, possibly empty on the terminal chunk.
    pub text: String,
    /// Marks the final chunk of the sequence.
    pub done: bool,
}

/// Per-request generation options.
#[derive(Debug, Clone)]
pub struct GenerationOptions {
    /// Model identifier.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f32,
}

impl From<&GenerationConfig> for GenerationOptions {
    fn from(config: &GenerationConfig) -> Self {
        Self {
            model: config.model.clone(),
            temperature: config.temperature,
        }
    }
}

/// Boxed token stream returned by the engine. Consumers must handle a
/// sequence that errors before ever emitting a `done` chunk.
pub type GenerationStream =
    Pin<Box<dyn Stream<Item = Result<StreamChunk, TutorCoreError>> + Send>>;

#[async_trait]
/// External large-language-model boundary.
pub trait GenerationEngine: Send + Sync {
    /// Start a streamed generation for the given prompt.
    async fn generate_stream(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
        options: &GenerationOptions,
    ) -> Result<GenerationStream, TutorCoreError>;
}
