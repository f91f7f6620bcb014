use async_trait::async_trait;
use futures_util::stream;
use mentora_rs_core::{
    GenerationEngine, GenerationOptions, GenerationStream, StreamChunk, TutorCoreError,
};

/// Generation engine yielding a fixed token script, with optional failure
/// injection before or during the stream.
pub struct ScriptedEngine {
    chunks: Vec<String>,
    fail_after: Option<usize>,
    fail_to_start: bool,
}

impl ScriptedEngine {
    /// Engine that streams the given tokens and then a terminal done chunk.
    pub fn new(chunks: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            chunks: chunks.into_iter().map(Into::into).collect(),
            fail_after: None,
            fail_to_start: false,
        }
    }

    /// Fail the stream after emitting `count` tokens.
    pub fn failing_after(mut self, count: usize) -> Self {
        self.fail_after = Some(count);
        self
    }

    /// Fail before the stream ever starts.
    pub fn failing_to_start() -> Self {
        Self {
            chunks: Vec::new(),
            fail_after: None,
            fail_to_start: true,
        }
    }
}

#[async_trait]
impl GenerationEngine for ScriptedEngine {
    async fn generate_stream(
        &self,
        _prompt: &str,
        _system_prompt: Option<&str>,
        _options: &GenerationOptions,
    ) -> Result<GenerationStream, TutorCoreError> {
        if self.fail_to_start {
            return Err(TutorCoreError::GenerationStream(
                "engine refused the request".to_string(),
            ));
        }
        let mut items: Vec<Result<StreamChunk, TutorCoreError>> = Vec::new();
        for (index, text) in self.chunks.iter().enumerate() {
            if self.fail_after == Some(index) {
                items.push(Err(TutorCoreError::GenerationStream(
                    "stream interrupted".to_string(),
                )));
                return Ok(Box::pin(stream::iter(items)));
            }
            items.push(Ok(StreamChunk {
                text: text.clone(),
                done: false,
            }));
        }
        if self.fail_after == Some(self.chunks.len()) {
            items.push(Err(TutorCoreError::GenerationStream(
                "stream interrupted".to_string(),
            )));
        } else {
            items.push(Ok(StreamChunk {
                text: String::new(),
                done: true,
            }));
        }
        Ok(Box::pin(stream::iter(items)))
    }
}
