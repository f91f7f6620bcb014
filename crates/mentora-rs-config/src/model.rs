//! Configuration schema for the Mentora tutoring engine.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root config for the tutoring engine.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TutorConfig {
    #[serde(default, rename = "$schema")]
    pub schema: Option<String>,
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(default)]
    pub struggle: StruggleConfig,
    #[serde(default)]
    pub sessions: SessionsConfig,
    #[serde(default)]
    pub vector_store: VectorStoreConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
}

impl TutorConfig {
    /// Start building a config programmatically with defaults applied.
    pub fn builder() -> TutorConfigBuilder {
        TutorConfigBuilder::new()
    }
}

/// Builder for assembling a `TutorConfig` in code.
#[derive(Debug, Default, Clone)]
pub struct TutorConfigBuilder {
    config: TutorConfig,
}

impl TutorConfigBuilder {
    /// Create a new builder seeded with default config values.
    pub fn new() -> Self {
        Self {
            config: TutorConfig::default(),
        }
    }

    /// Replace the memory retrieval configuration.
    pub fn memory(mut self, memory: MemoryConfig) -> Self {
        self.config.memory = memory;
        self
    }

    /// Replace the struggle detection configuration.
    pub fn struggle(mut self, struggle: StruggleConfig) -> Self {
        self.config.struggle = struggle;
        self
    }

    /// Replace the session persistence configuration.
    pub fn sessions(mut self, sessions: SessionsConfig) -> Self {
        self.config.sessions = sessions;
        self
    }

    /// Replace the vector store endpoint configuration.
    pub fn vector_store(mut self, vector_store: VectorStoreConfig) -> Self {
        self.config.vector_store = vector_store;
        self
    }

    /// Replace the embedding endpoint configuration.
    pub fn embedding(mut self, embedding: EmbeddingConfig) -> Self {
        self.config.embedding = embedding;
        self
    }

    /// Replace the generation engine configuration.
    pub fn generation(mut self, generation: GenerationConfig) -> Self {
        self.config.generation = generation;
        self
    }

    /// Finalize and return the built `TutorConfig`.
    pub fn build(self) -> TutorConfig {
        self.config
    }
}

/// Retrieval and indexing configuration for per-student memory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Number of nearest neighbours requested per retrieval.
    #[serde(default = "default_recall_k")]
    pub recall_k: usize,
    /// Minimum similarity below which a retrieved memory is discarded.
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f32,
    /// Answer prefix length used when building the searchable document.
    #[serde(default = "default_index_answer_chars")]
    pub index_answer_chars: usize,
    /// Answer length kept when rendering a memory into the prompt.
    #[serde(default = "default_prompt_answer_chars")]
    pub prompt_answer_chars: usize,
    /// Prefix for per-student collection names.
    #[serde(default = "default_collection_prefix")]
    pub collection_prefix: String,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            recall_k: default_recall_k(),
            similarity_threshold: default_similarity_threshold(),
            index_answer_chars: default_index_answer_chars(),
            prompt_answer_chars: default_prompt_answer_chars(),
            collection_prefix: default_collection_prefix(),
        }
    }
}

fn default_recall_k() -> usize {
    3
}

fn default_similarity_threshold() -> f32 {
    0.30
}

fn default_index_answer_chars() -> usize {
    500
}

fn default_prompt_answer_chars() -> usize {
    300
}

fn default_collection_prefix() -> String {
    "student_memory_".to_string()
}

/// Tuning knobs for the struggle analyzer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StruggleConfig {
    /// Minimum prior user messages before a signal is produced.
    #[serde(default = "default_min_user_messages")]
    pub min_user_messages: usize,
    /// Failed attempts required to flag a student as struggling.
    #[serde(default = "default_failed_attempts_threshold")]
    pub failed_attempts_threshold: usize,
    /// Messages at or below this length count as short.
    #[serde(default = "default_short_message_chars")]
    pub short_message_chars: usize,
    /// Word-overlap ratio above which a message counts as a repeat.
    #[serde(default = "default_overlap_threshold")]
    pub overlap_threshold: f32,
    /// Number of trailing user messages inspected.
    #[serde(default = "default_struggle_window")]
    pub window: usize,
}

impl Default for StruggleConfig {
    fn default() -> Self {
        Self {
            min_user_messages: default_min_user_messages(),
            failed_attempts_threshold: default_failed_attempts_threshold(),
            short_message_chars: default_short_message_chars(),
            overlap_threshold: default_overlap_threshold(),
            window: default_struggle_window(),
        }
    }
}

fn default_min_user_messages() -> usize {
    2
}

fn default_failed_attempts_threshold() -> usize {
    2
}

fn default_short_message_chars() -> usize {
    20
}

fn default_overlap_threshold() -> f32 {
    0.5
}

fn default_struggle_window() -> usize {
    10
}

/// Session persistence configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionsConfig {
    /// Root directory for session rollouts.
    #[serde(default)]
    pub root: Option<PathBuf>,
    /// Bounded history window loaded per turn.
    #[serde(default = "default_history_window")]
    pub history_window: usize,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            root: None,
            history_window: default_history_window(),
        }
    }
}

fn default_history_window() -> usize {
    20
}

/// Vector store endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorStoreConfig {
    /// Base URL of the vector store HTTP API.
    #[serde(default = "default_vector_store_url")]
    pub base_url: String,
    /// Request timeout in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            base_url: default_vector_store_url(),
            timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_vector_store_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

/// Embedding endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Base URL of the embedding HTTP API.
    #[serde(default = "default_embedding_url")]
    pub base_url: String,
    /// Embedding model identifier.
    #[serde(default = "default_embedding_model")]
    pub model: String,
    /// Request timeout in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            base_url: default_embedding_url(),
            model: default_embedding_model(),
            timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_embedding_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_embedding_model() -> String {
    "nomic-embed-text".to_string()
}

/// Generation engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Model identifier passed to the generation engine.
    #[serde(default = "default_generation_model")]
    pub model: String,
    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model: default_generation_model(),
            temperature: default_temperature(),
        }
    }
}

fn default_generation_model() -> String {
    "llama3.1".to_string()
}

fn default_temperature() -> f32 {
    0.7
}
