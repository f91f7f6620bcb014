//! Per-student vector memory for the Mentora tutoring engine.
//!
//! Each active student owns exactly one vector collection holding past
//! question/answer interactions. The service layer degrades to a no-op
//! whenever the store or the embedder is unreachable: a tutoring turn must
//! never fail because memory failed.

pub mod embedding;
pub mod error;
pub mod model;
pub mod service;
pub mod store;

/// Memory error type.
pub use error::MemoryError;
/// Embedding provider interface and default HTTP implementation.
pub use embedding::{Embedder, HttpEmbedder};
/// Stored and retrieved memory models.
pub use model::{InteractionContext, RetrievedMemory, SyncReport};
/// Memory service owning the per-student collection lifecycle.
pub use service::{MemoryService, MemoryStatus, format_memories_for_prompt};
/// Vector store interface and default HTTP implementation.
pub use store::{
    CollectionHandle, HttpVectorStore, QueryResult, VectorRecord, VectorStoreClient,
    distance_to_similarity,
};
