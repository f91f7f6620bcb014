//! Test helpers shared across Mentora crates.

pub mod embedding;
pub mod engine;
pub mod store;

pub use embedding::StubEmbedder;
pub use engine::ScriptedEngine;
pub use store::InMemoryVectorStore;
