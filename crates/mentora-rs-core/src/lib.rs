//! Core tutoring engine: sessions, struggle detection, persona selection,
//! prompt composition, and the per-turn chat orchestrator.

pub mod error;
pub mod generation;
pub mod orchestrator;
pub mod persona;
pub mod prompt;
pub mod state;
pub mod struggle;
pub mod types;

/// Core error type.
pub use error::TutorCoreError;
/// Generation engine boundary.
pub use generation::{GenerationEngine, GenerationOptions, GenerationStream, StreamChunk};
/// Chat orchestrator and caller-facing events.
pub use orchestrator::{ChatEvent, ChatOrchestrator, ChatTurnRequest, run_synchronization_pass};
/// Pedagogical persona policy.
pub use persona::Persona;
/// Pure prompt composition.
pub use prompt::{PromptInputs, compose_system_prompt};
/// Session/message persistence collaborator.
pub use state::{JsonlSessionStore, SessionQueries, StateError};
/// Struggle detection.
pub use struggle::{StruggleSignal, analyze_struggle};
/// Shared data types.
pub use types::{
    ChatMessage, ChatSession, MessageId, Role, SessionId, StudentProfile, SubjectContext,
    SubjectItem,
};
