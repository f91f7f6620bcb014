//! Memory entry models used by the service and store layers.

use serde::{Deserialize, Serialize};

/// Optional lesson/homework context attached to a stored interaction.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct InteractionContext {
    /// Lesson or homework identifier.
    pub subject_id: Option<String>,
    /// Human-readable title of the lesson or homework.
    pub title: Option<String>,
    /// Subject area (e.g. "math").
    pub subject: Option<String>,
}

/// A retrieved memory plus its computed similarity. Transient: produced by
/// retrieval, consumed by prompt composition, never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedMemory {
    /// Original student question.
    pub question: String,
    /// Tutor answer.
    pub answer: String,
    /// Optional subject context recovered from entry metadata.
    pub context: Option<InteractionContext>,
    /// Similarity score in [0, 1].
    pub similarity: f32,
}

/// Result of comparing the student roster against store collections.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncReport {
    /// True when no drift was detected.
    pub in_sync: bool,
    /// Student ids with a collection but no roster record.
    pub orphaned: Vec<String>,
    /// Student ids on the roster without a collection.
    pub missing: Vec<String>,
}
