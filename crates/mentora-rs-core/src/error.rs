//! Error types for the core tutoring engine crate.

use thiserror::Error;

/// Errors returned by tutoring engine operations.
#[derive(Debug, Error)]
pub enum TutorCoreError {
    /// The referenced lesson or homework does not exist.
    #[error("subject not found: {0}")]
    SubjectNotFound(String),
    /// The caller may not access the referenced subject.
    #[error("access denied: {0}")]
    AccessDenied(String),
    /// Session/message persistence error.
    #[error("state error: {0}")]
    State(String),
    /// The generation engine failed before or during streaming.
    #[error("generation stream failed: {0}")]
    GenerationStream(String),
}
