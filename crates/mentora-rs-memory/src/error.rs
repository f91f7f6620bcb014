//! Error types for memory operations.

/// Errors returned by the vector store client and memory service.
#[derive(Debug, thiserror::Error)]
pub enum MemoryError {
    /// Vector store is unreachable; callers treat this as memory disabled.
    #[error("vector store unavailable: {0}")]
    StoreUnavailable(String),
    /// The store rejected a request (bad collection, malformed payload).
    #[error("store rejected request: {0}")]
    StoreRejected(String),
}

impl From<reqwest::Error> for MemoryError {
    /// Network-level failures all read as an unavailable store.
    fn from(err: reqwest::Error) -> Self {
        MemoryError::StoreUnavailable(err.to_string())
    }
}
