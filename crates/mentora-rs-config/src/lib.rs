//! Configuration models and file loading for the Mentora tutoring engine.
//!
//! This crate owns the tutoring config schema and the single-layer JSON
//! loader used by both the engine and embedding/vector-store clients.

mod error;
mod loader;
mod model;

/// Public error type returned by config loading APIs.
pub use error::ConfigError;
/// Config file loading helpers.
pub use loader::load_config;
/// Configuration schema models.
pub use model::*;
