//! Public SDK surface for Mentora.
//!
//! Re-exports the tutoring engine building blocks under short module
//! aliases and provides a logging bootstrap helper so every consumer wires
//! output the same way.

/// Configuration schema and loader.
pub use mentora_rs_config as config;
/// Sessions, struggle detection, personas, prompts, and the orchestrator.
pub use mentora_rs_core as core;
/// Per-student vector memory.
pub use mentora_rs_memory as memory;

#[inline]
/// Initialize env_logger when the "logging" feature is enabled; otherwise a
/// no-op. Call once, early in startup.
pub fn init_logging() {
    #[cfg(feature = "logging")]
    {
        let _ = env_logger::try_init();
    }
}
