//! Single-layer config file loading.

use crate::error::ConfigError;
use crate::model::TutorConfig;
use log::{debug, info};
use std::path::Path;

/// Load a `TutorConfig` from a JSON/JSON5 file, falling back to defaults
/// when the file does not exist.
pub fn load_config(path: impl AsRef<Path>) -> Result<TutorConfig, ConfigError> {
    let path = path.as_ref();
    if !path.exists() {
        debug!("config file missing, using defaults (path={})", path.display());
        return Ok(TutorConfig::default());
    }
    let raw = std::fs::read_to_string(path)?;
    let config: TutorConfig = json5::from_str(&raw)?;
    info!("loaded config (path={})", path.display());
    Ok(config)
}
