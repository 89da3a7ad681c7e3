//! Settings file for the host.
//!
//! [`HostSettings`] is loaded from TOML, either by the CLI (`--config`) or by
//! the C boundary from the file named in `WASMGATE_CONFIG`.
//!
//! # Example
//!
//! ```toml
//! [engine]
//! consume_fuel = true
//! wasi = false
//!
//! [limits]
//! max_memory_mb = 64
//! default_fuel = 10_000_000
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{EngineConfig, HostError, InstanceLimits};

/// Environment variable naming the settings file read by the C boundary.
pub const SETTINGS_ENV: &str = "WASMGATE_CONFIG";

/// Top-level settings file structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct HostSettings {
    /// Engine configuration.
    #[serde(default)]
    pub engine: EngineConfig,

    /// Per-instance resource limits.
    #[serde(default)]
    pub limits: InstanceLimits,
}

impl HostSettings {
    /// Load settings from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, HostError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            HostError::settings(format!("failed to read '{}': {e}", path.display()))
        })?;

        debug!(path = %path.display(), "Loading host settings");
        Self::from_toml(&content)
    }

    /// Parse settings from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, HostError> {
        toml::from_str(content).map_err(|e| HostError::settings(e.to_string()))
    }

    /// Load settings from the file named by [`SETTINGS_ENV`].
    ///
    /// Returns defaults when the variable is unset or empty.
    pub fn from_env() -> Result<Self, HostError> {
        match std::env::var_os(SETTINGS_ENV) {
            Some(path) if !path.is_empty() => Self::from_file(path),
            _ => Ok(Self::default()),
        }
    }
}
