//! Simulation settings.
//!
//! Settings come from an optional JSON file and are then overridden by
//! command-line flags. Every field has a default, so `{}` is a valid file.

use crate::asm::image::ByteOrder;
use serde::{Serialize, Deserialize};
use std::path::Path;
use thiserror::Error;

/// Settings for one simulation run.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimConfig {
    /// Byte order of words in the image file.
    pub byte_order: ByteOrder,
    /// Stop after this many steps; `None` runs to completion.
    pub max_steps: Option<u64>,
    /// Log every executed instruction.
    pub trace: bool,
    /// Print the final machine state as JSON after the run.
    pub dump_state: bool,
}

impl SimConfig {
    /// Parse settings from JSON text.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Load settings from a JSON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_json(&text)
    }
}

/// Errors that can occur while loading settings.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("unable to read config file {path}: {message}")]
    Io { path: String, message: String },

    #[error("invalid config: {0}")]
    Parse(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_is_default() {
        assert_eq!(SimConfig::from_json("{}").unwrap(), SimConfig::default());
    }

    #[test]
    fn test_parse_fields() {
        let config = SimConfig::from_json(
            r#"{ "byte_order": "big", "max_steps": 500, "trace": true }"#,
        )
        .unwrap();
        assert_eq!(config.byte_order, ByteOrder::Big);
        assert_eq!(config.max_steps, Some(500));
        assert!(config.trace);
        assert!(!config.dump_state);
    }

    #[test]
    fn test_unknown_field_rejected() {
        assert!(matches!(
            SimConfig::from_json(r#"{ "max_cycles": 1 }"#),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sim.json");
        std::fs::write(&path, r#"{ "dump_state": true }"#).unwrap();
        assert!(SimConfig::load(&path).unwrap().dump_state);

        let missing = SimConfig::load(dir.path().join("missing.json"));
        assert!(matches!(missing, Err(ConfigError::Io { .. })));
    }
}
