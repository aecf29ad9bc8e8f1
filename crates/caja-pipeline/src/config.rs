use caja_capture::Facing;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Interval floor between decode attempts in the native sampling loop.
pub const DEFAULT_SCAN_INTERVAL_MS: u64 = 200;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Minimum elapsed time between two decode attempts; bounds CPU cost
    /// of repeated image analysis.
    pub scan_interval_ms: u64,
    pub facing: Facing,
    pub event_channel_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            scan_interval_ms: DEFAULT_SCAN_INTERVAL_MS,
            facing: Facing::Environment,
            event_channel_capacity: 1024,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ConfigShape {
    Nested { scanner: PipelineConfig },
    Flat(PipelineConfig),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
}

impl PipelineConfig {
    /// Parses pipeline config from a TOML string.
    pub fn from_toml_str(input: &str) -> Result<Self, toml::de::Error> {
        match toml::from_str::<ConfigShape>(input)? {
            ConfigShape::Flat(config) => Ok(config),
            ConfigShape::Nested { scanner } => Ok(scanner),
        }
    }

    /// Loads pipeline config from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();
        let path_str = path_ref.display().to_string();
        let content = fs::read_to_string(path_ref).map_err(|source| ConfigError::Io {
            path: path_str.clone(),
            source,
        })?;
        Self::from_toml_str(&content).map_err(|source| ConfigError::Parse {
            path: path_str,
            source,
        })
    }
}
