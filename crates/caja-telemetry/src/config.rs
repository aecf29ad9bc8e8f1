use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub log_level: String,
    pub service_name: String,
    pub metrics_channel_capacity: usize,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            service_name: "caja-scand".to_string(),
            metrics_channel_capacity: 1024,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ConfigShape {
    Nested { telemetry: TelemetryConfig },
    Flat(TelemetryConfig),
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

impl TelemetryConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, toml::de::Error> {
        match toml::from_str::<ConfigShape>(input)? {
            ConfigShape::Flat(config) => Ok(config),
            ConfigShape::Nested { telemetry } => Ok(telemetry),
        }
    }

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

#[cfg(test)]
mod tests {
    use super::TelemetryConfig;

    #[test]
    fn parse_nested_telemetry_shape() {
        let input = r#"
[telemetry]
log_level = "debug"
service_name = "caja-demo"
metrics_channel_capacity = 64
"#;

        let config = TelemetryConfig::from_toml_str(input).expect("config should parse");
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.service_name, "caja-demo");
        assert_eq!(config.metrics_channel_capacity, 64);
    }

    #[test]
    fn parse_flat_shape_with_defaults() {
        let config =
            TelemetryConfig::from_toml_str(r#"log_level = "warn""#).expect("config should parse");
        assert_eq!(config.log_level, "warn");
        assert_eq!(config.service_name, "caja-scand");
    }
}
