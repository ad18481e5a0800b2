use std::path::{Path, PathBuf};

use cluster_kernel::GeneratorConfig;
use cluster_partition::PartitionConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Server configuration. Every field has a default, so a config file only
/// lists what it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the CLI `serve` command listens on.
    pub listen: String,
    /// Snapshot directory; no persistence across restarts when unset.
    pub data_dir: Option<PathBuf>,
    pub generator: GeneratorConfig,
    pub partition: PartitionConfig,
    /// Fleet speed in world units per second.
    pub mission_speed: f64,
    pub race_count: u8,
    pub sun_texture_count: u8,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "127.0.0.1:7000".to_string(),
            data_dir: None,
            generator: GeneratorConfig::default(),
            partition: PartitionConfig::default(),
            mission_speed: 100.0,
            race_count: 6,
            sun_texture_count: 2,
        }
    }
}

impl ServerConfig {
    /// Parse a YAML document. Missing fields take their defaults.
    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Read and parse a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&text)
    }
}
