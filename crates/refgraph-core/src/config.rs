//! `refgraph.toml` configuration

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::m3;

/// Default configuration file name looked up next to the model.
pub const CONFIG_FILE: &str = "refgraph.toml";

/// Default byte cap for one binary partition.
pub const DEFAULT_MAX_PARTITION_BYTES: usize = 512 * 1024;

/// Default number of strings per string-index partition.
pub const DEFAULT_STRING_PARTITION_SIZE: usize = 32768;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub reference: ReferenceConfig,
    pub serialization: SerializationConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReferenceConfig {
    /// Properties never followed during id generation, as `<owner>.<property>`.
    pub back_references: Vec<String>,
    /// Classifiers treated as placeholders.
    pub stub_classifiers: Vec<String>,
}

impl Default for ReferenceConfig {
    fn default() -> Self {
        ReferenceConfig {
            back_references: m3::BACK_REFERENCES.iter().map(|s| s.to_string()).collect(),
            stub_classifiers: m3::STUB_CLASSIFIERS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SerializationConfig {
    pub metadata_name: Option<String>,
    /// Metadata names this one depends on; recorded in its specification.
    pub dependencies: Vec<String>,
    pub max_partition_bytes: usize,
    pub string_partition_size: usize,
}

impl Default for SerializationConfig {
    fn default() -> Self {
        SerializationConfig {
            metadata_name: None,
            dependencies: Vec::new(),
            max_partition_bytes: DEFAULT_MAX_PARTITION_BYTES,
            string_partition_size: DEFAULT_STRING_PARTITION_SIZE,
        }
    }
}

impl Config {
    pub fn from_toml(text: &str) -> crate::Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Load from a file; a missing file yields the defaults.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            tracing::debug!("No config at {}, using defaults", path.display());
            return Ok(Config::default());
        }
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_toml(&text)?;
        tracing::debug!("Loaded config from {}", path.display());
        Ok(config)
    }
}
