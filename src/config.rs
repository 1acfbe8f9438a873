use crate::error::{BridgeError, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Environment variable overriding [`BridgeConfig::mapper`]
pub const MAPPER_ENV: &str = "SCHEMA_BRIDGE_MAPPER";
/// Environment variable overriding [`BridgeConfig::model_suffix`]
pub const MODEL_SUFFIX_ENV: &str = "SCHEMA_BRIDGE_MODEL_SUFFIX";

/// Which type mapper implementation a cache uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum MapperKind {
    /// Memoizing mapper when the `memoize` feature is compiled in, standard otherwise
    #[default]
    Auto,
    /// Direct recursive mapping
    Standard,
    /// Mapping with memoized struct-free descriptors
    Memoizing,
}

impl MapperKind {
    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(MapperKind::Auto),
            "standard" => Ok(MapperKind::Standard),
            "memoizing" => Ok(MapperKind::Memoizing),
            other => Err(BridgeError::configuration(
                format!("unknown type mapper '{}'", other),
                Some("use one of auto, standard, memoizing"),
            )),
        }
    }
}

/// Settings of a schema cache
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BridgeConfig {
    /// Type mapper selection
    pub mapper: MapperKind,
    /// Appended to the struct name to form the model name
    pub model_suffix: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            mapper: MapperKind::Auto,
            model_suffix: "Schema".to_string(),
        }
    }
}

impl BridgeConfig {
    /// Parse a YAML document; missing keys keep their defaults
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let config: BridgeConfig = serde_yaml::from_str(content).map_err(|e| {
            BridgeError::configuration(format!("invalid configuration: {}", e), None)
        })?;
        config.validate()
    }

    /// Load a YAML configuration file
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from {}", path.display());
        let content = fs::read_to_string(path).map_err(|e| {
            BridgeError::configuration(
                format!("cannot read configuration file {}: {}", path.display(), e),
                Some("check the --config path"),
            )
        })?;
        Self::from_yaml_str(&content)
    }

    /// Defaults with environment overrides applied
    pub fn from_env() -> Result<Self> {
        Self::default().with_env_overrides()
    }

    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from a key lookup (the process environment in production)
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(mapper) = lookup(MAPPER_ENV) {
            debug!("{} overrides mapper with {}", MAPPER_ENV, mapper);
            self.mapper = MapperKind::parse(&mapper)?;
        }
        if let Some(suffix) = lookup(MODEL_SUFFIX_ENV) {
            debug!("{} overrides model suffix with {}", MODEL_SUFFIX_ENV, suffix);
            self.model_suffix = suffix;
        }
        self.validate()
    }

    fn validate(self) -> Result<Self> {
        if !self
            .model_suffix
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(BridgeError::configuration(
                format!("model suffix '{}' is not a valid identifier part", self.model_suffix),
                Some("use letters, digits and underscores only"),
            ));
        }
        Ok(self)
    }
}
