//! Text encodings of generated documents and writing them to disk.

use anyhow::{Context, Result};
use clap::ValueEnum;
use log::debug;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Output format of the schema dump
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Yaml,
    Json,
}

impl OutputFormat {
    /// Encode `value`; JSON is pretty-printed
    pub fn serialize<T: Serialize>(&self, value: &T) -> Result<String> {
        match self {
            OutputFormat::Yaml => serialize_yaml(value),
            OutputFormat::Json => serialize_json(value),
        }
    }

    /// File extension appended to output paths given without one
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Yaml => "yaml",
            OutputFormat::Json => "json",
        }
    }
}

pub fn serialize_yaml<T: Serialize>(value: &T) -> Result<String> {
    debug!("Serializing document to YAML");
    serde_yaml::to_string(value).context("Failed to serialize document to YAML")
}

pub fn serialize_json<T: Serialize>(value: &T) -> Result<String> {
    debug!("Serializing document to JSON");
    serde_json::to_string_pretty(value).context("Failed to serialize document to JSON")
}

/// `path` as given, or with the format's extension when it has none
pub fn output_path(path: &Path, format: OutputFormat) -> PathBuf {
    if path.extension().is_some() {
        path.to_path_buf()
    } else {
        path.with_extension(format.extension())
    }
}

/// Write `content` to `path`, creating missing parent directories
pub fn write_to_file(content: &str, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    fs::write(path, content).with_context(|| format!("Failed to write to file: {}", path.display()))?;
    debug!("Wrote {} bytes to {}", content.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::openapi_builder::{OpenApiBuilder, OpenApiDocument};
    use serde_json::{json, Value};
    use tempfile::TempDir;

    fn document() -> OpenApiDocument {
        OpenApiBuilder::new()
            .with_info("Shop".to_string(), "1.0.0".to_string(), None)
            .build()
    }

    #[test]
    fn test_yaml_output() {
        let yaml = OutputFormat::Yaml.serialize(&document()).unwrap();
        assert!(yaml.contains("3.0.0"));
        assert!(yaml.contains("title: Shop"));

        let parsed: OpenApiDocument = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed, document());
    }

    #[test]
    fn test_json_output_is_pretty() {
        let text = OutputFormat::Json.serialize(&document()).unwrap();
        assert!(text.contains('\n'));
        assert!(text.contains("  \"openapi\": \"3.0.0\""));

        let parsed: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed["info"], json!({ "title": "Shop", "version": "1.0.0" }));
    }

    #[test]
    fn test_json_keeps_property_order() {
        let value = json!({ "zeta": 1, "alpha": 2 });
        let text = serialize_json(&value).unwrap();
        assert!(text.find("zeta").unwrap() < text.find("alpha").unwrap());
    }

    #[test]
    fn test_write_to_file_creates_directories() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("docs/api/schemas.yaml");

        write_to_file("openapi: 3.0.0\n", &path).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "openapi: 3.0.0\n");

        write_to_file("replaced\n", &path).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "replaced\n");
    }

    #[test]
    fn test_output_path_extension() {
        assert_eq!(output_path(Path::new("out/schemas"), OutputFormat::Json), PathBuf::from("out/schemas.json"));
        assert_eq!(output_path(Path::new("schemas"), OutputFormat::Yaml), PathBuf::from("schemas.yaml"));
        assert_eq!(output_path(Path::new("schemas.yml"), OutputFormat::Yaml), PathBuf::from("schemas.yml"));
    }
}
