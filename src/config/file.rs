// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! File-based configuration provider implementation.

use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};

use super::ConfigError;
use super::ConfigProvider;

/// Supported file formats for configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    /// JSON format (.json)
    Json,
    /// TOML format (.toml)
    Toml,
    /// YAML format (.yaml, .yml)
    Yaml,
}

impl FileFormat {
    /// Detect the file format from the file extension.
    pub fn from_extension(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_string_lossy().to_lowercase();
        match ext.as_str() {
            "json" => Some(FileFormat::Json),
            "toml" => Some(FileFormat::Toml),
            "yaml" | "yml" => Some(FileFormat::Yaml),
            _ => None,
        }
    }

    fn name(self) -> &'static str {
        match self {
            FileFormat::Json => "JSON",
            FileFormat::Toml => "TOML",
            FileFormat::Yaml => "YAML",
        }
    }
}

/// File-based configuration provider.  The whole document is read once.
#[derive(Debug)]
pub struct FileConfigProvider {
    path: PathBuf,
    data: Map<String, Value>,
}

impl FileConfigProvider {
    pub fn new(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref().to_path_buf();
        let format = FileFormat::from_extension(&path)
            .ok_or_else(|| ConfigError::provider_error("file", "unsupported file format"))?;

        let content = fs::read_to_string(&path).map_err(|e| {
            ConfigError::provider_error("file", format!("failed to read {}: {e}", path.display()))
        })?;
        let data = Self::parse(&content, format)?;

        Ok(Self { path, data })
    }

    /// Path this provider was loaded from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn parse(content: &str, format: FileFormat) -> Result<Map<String, Value>, ConfigError> {
        let invalid = |e: String| {
            ConfigError::provider_error("file", format!("invalid {}: {e}", format.name()))
        };

        // Everything is normalised to serde_json::Value.
        let value = match format {
            FileFormat::Json => serde_json::from_str::<Value>(content).map_err(|e| invalid(e.to_string()))?,
            FileFormat::Toml => {
                let toml_value: toml::Value = toml::from_str(content).map_err(|e| invalid(e.to_string()))?;
                serde_json::to_value(toml_value).map_err(|e| invalid(e.to_string()))?
            }
            FileFormat::Yaml => {
                let yaml_value: serde_yaml::Value =
                    serde_yaml::from_str(content).map_err(|e| invalid(e.to_string()))?;
                serde_json::to_value(yaml_value).map_err(|e| invalid(e.to_string()))?
            }
        };

        match value {
            Value::Object(map) => Ok(map),
            _ => Err(ConfigError::provider_error(
                "file",
                "root configuration must be an object",
            )),
        }
    }

    /// Walk a dot-separated key path through nested objects.
    fn lookup(&self, key_path: &str) -> Option<&Value> {
        let mut parts = key_path.split('.');
        let mut current = self.data.get(parts.next()?)?;
        for part in parts {
            current = current.get(part)?;
        }
        Some(current)
    }
}

impl ConfigProvider for FileConfigProvider {
    fn has(&self, key: &str) -> bool {
        self.lookup(key).is_some()
    }

    fn provider_name(&self) -> &str {
        "file"
    }

    fn get_raw(&self, key: &str) -> Result<Option<Value>, ConfigError> {
        Ok(self.lookup(key).cloned())
    }
}
