//! Ledger configuration loaded from TOML
//!
//! ```toml
//! [storage]
//! path = "iva_sv_data.json"
//!
//! [logging]
//! level = "info"
//! json = false
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::types::{LedgerError, LedgerResult};
use crate::utils::file_storage::JsonFileStorage;

/// Overrides `storage.path`
pub const ENV_DATA_PATH: &str = "IVA_LEDGER_DATA_PATH";

/// Overrides `logging.level`
pub const ENV_LOG_LEVEL: &str = "IVA_LEDGER_LOG_LEVEL";

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BookConfig {
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

/// Where the snapshot lives
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("iva_sv_data.json"),
        }
    }
}

/// Log output settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// trace, debug, info, warn or error
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl BookConfig {
    /// Read a TOML file, apply environment overrides and validate
    pub fn load(path: impl AsRef<Path>) -> LedgerResult<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| {
            LedgerError::Config(format!(
                "Failed to read configuration file {}: {}",
                path.display(),
                e
            ))
        })?;

        let mut config: BookConfig = toml::from_str(&contents)
            .map_err(|e| LedgerError::Config(format!("Failed to parse TOML: {}", e)))?;
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Parse TOML without touching the environment
    pub fn from_toml_str(contents: &str) -> LedgerResult<Self> {
        let config: BookConfig = toml::from_str(contents)
            .map_err(|e| LedgerError::Config(format!("Failed to parse TOML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `IVA_LEDGER_*` overrides from `lookup`
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(path) = lookup(ENV_DATA_PATH) {
            self.storage.path = PathBuf::from(path);
        }
        if let Some(level) = lookup(ENV_LOG_LEVEL) {
            self.logging.level = level;
        }
    }

    pub fn validate(&self) -> LedgerResult<()> {
        if self.storage.path.as_os_str().is_empty() {
            return Err(LedgerError::Config("storage.path cannot be empty".to_string()));
        }

        let level = self.logging.level.to_ascii_lowercase();
        if !LOG_LEVELS.contains(&level.as_str()) {
            return Err(LedgerError::Config(format!(
                "Invalid log level: {}. Must be one of: {}",
                self.logging.level,
                LOG_LEVELS.join(", ")
            )));
        }

        Ok(())
    }

    /// File storage at the configured path
    pub fn file_storage(&self) -> JsonFileStorage {
        JsonFileStorage::new(&self.storage.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BookConfig::from_toml_str("").unwrap();
        assert_eq!(config, BookConfig::default());
        assert_eq!(config.storage.path, PathBuf::from("iva_sv_data.json"));
        assert_eq!(config.logging.level, "info");
        assert!(!config.logging.json);
    }

    #[test]
    fn test_partial_toml() {
        let config = BookConfig::from_toml_str("[logging]\nlevel = \"DEBUG\"\njson = true\n").unwrap();
        assert_eq!(config.logging.level, "DEBUG");
        assert!(config.logging.json);
        assert_eq!(config.storage, StorageConfig::default());
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            BookConfig::from_toml_str("[logging]\nlevel = \"loud\"\n"),
            Err(LedgerError::Config(_))
        ));
        assert!(matches!(
            BookConfig::from_toml_str("[storage]\npath = \"\"\n"),
            Err(LedgerError::Config(_))
        ));
        assert!(matches!(
            BookConfig::from_toml_str("[storage\n"),
            Err(LedgerError::Config(_))
        ));
    }

    #[test]
    fn test_overrides() {
        let mut config = BookConfig::default();
        config.apply_overrides(|key| match key {
            ENV_DATA_PATH => Some("/var/lib/iva/ledger.json".to_string()),
            _ => None,
        });

        assert_eq!(config.storage.path, PathBuf::from("/var/lib/iva/ledger.json"));
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("iva.toml");
        fs::write(&path, "[storage]\npath = \"books/2024.json\"\n").unwrap();

        let config = BookConfig::load(&path).unwrap();
        assert!(config.file_storage().path().ends_with("2024.json"));

        assert!(matches!(
            BookConfig::load(dir.path().join("missing.toml")),
            Err(LedgerError::Config(_))
        ));
    }
}
