//! Application configuration management

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Scanner settings
    pub scanner: ScannerConfig,

    /// Script fetch settings
    pub fetch: FetchConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Data directory for persisted tab state (platform default if unset)
    pub data_dir: Option<PathBuf>,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self { data_dir: None }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// Upper bound on scanned script size in bytes
    pub max_scan_bytes: usize,

    /// Additional ignore regexes applied to every candidate match
    pub extra_ignore_patterns: Vec<String>,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            max_scan_bytes: 16 * 1024 * 1024,
            extra_ignore_patterns: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// External script fetch timeout in seconds
    pub timeout_secs: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self { timeout_secs: 10 }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_string(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Serialize the default configuration
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Config::default()).unwrap_or_default()
    }

    /// Platform data directory for persisted state
    pub fn data_dir(&self) -> Result<PathBuf, ConfigError> {
        if let Some(dir) = &self.general.data_dir {
            return Ok(dir.clone());
        }
        directories::ProjectDirs::from("io", "secretlens", "secretlens")
            .map(|dirs| dirs.data_local_dir().to_path_buf())
            .ok_or(ConfigError::NoDataDir)
    }

    /// Path of the tab-state file inside the data directory
    pub fn state_file(&self) -> Result<PathBuf, ConfigError> {
        Ok(self.data_dir()?.join("tabs.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_round_trips() {
        let toml = Config::default_toml();
        let parsed: Config = toml::from_str(&toml).unwrap();
        assert_eq!(parsed.scanner.max_scan_bytes, 16 * 1024 * 1024);
        assert_eq!(parsed.fetch.timeout_secs, 10);
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let parsed: Config = toml::from_str(
            r#"
            [scanner]
            extra_ignore_patterns = ["EXAMPLE_ONLY"]
            "#,
        )
        .unwrap();
        assert_eq!(parsed.scanner.extra_ignore_patterns, ["EXAMPLE_ONLY"]);
        assert_eq!(parsed.fetch.timeout_secs, 10);
    }
}
