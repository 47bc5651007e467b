//! Configuration file parser for ~/.config/tidings/config.toml.
//!
//! The config file is optional — a missing file yields `Config::default()`.
//! Unknown keys are accepted by serde but logged as potential typos.
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// Config file exceeds maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),

    #[error("Could not determine a cache directory for this platform")]
    NoCacheDir,
}

// ============================================================================
// Configuration Struct
// ============================================================================

/// Top-level application configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
/// Missing keys fall back to `Default::default()`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base url of the reader API, with trailing slash.
    pub api_base: String,

    /// Server-side cap for each id listing and the local bound on cached
    /// non-starred items.
    pub cache_items: u32,

    /// Cache directory override. Defaults to the platform cache dir.
    pub cache_dir: Option<PathBuf>,

    /// Automatic refresh interval in minutes. 0 = manual sync only.
    pub refresh_minutes: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base: "https://www.google.com/reader/api/0/".to_string(),
            cache_items: 500,
            cache_dir: None,
            refresh_minutes: 0,
        }
    }
}

impl Config {
    /// Maximum config file size (1 MB); anything larger is corrupt or hostile.
    const MAX_FILE_SIZE: u64 = 1_048_576;

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → accepted, logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            let known_keys = ["api_base", "cache_items", "cache_dir", "refresh_minutes"];
            for key in raw.keys() {
                if !known_keys.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(&content)?;
        tracing::info!(path = %path.display(), cache_items = config.cache_items, "Loaded configuration");
        Ok(config)
    }

    /// Resolved cache directory: the configured override, else the platform
    /// cache dir plus `tidings/`.
    pub fn cache_dir(&self) -> Result<PathBuf, ConfigError> {
        if let Some(dir) = &self.cache_dir {
            return Ok(dir.clone());
        }
        dirs::cache_dir()
            .map(|dir| dir.join("tidings"))
            .ok_or(ConfigError::NoCacheDir)
    }

    /// Path of the relational cache database.
    pub fn db_path(&self) -> Result<PathBuf, ConfigError> {
        Ok(self.cache_dir()?.join("metadata.db"))
    }

    /// Directory of the content blob store.
    pub fn content_dir(&self) -> Result<PathBuf, ConfigError> {
        Ok(self.cache_dir()?.join("content"))
    }
}

// ============================================================================
// Tests
// ============================================================================
