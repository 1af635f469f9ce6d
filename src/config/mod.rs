//! Configuration management for offline-bible
//!
//! Handles loading, saving, and validating configuration from TOML files.

mod defaults;

pub use defaults::*;

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Translation used when none is given on the command line
    #[serde(default = "default_translation")]
    pub default_translation: String,

    /// Remote scripture API
    #[serde(default)]
    pub remote: RemoteConfig,

    /// Bulk import behaviour
    #[serde(default)]
    pub import: ImportConfig,

    /// Interactive chapter reads
    #[serde(default)]
    pub reader: ReaderConfig,

    /// Paths configuration (internal, not user-editable)
    #[serde(skip)]
    pub paths: PathsConfig,
}

/// Remote scripture API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Base URL that `/bible/books` and `/bible/chapter` hang off
    #[serde(default = "default_remote_base_url")]
    pub base_url: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_remote_timeout")]
    pub timeout_secs: u64,

    /// User agent string
    #[serde(default = "default_remote_user_agent")]
    pub user_agent: String,

    /// Client-side request pacing
    #[serde(default = "default_remote_requests_per_second")]
    pub requests_per_second: u32,
}

/// Bulk import configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportConfig {
    /// Attempts per chapter on network errors, first try included
    #[serde(default = "default_import_max_attempts")]
    pub max_attempts: u32,

    /// Backoff before the second attempt; doubles after every failure
    #[serde(default = "default_import_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Backoff ceiling
    #[serde(default = "default_import_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// Delete every stored verse of the translation before importing it again
    #[serde(default = "default_import_wipe_before_import")]
    pub wipe_before_import: bool,
}

/// Chapter reader configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReaderConfig {
    /// Store chapters fetched from the network for later offline reads
    #[serde(default = "default_reader_write_back")]
    pub write_back: bool,
}

/// Internal paths configuration
#[derive(Debug, Clone, Default)]
pub struct PathsConfig {
    /// Base directory for offline-bible data
    pub base_dir: PathBuf,

    /// Path to config file
    pub config_file: PathBuf,

    /// Path to SQLite database
    pub db_file: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_translation: default_translation(),
            remote: RemoteConfig::default(),
            import: ImportConfig::default(),
            reader: ReaderConfig::default(),
            paths: PathsConfig::default(),
        }
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: default_remote_base_url(),
            timeout_secs: default_remote_timeout(),
            user_agent: default_remote_user_agent(),
            requests_per_second: default_remote_requests_per_second(),
        }
    }
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_import_max_attempts(),
            initial_backoff_ms: default_import_initial_backoff_ms(),
            max_backoff_ms: default_import_max_backoff_ms(),
            wipe_before_import: default_import_wipe_before_import(),
        }
    }
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            write_back: default_reader_write_back(),
        }
    }
}

impl RemoteConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Config {
    /// Get the default base directory (~/.offline-bible)
    pub fn default_base_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".offline-bible")
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        Self::default_base_dir().join("config.toml")
    }

    /// Initialize paths configuration
    fn init_paths(&mut self, base_dir: Option<PathBuf>) {
        let base = base_dir.unwrap_or_else(Self::default_base_dir);
        self.paths = PathsConfig {
            config_file: base.join("config.toml"),
            db_file: base.join("scripture.db"),
            base_dir: base,
        };
    }

    /// Load configuration from a specific file path
    pub fn load(config_path: &Path) -> Result<Self> {
        debug!("Loading config from {:?}", config_path);

        if !config_path.exists() {
            return Err(Error::Config(format!(
                "Config file not found: {}",
                config_path.display()
            )));
        }

        let content = std::fs::read_to_string(config_path)?;
        let mut config: Config = toml::from_str(&content)?;

        let base = config_path.parent().unwrap_or(Path::new(".")).to_path_buf();
        config.paths = PathsConfig {
            config_file: config_path.to_path_buf(),
            db_file: base.join("scripture.db"),
            base_dir: base,
        };

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific base directory, falling back to defaults
    pub fn load_from(base_dir: Option<PathBuf>) -> Result<Self> {
        let mut config = Config::default();
        config.init_paths(base_dir);

        if config.paths.config_file.exists() {
            debug!("Loading config from {:?}", config.paths.config_file);
            let content = std::fs::read_to_string(&config.paths.config_file)?;
            let mut loaded: Config = toml::from_str(&content)?;
            loaded.paths = config.paths;
            config = loaded;
        } else {
            debug!("No config file found, using defaults");
        }

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.paths.config_file.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(&self.paths.config_file, content)?;
        info!("Saved config to {:?}", self.paths.config_file);
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        Url::parse(&self.remote.base_url).map_err(|e| {
            Error::Config(format!(
                "remote.base_url '{}' is not a valid URL: {}",
                self.remote.base_url, e
            ))
        })?;

        if self.remote.timeout_secs == 0 {
            return Err(Error::Config(
                "remote.timeout_secs must be positive".to_string(),
            ));
        }

        if self.remote.requests_per_second == 0 {
            return Err(Error::Config(
                "remote.requests_per_second must be positive".to_string(),
            ));
        }

        if self.import.max_attempts == 0 {
            return Err(Error::Config(
                "import.max_attempts must be at least 1".to_string(),
            ));
        }

        if self.import.initial_backoff_ms > self.import.max_backoff_ms {
            return Err(Error::Config(
                "import.initial_backoff_ms must be <= import.max_backoff_ms".to_string(),
            ));
        }

        if self.default_translation.trim().is_empty() {
            return Err(Error::Config(
                "default_translation must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.default_translation, "KJV");
        assert!(config.import.wipe_before_import);
        assert!(config.reader.write_back);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_save_load() {
        let tmp = TempDir::new().unwrap();
        let mut config = Config::default();
        config.init_paths(Some(tmp.path().to_path_buf()));
        config.default_translation = "WEB".to_string();
        config.import.max_attempts = 7;

        config.save().unwrap();
        assert!(config.paths.config_file.exists());

        let loaded = Config::load_from(Some(tmp.path().to_path_buf())).unwrap();
        assert_eq!(loaded.default_translation, "WEB");
        assert_eq!(loaded.import.max_attempts, 7);
        assert_eq!(loaded.paths.db_file, tmp.path().join("scripture.db"));
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "[reader]\nwrite_back = false\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert!(!config.reader.write_back);
        assert_eq!(config.import.max_attempts, default_import_max_attempts());
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();

        config.import.max_attempts = 0;
        assert!(config.validate().is_err());
        config.import.max_attempts = 3;
        assert!(config.validate().is_ok());

        config.import.initial_backoff_ms = config.import.max_backoff_ms + 1;
        assert!(config.validate().is_err());
        config.import.initial_backoff_ms = 100;

        config.remote.timeout_secs = 0;
        assert!(config.validate().is_err());
        config.remote.timeout_secs = 5;

        config.remote.base_url = "not a url".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_config_file() {
        let tmp = TempDir::new().unwrap();
        let err = Config::load(&tmp.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
