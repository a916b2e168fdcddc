//! Configuration management for fulllines
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
    /// Root URL of the remote content service
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Section catalog JSON file
    #[serde(default = "default_sections_file")]
    pub sections_file: String,

    /// Speaker catalog JSON file
    #[serde(default = "default_characters_file")]
    pub characters_file: String,

    /// Fetch configuration
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Search configuration
    #[serde(default)]
    pub search: SearchConfig,

    /// Paths configuration (internal, not user-editable)
    #[serde(skip)]
    pub paths: PathsConfig,
}

/// Remote fetch configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Request timeout in seconds
    #[serde(default = "default_fetch_timeout")]
    pub timeout_secs: u64,

    /// Minimum delay between two file fetches, in milliseconds
    #[serde(default = "default_request_delay_ms")]
    pub request_delay_ms: u64,

    /// Consecutive failures that abort the whole run
    #[serde(default = "default_max_consecutive_failures")]
    pub max_consecutive_failures: u32,

    /// User agent string
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

/// Search configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Limit applied when the caller gives none (unbounded if unset)
    #[serde(default)]
    pub default_limit: Option<usize>,

    /// Hard cap on returned rows
    #[serde(default = "default_search_max_results")]
    pub max_results: usize,
}

/// Internal paths configuration
#[derive(Debug, Clone, Default)]
pub struct PathsConfig {
    /// Base directory for fulllines data
    pub base_dir: PathBuf,

    /// Path to config file
    pub config_file: PathBuf,

    /// Path to SQLite database
    pub db_file: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            sections_file: default_sections_file(),
            characters_file: default_characters_file(),
            fetch: FetchConfig::default(),
            search: SearchConfig::default(),
            paths: PathsConfig::default(),
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_fetch_timeout(),
            request_delay_ms: default_request_delay_ms(),
            max_consecutive_failures: default_max_consecutive_failures(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_limit: None,
            max_results: default_search_max_results(),
        }
    }
}

impl FetchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }
}

impl Config {
    /// Get the default base directory for fulllines (~/.fulllines)
    pub fn default_base_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".fulllines")
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        Self::default_base_dir().join("config.toml")
    }

    /// Initialize paths configuration
    pub fn init_paths(&mut self, base_dir: Option<PathBuf>) {
        let base = base_dir.unwrap_or_else(Self::default_base_dir);
        self.paths = PathsConfig {
            config_file: base.join("config.toml"),
            db_file: base.join("lines.db"),
            base_dir: base,
        };
    }

    /// Load configuration from a specific file path
    pub fn load(config_path: &Path) -> Result<Self> {
        debug!("Loading config from {:?}", config_path);

        if !config_path.exists() {
            return Err(Error::NotInitialized(config_path.to_path_buf()));
        }

        let content = std::fs::read_to_string(config_path)?;
        let mut config: Config = toml::from_str(&content)?;

        let base = config_path.parent().unwrap_or(Path::new(".")).to_path_buf();
        config.paths = PathsConfig {
            config_file: config_path.to_path_buf(),
            db_file: base.join("lines.db"),
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

    /// Resolve a catalog path against the base directory
    fn resolve(&self, file: &str) -> PathBuf {
        let path = PathBuf::from(file);
        if path.is_absolute() {
            path
        } else {
            self.paths.base_dir.join(path)
        }
    }

    pub fn sections_path(&self) -> PathBuf {
        self.resolve(&self.sections_file)
    }

    pub fn characters_path(&self) -> PathBuf {
        self.resolve(&self.characters_file)
    }

    /// Parsed service root
    pub fn base_url(&self) -> Result<Url> {
        Ok(Url::parse(&self.base_url)?)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let url = Url::parse(&self.base_url)
            .map_err(|e| Error::Config(format!("base_url '{}' is invalid: {}", self.base_url, e)))?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(Error::Config(
                "base_url must use http or https".to_string(),
            ));
        }

        if self.fetch.max_consecutive_failures == 0 {
            return Err(Error::Config(
                "fetch.max_consecutive_failures must be at least 1".to_string(),
            ));
        }

        if self.fetch.timeout_secs == 0 {
            return Err(Error::Config(
                "fetch.timeout_secs must be positive".to_string(),
            ));
        }

        if self.search.max_results == 0 {
            return Err(Error::Config(
                "search.max_results must be positive".to_string(),
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
        assert_eq!(config.fetch.max_consecutive_failures, 3);
        assert_eq!(config.fetch.timeout_secs, 15);
        assert_eq!(config.fetch.request_delay_ms, 2000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_save_load() {
        let tmp = TempDir::new().unwrap();
        let mut config = Config::default();
        config.init_paths(Some(tmp.path().to_path_buf()));
        config.fetch.request_delay_ms = 10;

        config.save().unwrap();
        assert!(config.paths.config_file.exists());

        let loaded = Config::load_from(Some(tmp.path().to_path_buf())).unwrap();
        assert_eq!(loaded.fetch.request_delay_ms, 10);
        assert_eq!(loaded.paths.db_file, tmp.path().join("lines.db"));
    }

    #[test]
    fn test_missing_config_file_is_not_initialized() {
        let tmp = TempDir::new().unwrap();
        let missing = tmp.path().join("config.toml");
        match Config::load(&missing) {
            Err(Error::NotInitialized(path)) => assert_eq!(path, missing),
            other => panic!("expected NotInitialized, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str("base_url = \"http://localhost:9000\"\n").unwrap();
        assert_eq!(config.base_url, "http://localhost:9000");
        assert_eq!(config.fetch.max_consecutive_failures, 3);
        assert_eq!(config.sections_file, "sections.json");
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();

        config.fetch.max_consecutive_failures = 0;
        assert!(config.validate().is_err());
        config.fetch.max_consecutive_failures = 3;

        config.base_url = "not a url".to_string();
        assert!(config.validate().is_err());

        config.base_url = "ftp://example.com".to_string();
        assert!(config.validate().is_err());

        config.base_url = "http://example.com".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_catalog_paths_resolve_against_base_dir() {
        let mut config = Config::default();
        config.init_paths(Some(PathBuf::from("/data/fulllines")));
        assert_eq!(
            config.sections_path(),
            PathBuf::from("/data/fulllines/sections.json")
        );

        config.characters_file = "/etc/chars.json".to_string();
        assert_eq!(config.characters_path(), PathBuf::from("/etc/chars.json"));
    }
}
