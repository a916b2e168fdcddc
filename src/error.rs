//! Custom error types for fulllines

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for fulllines operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Catalog error: {0}")]
    Catalog(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Failed {label}: {reason}")]
    Fetch { label: String, reason: String },

    #[error("Operation cancelled: {failures} consecutive failures detected. Last error: {last_error}")]
    CircuitBreaker { failures: u32, last_error: String },

    #[error("Malformed payload for {label}: {reason}")]
    Payload { label: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Config file not found: {}. Run 'fulllines init' first", .0.display())]
    NotInitialized(PathBuf),

    #[error("An extraction run is already active")]
    RunInProgress,
}

impl Error {
    /// True for the consecutive-failure abort, which must end the whole run
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::CircuitBreaker { .. })
    }
}

/// Result type alias for fulllines
pub type Result<T> = std::result::Result<T, Error>;
