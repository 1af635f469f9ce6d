//! Custom error types for offline-bible

use thiserror::Error;

/// Main error type for offline-bible operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    /// The local verse store could not be opened or created.
    /// Offline features are unavailable; reads degrade to network-only.
    #[error("Local store unavailable: {0}")]
    StorageInit(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Transient transport failure (connect, timeout, 5xx, 429)
    #[error("Network error: {0}")]
    Network(String),

    /// The remote confirmed the resource does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// The remote answered with a body that does not match the API contract
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    /// Neither the local store nor the remote could serve the chapter
    #[error("{translation} {book} {chapter} is not available offline, connect to download")]
    ChapterUnavailable {
        translation: String,
        book: String,
        chapter: u32,
    },

    #[error("Import of {0} was cancelled")]
    ImportCancelled(String),

    #[error("An import of {0} is already running")]
    ImportInProgress(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Only transport failures are worth another attempt
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Network(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}

/// Result type alias for offline-bible
pub type Result<T> = std::result::Result<T, Error>;
