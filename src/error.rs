//! Error types for the drill engine

use thiserror::Error;

/// Result type alias for drill operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the drill engine
///
/// A superseded async result is not an error; operations report it through
/// their outcome type instead.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Malformed base64 audio payload
    #[error("decode error: {0}")]
    Decode(#[from] base64::DecodeError),

    /// PCM payload with an invalid length for its framing
    #[error("format error: {0}")]
    Format(String),

    /// No microphone, or permission to use it was denied
    #[error("capture unavailable: {0}")]
    CaptureUnavailable(String),

    /// Audio device error
    #[error("audio error: {0}")]
    Audio(String),

    /// Content generation service call failed
    #[error("content generation failed: {0}")]
    Generation(String),

    /// Word index outside the active list
    #[error("no word at index {index} (list has {len})")]
    InvalidWord { index: usize, len: usize },

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Database error
    #[error("database error: {0}")]
    Database(String),

    /// `SQLite` error
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}
