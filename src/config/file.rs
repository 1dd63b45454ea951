//! TOML configuration file loading
//!
//! Supports `~/.config/vocab-drill/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::Result;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct DrillConfigFile {
    /// Learner name used for points, history and mistakes
    #[serde(default)]
    pub username: Option<String>,

    /// Override for the data directory (database)
    #[serde(default)]
    pub data_dir: Option<String>,

    /// Content generation service
    #[serde(default)]
    pub content: ContentFileConfig,

    /// Voice/audio configuration
    #[serde(default)]
    pub voice: VoiceFileConfig,

    /// Session sequencing
    #[serde(default)]
    pub session: SessionFileConfig,
}

/// Content service configuration
#[derive(Debug, Default, Deserialize)]
pub struct ContentFileConfig {
    /// Base URL (e.g. "http://localhost:7070")
    pub base_url: Option<String>,

    /// Bearer token
    pub api_key: Option<String>,

    /// Request timeout in seconds
    pub timeout_secs: Option<u64>,
}

/// Voice processing configuration
#[derive(Debug, Default, Deserialize)]
pub struct VoiceFileConfig {
    /// Enable speech playback and capture
    pub enabled: Option<bool>,

    /// RMS energy above which input counts as speech
    pub speech_threshold: Option<f32>,

    /// Silence after speech that ends an utterance
    pub trailing_silence_ms: Option<u64>,

    /// Silence before any speech that abandons a capture
    pub no_speech_timeout_ms: Option<u64>,

    /// Sampling loop period
    pub tick_ms: Option<u64>,

    /// Samples analysed per tick
    pub window: Option<usize>,
}

/// Session sequencing configuration
#[derive(Debug, Default, Deserialize)]
pub struct SessionFileConfig {
    /// Words drilled before moving on to article study
    pub batch_size: Option<usize>,
}

/// Load the TOML config file from the standard path
///
/// Returns `DrillConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> DrillConfigFile {
    config_file_path().map_or_else(DrillConfigFile::default, |path| load_from(&path))
}

/// Load a TOML config file from an explicit path, falling back to defaults
pub fn load_from(path: &Path) -> DrillConfigFile {
    if !path.exists() {
        return DrillConfigFile::default();
    }

    match parse_file(path) {
        Ok(config) => {
            tracing::info!(path = %path.display(), "loaded config file");
            config
        }
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to load config file, using defaults"
            );
            DrillConfigFile::default()
        }
    }
}

/// Read and parse a TOML config file
///
/// # Errors
///
/// Returns `Error::Io` if the file can't be read, or `Error::Toml` if it
/// isn't valid
pub fn parse_file(path: &Path) -> Result<DrillConfigFile> {
    let content = std::fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Return the config file path: `~/.config/vocab-drill/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("vocab-drill").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file() {
        let file: DrillConfigFile = toml::from_str(
            r#"
            username = "ada"

            [voice]
            speech_threshold = 0.02
            "#,
        )
        .unwrap();

        assert_eq!(file.username.as_deref(), Some("ada"));
        assert_eq!(file.voice.speech_threshold, Some(0.02));
        assert!(file.content.base_url.is_none());
        assert!(file.session.batch_size.is_none());
    }

    #[test]
    fn test_unparseable_file_falls_back() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "username = [").unwrap();

        assert!(matches!(parse_file(&path), Err(crate::Error::Toml(_))));

        let file = load_from(&path);
        assert!(file.username.is_none());
    }

    #[test]
    fn test_missing_file_is_default() {
        let file = load_from(Path::new("/nonexistent/vocab-drill.toml"));
        assert!(file.data_dir.is_none());
    }
}
