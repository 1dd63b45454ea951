//! Configuration management for the drill engine
//!
//! Priority: environment variables, then the TOML file, then defaults.

pub mod file;

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use self::file::DrillConfigFile;
use crate::voice::{SpeechFormat, VadConfig};
use crate::{Error, Result};

/// Default content service URL
const DEFAULT_CONTENT_URL: &str = "http://localhost:7070";

/// Default content service request timeout
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default number of words per batch
pub const DEFAULT_BATCH_SIZE: usize = 10;

/// Drill engine configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Learner name used for points, history and mistakes
    pub username: String,

    /// Path to data directory (database)
    pub data_dir: PathBuf,

    /// Content generation service
    pub content: ContentConfig,

    /// Voice configuration
    pub voice: VoiceConfig,

    /// Session sequencing
    pub session: SessionConfig,
}

/// Content generation service configuration
#[derive(Debug, Clone)]
pub struct ContentConfig {
    pub base_url: String,
    pub api_key: Option<SecretString>,
    pub timeout_secs: u64,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_CONTENT_URL.to_string(),
            api_key: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

/// Voice processing configuration
#[derive(Debug, Clone)]
pub struct VoiceConfig {
    /// Enable speech playback and capture
    pub enabled: bool,

    /// End-of-utterance detection
    pub vad: VadConfig,

    /// Layout of synthesized speech
    pub speech: SpeechFormat,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            vad: VadConfig::default(),
            speech: SpeechFormat::default(),
        }
    }
}

/// Session sequencing configuration
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub batch_size: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl Config {
    /// Load configuration from the environment and the standard config file
    ///
    /// # Errors
    ///
    /// Returns error if the resulting configuration is invalid
    pub fn load() -> Result<Self> {
        Self::from_file(file::load_config_file())
    }

    /// Build configuration from a parsed file, applying environment overrides
    ///
    /// # Errors
    ///
    /// Returns error if the resulting configuration is invalid
    pub fn from_file(file: DrillConfigFile) -> Result<Self> {
        let username = env("DRILL_USERNAME")
            .or(file.username)
            .unwrap_or_else(|| "learner".to_string());

        // Determine data directory (~/.local/share/vocab-drill on Linux)
        let data_dir = env("DRILL_DATA_DIR")
            .or(file.data_dir)
            .map(PathBuf::from)
            .or_else(|| {
                directories::ProjectDirs::from("dev", "omni", "vocab-drill")
                    .map(|d| d.data_dir().to_path_buf())
            })
            .unwrap_or_else(|| PathBuf::from("."));

        let content = ContentConfig {
            base_url: env("DRILL_CONTENT_URL")
                .or(file.content.base_url)
                .unwrap_or_else(|| DEFAULT_CONTENT_URL.to_string()),
            api_key: env("DRILL_CONTENT_API_KEY")
                .or(file.content.api_key)
                .map(SecretString::from),
            timeout_secs: env("DRILL_CONTENT_TIMEOUT_SECS")
                .and_then(|s| s.parse().ok())
                .or(file.content.timeout_secs)
                .unwrap_or(DEFAULT_TIMEOUT_SECS),
        };

        let defaults = VadConfig::default();
        let vad = VadConfig {
            speech_threshold: env("DRILL_VAD_THRESHOLD")
                .and_then(|s| s.parse().ok())
                .or(file.voice.speech_threshold)
                .unwrap_or(defaults.speech_threshold),
            trailing_silence: file
                .voice
                .trailing_silence_ms
                .map_or(defaults.trailing_silence, Duration::from_millis),
            no_speech_timeout: file
                .voice
                .no_speech_timeout_ms
                .map_or(defaults.no_speech_timeout, Duration::from_millis),
            tick_interval: file
                .voice
                .tick_ms
                .map_or(defaults.tick_interval, Duration::from_millis),
            window: file.voice.window.unwrap_or(defaults.window),
        };

        let voice = VoiceConfig {
            enabled: !env("DRILL_DISABLE_VOICE").is_some_and(|v| v == "1" || v == "true")
                && file.voice.enabled.unwrap_or(true),
            vad,
            speech: SpeechFormat::default(),
        };

        let session = SessionConfig {
            batch_size: env("DRILL_BATCH_SIZE")
                .and_then(|s| s.parse().ok())
                .or(file.session.batch_size)
                .unwrap_or(DEFAULT_BATCH_SIZE),
        };

        let config = Self {
            username,
            data_dir,
            content,
            voice,
            session,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` describing the first invalid value
    pub fn validate(&self) -> Result<()> {
        if self.username.trim().is_empty() {
            return Err(Error::Config("username must not be empty".to_string()));
        }
        if self.session.batch_size == 0 {
            return Err(Error::Config("batch size must be at least 1".to_string()));
        }
        let threshold = self.voice.vad.speech_threshold;
        if !(threshold > 0.0 && threshold < 1.0) {
            return Err(Error::Config(format!(
                "speech threshold must be between 0 and 1, got {threshold}"
            )));
        }
        if self.voice.vad.tick_interval.is_zero() || self.voice.vad.window == 0 {
            return Err(Error::Config(
                "VAD tick interval and window must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Path of the progress database
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("drill.db")
    }
}

fn env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}
