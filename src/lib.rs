//! Vocab Drill - guided vocabulary drilling with speech
//!
//! This library provides the core of a vocabulary trainer:
//! - Per-word drill state machine with scoring and mistake logging
//! - Speech playback with supersession of stale requests
//! - Microphone capture with automatic end-of-utterance detection
//! - Text comparison for typed words and sentences
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                Session Controller                    │
//! │   Vocabulary  │  Article Study  │  Free Writing     │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │                  Drill Engine                        │
//! │   Learn  │  Drill  │  Copy Sentence  │  Make Sentence│
//! └──────┬─────────────┬──────────────────┬─────────────┘
//!        │             │                  │
//! ┌──────▼──────┐ ┌────▼─────────┐ ┌──────▼─────────────┐
//! │ Voice       │ │ Compare      │ │ Content / Progress │
//! │ TTS  │  VAD │ │ word │ sent. │ │ HTTP   │  SQLite   │
//! └─────────────┘ └──────────────┘ └────────────────────┘
//! ```

pub mod compare;
pub mod config;
pub mod content;
pub mod db;
pub mod drill;
pub mod error;
pub mod session;
pub mod supersede;
pub mod voice;
pub mod word;

pub use config::Config;
pub use content::{ContentService, HttpContentService};
pub use db::{DbPool, ProgressStore, SqliteStore};
pub use drill::{DrillEngine, DrillServices, DrillStep, DrillView};
pub use error::{Error, Result};
pub use session::{SessionController, Stage};
pub use word::WordUnit;
