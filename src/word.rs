//! Vocabulary entries

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::Result;
use crate::content::WordExtras;

/// One word to drill, immutable for the length of a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WordUnit {
    pub word: String,
    #[serde(default)]
    pub phonetic: String,
    #[serde(default)]
    pub definition: String,
    #[serde(default)]
    pub definition_translation: String,
    #[serde(default)]
    pub translation: String,
    #[serde(default)]
    pub example_sentence: String,
    #[serde(default)]
    pub example_translation: String,
    /// Hyphen-delimited syllables, e.g. "pho-to-syn-the-sis"
    #[serde(default)]
    pub syllable_split: String,
    #[serde(default)]
    pub part_of_speech: String,
    /// Synonyms, antonyms and roots, when already known
    #[serde(default)]
    pub extras: Option<WordExtras>,
}

impl WordUnit {
    /// Minimal entry with just the word and its example sentence
    #[must_use]
    pub fn new(word: impl Into<String>, example_sentence: impl Into<String>) -> Self {
        Self {
            word: word.into(),
            phonetic: String::new(),
            definition: String::new(),
            definition_translation: String::new(),
            translation: String::new(),
            example_sentence: example_sentence.into(),
            example_translation: String::new(),
            syllable_split: String::new(),
            part_of_speech: String::new(),
            extras: None,
        }
    }

    /// Syllables from the hyphenated split, or the whole word if none is given
    #[must_use]
    pub fn syllables(&self) -> Vec<&str> {
        let parts: Vec<&str> = self
            .syllable_split
            .split('-')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();

        if parts.is_empty() {
            vec![self.word.as_str()]
        } else {
            parts
        }
    }
}

/// Load a JSON array of words
///
/// # Errors
///
/// Returns error if the file cannot be read or parsed
pub fn load_word_list(path: &Path) -> Result<Vec<WordUnit>> {
    let content = std::fs::read_to_string(path)?;
    let words: Vec<WordUnit> = serde_json::from_str(&content)?;
    tracing::debug!(path = %path.display(), count = words.len(), "loaded word list");
    Ok(words)
}
