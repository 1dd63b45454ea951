//! Grading of typed input
//!
//! Words are compared exactly (case and surrounding whitespace ignored).
//! Sentences additionally ignore a fixed set of punctuation. When a copied
//! sentence does not match, [`diagnose_mismatch`] points at the first token
//! that diverges; it does not try to align the whole sentence.

use std::sync::LazyLock;

use regex::Regex;

/// Punctuation ignored when comparing sentences
static PUNCTUATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[.,/#!$%^&*;:{}=\-_`~()]").expect("valid regex"));

/// `**bold**` markdown segment
static BOLD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*(.*?)\*\*").expect("valid regex"));

/// First divergence between a copied sentence and its target
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnosis {
    /// The input stops before this target word
    MissingWord(String),
    /// The input has `actual` where the target has `expected`
    Typo { actual: String, expected: String },
    /// Every target word is present but the input keeps going
    ExtraWords,
    /// Tokens agree but the sentences still differ (spacing, for instance)
    GenericMismatch,
}

impl Diagnosis {
    /// Hint shown to the learner
    #[must_use]
    pub fn hint(&self) -> String {
        match self {
            Self::MissingWord(expected) => format!("A word is missing here: \"{expected}\"."),
            Self::Typo { actual, expected } => {
                format!("Check \"{actual}\": it should be \"{expected}\".")
            }
            Self::ExtraWords => "There are extra words at the end.".to_string(),
            Self::GenericMismatch => {
                "Not quite. Compare your sentence with the example carefully.".to_string()
            }
        }
    }
}

/// Lowercase and trim
#[must_use]
pub fn normalize_for_exact_match(s: &str) -> String {
    s.trim().to_lowercase()
}

/// Whether a typed word matches its target
#[must_use]
pub fn words_match(input: &str, target: &str) -> bool {
    normalize_for_exact_match(input) == normalize_for_exact_match(target)
}

/// Lowercase, strip punctuation, trim
#[must_use]
pub fn normalize_for_sentence_match(s: &str) -> String {
    PUNCTUATION
        .replace_all(&s.to_lowercase(), "")
        .trim()
        .to_string()
}

/// Whether a copied sentence matches its target, ignoring case and punctuation
#[must_use]
pub fn sentences_match(input: &str, target: &str) -> bool {
    normalize_for_sentence_match(input) == normalize_for_sentence_match(target)
}

/// Punctuation becomes a word boundary rather than disappearing
fn tokenize(s: &str) -> Vec<String> {
    PUNCTUATION
        .replace_all(&s.to_lowercase(), " ")
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// Locate the first divergence between `input` and `target`
#[must_use]
pub fn diagnose_mismatch(input: &str, target: &str) -> Diagnosis {
    let actual = tokenize(input);
    let expected = tokenize(target);

    for (i, want) in expected.iter().enumerate() {
        match actual.get(i) {
            None => return Diagnosis::MissingWord(want.clone()),
            Some(got) if got != want => {
                return Diagnosis::Typo {
                    actual: got.clone(),
                    expected: want.clone(),
                };
            }
            Some(_) => {}
        }
    }

    if actual.len() > expected.len() {
        Diagnosis::ExtraWords
    } else {
        Diagnosis::GenericMismatch
    }
}

/// A run of text, bold or plain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub bold: bool,
    pub text: String,
}

/// Split `**bold**` markdown into segments, keeping all other text
///
/// An unterminated `**` stays in the plain text.
#[must_use]
pub fn split_bold_segments(text: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut cursor = 0;

    for caps in BOLD.captures_iter(text) {
        let (Some(whole), Some(inner)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        if whole.start() > cursor {
            segments.push(Segment {
                bold: false,
                text: text[cursor..whole.start()].to_string(),
            });
        }
        segments.push(Segment {
            bold: true,
            text: inner.as_str().to_string(),
        });
        cursor = whole.end();
    }

    if cursor < text.len() {
        segments.push(Segment {
            bold: false,
            text: text[cursor..].to_string(),
        });
    }

    segments
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_words_match() {
        assert!(words_match("Photosynthesis", "  photosynthesis "));
        assert!(!words_match("photosynthesi", "photosynthesis"));
    }

    #[test]
    fn test_sentence_normalization() {
        assert_eq!(
            normalize_for_sentence_match("  Well-known (really)!  "),
            "wellknown really"
        );
    }

    #[test]
    fn test_tokenize_splits_on_punctuation() {
        assert_eq!(tokenize("well-known, right?"), vec!["well", "known", "right?"]);
    }

    #[test]
    fn test_missing_word() {
        assert_eq!(
            diagnose_mismatch("I like the", "I like the cat"),
            Diagnosis::MissingWord("cat".to_string())
        );
    }

    #[test]
    fn test_bold_unterminated() {
        let segments = split_bold_segments("a **b");
        assert_eq!(segments.len(), 1);
        assert!(!segments[0].bold);
        assert_eq!(segments[0].text, "a **b");
    }
}
