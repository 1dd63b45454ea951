//! Typed input grading tests

use vocab_drill::compare::{
    Diagnosis, Segment, diagnose_mismatch, sentences_match, split_bold_segments, words_match,
};

fn segment(bold: bool, text: &str) -> Segment {
    Segment {
        bold,
        text: text.to_string(),
    }
}

#[test]
fn test_words_ignore_case_and_whitespace() {
    assert!(words_match("Photosynthesis", "  photosynthesis "));
    assert!(!words_match("photosynthesi", "photosynthesis"));
    // Inner characters still count
    assert!(!words_match("well known", "well-known"));
}

#[test]
fn test_sentences_ignore_punctuation() {
    assert!(sentences_match("The cat sat on the mat.", "the cat sat on the mat"));
    assert!(sentences_match("Yes, (of course)!", "yes of course"));
    assert!(!sentences_match("The cat sat", "The cat sat on the mat."));
}

#[test]
fn test_diagnose_first_divergent_token() {
    assert_eq!(
        diagnose_mismatch("I like the dog", "I like the cat"),
        Diagnosis::Typo {
            actual: "dog".to_string(),
            expected: "cat".to_string()
        }
    );

    // Later divergences are not reported
    assert_eq!(
        diagnose_mismatch("I love the dog", "I like the cat"),
        Diagnosis::Typo {
            actual: "love".to_string(),
            expected: "like".to_string()
        }
    );
}

#[test]
fn test_diagnose_missing_and_extra_words() {
    assert_eq!(
        diagnose_mismatch("I like", "I like the cat."),
        Diagnosis::MissingWord("the".to_string())
    );
    assert_eq!(
        diagnose_mismatch("I like the cat very much", "I like the cat."),
        Diagnosis::ExtraWords
    );
}

#[test]
fn test_diagnose_punctuation_splits_tokens() {
    // "well-known" and "well known" tokenize alike but do not match as sentences
    assert!(!sentences_match("a well known fact", "a well-known fact"));
    assert_eq!(
        diagnose_mismatch("a well known fact", "a well-known fact"),
        Diagnosis::GenericMismatch
    );
}

#[test]
fn test_split_bold_segments() {
    assert_eq!(
        split_bold_segments("She was **candid** about it."),
        vec![
            segment(false, "She was "),
            segment(true, "candid"),
            segment(false, " about it."),
        ]
    );

    assert_eq!(
        split_bold_segments("**Bold** start"),
        vec![segment(true, "Bold"), segment(false, " start")]
    );

    assert_eq!(split_bold_segments("plain"), vec![segment(false, "plain")]);
    assert!(split_bold_segments("").is_empty());
}
