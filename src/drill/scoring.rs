//! Point values

use super::state::REPETITIONS;

/// Each of the two copy repetitions
pub const COPY_POINTS: u32 = 1;

/// The final repetition, typed from memory
pub const RECALL_POINTS: u32 = 3;

/// Copying the example sentence
pub const SENTENCE_COPY_POINTS: u32 = 5;

/// First correct original sentence for a word
pub const SENTENCE_POINTS: u32 = 10;

/// First pronunciation at or above [`PRONUNCIATION_THRESHOLD`] for a word
pub const PRONUNCIATION_POINTS: u32 = 5;

/// Minimum pronunciation score (out of 100) for the bonus
pub const PRONUNCIATION_THRESHOLD: u32 = 60;

/// Points for a correct drill repetition given how many were completed before it
#[must_use]
pub const fn repetition_points(completed: u8) -> u32 {
    if completed + 1 < REPETITIONS {
        COPY_POINTS
    } else {
        RECALL_POINTS
    }
}

/// Whether the repetition about to be typed is the recall one (word hidden)
#[must_use]
pub const fn is_recall(completed: u8) -> bool {
    completed + 1 == REPETITIONS
}
