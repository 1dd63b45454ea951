//! Results of drill operations

use crate::compare::Diagnosis;
use crate::content::{FollowUpAnswer, PronunciationGrade, SentenceVerdict, WordExtras};

use super::state::DrillStep;

/// Learner-facing message attached to an outcome
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// Typed word did not match
    TryAgain,
    /// Copied sentence did not match
    Hint(Diagnosis),
    /// A content service call failed; the learner can resubmit
    ServiceUnavailable(String),
    /// Speech could not be played
    SpeechFailed(String),
    /// No microphone or voice is disabled
    MicrophoneUnavailable(String),
    /// Recording ended without any speech
    NoSpeechDetected,
}

impl Notice {
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::TryAgain => "Not quite, listen again and retype the word.".to_string(),
            Self::Hint(diagnosis) => diagnosis.hint(),
            Self::ServiceUnavailable(e) => format!("The service is unavailable, try again ({e})."),
            Self::SpeechFailed(e) => format!("Could not play audio ({e})."),
            Self::MicrophoneUnavailable(e) => format!("Microphone unavailable ({e})."),
            Self::NoSpeechDetected => "No speech detected.".to_string(),
        }
    }
}

impl std::fmt::Display for Notice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message())
    }
}

/// Where navigation left the drill
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Now at `step` of the word at `index`
    Moved {
        index: usize,
        step: DrillStep,
        /// Entry audio could not be played
        notice: Option<Notice>,
    },
    /// Past the last word
    Completed,
    /// Navigation not available from here
    Stayed,
}

/// Result of a typed submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Input matched; `next` is the step entered as a result, if any
    Correct {
        awarded: u32,
        next: Option<DrillStep>,
        notice: Option<Notice>,
    },
    /// Input did not match; `audio` is set when the replayed cue failed
    Incorrect {
        notice: Notice,
        audio: Option<Notice>,
    },
    /// Sentence graded by the content service
    Graded {
        verdict: SentenceVerdict,
        awarded: u32,
    },
    /// The content service failed; nothing changed
    Failed(Notice),
    /// The learner moved on before the result arrived
    Stale,
    /// Submission does not apply to the current step
    WrongStep(DrillStep),
}

impl SubmitOutcome {
    /// Points awarded by this submission
    #[must_use]
    pub const fn awarded(&self) -> u32 {
        match self {
            Self::Correct { awarded, .. } | Self::Graded { awarded, .. } => *awarded,
            _ => 0,
        }
    }
}

/// Result of a pronunciation attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PronunciationOutcome {
    Graded {
        grade: PronunciationGrade,
        awarded: u32,
    },
    /// Recording ended without speech, or was discarded
    NoSpeech,
    /// No microphone
    Unavailable(Notice),
    /// Grading failed
    Failed(Notice),
    Stale,
}

impl PronunciationOutcome {
    /// Learner-facing message, if the attempt was not graded
    #[must_use]
    pub fn notice(&self) -> Option<Notice> {
        match self {
            Self::NoSpeech => Some(Notice::NoSpeechDetected),
            Self::Unavailable(notice) | Self::Failed(notice) => Some(notice.clone()),
            Self::Graded { .. } | Self::Stale => None,
        }
    }
}

/// Result of a follow-up question
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FollowUpOutcome {
    Answered(FollowUpAnswer),
    /// Follow-up questions need sentence feedback first
    NoFeedback,
    Failed(Notice),
    Stale,
}

/// Result of loading word extras
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtrasOutcome {
    Loaded(WordExtras),
    Failed(Notice),
    Stale,
}
