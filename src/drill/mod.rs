//! Drill step state machine
//!
//! Each word goes through four steps:
//!
//! ```text
//! Learn ──advance──▶ Drill ──3 correct──▶ CopySentence ──match──▶ MakeSentence ──advance──▶ next word
//!   ▲                  │                       │                        │
//!   └──────back────────┘◀────────back──────────┘◀─────────back──────────┘
//! ```
//!
//! Back from Learn re-enters the previous word at MakeSentence. Jumping to a
//! word always starts it afresh at Learn.

mod engine;
mod mistakes;
mod outcome;
pub mod scoring;
mod state;

pub use engine::{DrillEngine, DrillServices, SharedCapture};
pub use mistakes::MistakeLog;
pub use outcome::{
    ExtrasOutcome, FollowUpOutcome, Notice, PronunciationOutcome, SubmitOutcome, Transition,
};
pub use state::{AwardFlags, DrillStep, DrillView, REPETITIONS, WordAnnotations};
