pub mod hint;
pub mod machine;

pub use hint::{hint_for, passes_check, ConfidenceBand};
pub use machine::{ConfidenceSample, FeedbackMachine, FeedbackPhase, FeedbackState, MasteryEvent};
