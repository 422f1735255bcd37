use serde::{Deserialize, Serialize};

/// Represents the current state of the submission wizard
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, Eq)]
pub enum State {
    /// No submission in progress
    #[default]
    Idle,
    /// Waiting for the source face image
    AwaitingFirstInput,
    /// Waiting for the target image or video
    AwaitingSecondInput {
        /// Where the accepted first input was persisted
        source_path: String,
    },
}

impl State {
    /// The wizard's transition table.
    ///
    /// `/start` (re)enters `AwaitingFirstInput` from any state; accepting
    /// the first input moves to `AwaitingSecondInput`; completing or
    /// aborting a submission returns to `Idle`. Everything else stays put.
    #[must_use]
    pub const fn can_transition_to(&self, next: &Self) -> bool {
        matches!(
            (self, next),
            (_, Self::AwaitingFirstInput)
                | (Self::AwaitingFirstInput, Self::AwaitingSecondInput { .. })
                | (_, Self::Idle)
        )
    }
}
