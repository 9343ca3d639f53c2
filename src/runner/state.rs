use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::RunnerError;

/// The four states of one batch.
///
/// Each batch flows through: IDLE → SUBMITTING → DRAINING → DONE
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchState {
    Idle,
    Submitting,
    Draining,
    Done,
}

impl fmt::Display for BatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatchState::Idle => write!(f, "IDLE"),
            BatchState::Submitting => write!(f, "SUBMITTING"),
            BatchState::Draining => write!(f, "DRAINING"),
            BatchState::Done => write!(f, "DONE"),
        }
    }
}

impl BatchState {
    /// Compute the state after moving to `next`.
    ///
    /// - `Idle` may start submitting, or drain straight away for an empty batch.
    /// - `Submitting` stays put for every further submission, then drains.
    /// - `Draining` only ends in `Done`.
    /// - `Done` is terminal; a new batch needs a new runner.
    pub fn advance(self, next: BatchState) -> Result<BatchState, RunnerError> {
        use BatchState::*;

        match (self, next) {
            (Idle, Submitting)
            | (Submitting, Submitting)
            | (Idle, Draining)
            | (Submitting, Draining)
            | (Draining, Done) => Ok(next),
            (from, to) => Err(RunnerError::InvalidTransition { from, to }),
        }
    }

    pub fn is_terminal(self) -> bool {
        self == BatchState::Done
    }
}
