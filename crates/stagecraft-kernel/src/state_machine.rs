//! Stage lifecycle state machine

use std::fmt;

use serde::Serialize;

/// Lifecycle state of one stage execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageState {
    /// Descriptor taken, nothing executed yet
    Created,
    /// Modelers and preprocess operations done
    Preprocessed,
    /// Stage instance constructed
    Initialized,
    /// Stage run contract in progress
    Running,
    /// Stage run contract returned
    Finalized,
    /// Postprocess operations done
    Postprocessed,
    /// Aborted
    Failed,
}

impl StageState {
    /// Every state, in lifecycle order
    pub const ALL: [StageState; 7] = [
        Self::Created,
        Self::Preprocessed,
        Self::Initialized,
        Self::Running,
        Self::Finalized,
        Self::Postprocessed,
        Self::Failed,
    ];

    /// No transition leaves a terminal state
    #[inline]
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Postprocessed | Self::Failed)
    }
}

impl fmt::Display for StageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            Self::Created => "created",
            Self::Preprocessed => "preprocessed",
            Self::Initialized => "initialized",
            Self::Running => "running",
            Self::Finalized => "finalized",
            Self::Postprocessed => "postprocessed",
            Self::Failed => "failed",
        })
    }
}

/// State machine errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StageStateError {
    /// Transition not in [`allowed_transitions`]
    #[error("illegal stage transition {from} -> {to}")]
    IllegalTransition {
        /// Current state
        from: StageState,
        /// Requested state
        to: StageState,
    },
}

/// States reachable from `from` in one step
#[must_use]
pub fn allowed_transitions(from: StageState) -> &'static [StageState] {
    use StageState::*;
    match from {
        Created => &[Preprocessed, Failed],
        Preprocessed => &[Initialized, Failed],
        Initialized => &[Running, Failed],
        Running => &[Finalized, Failed],
        Finalized => &[Postprocessed, Failed],
        Postprocessed | Failed => &[],
    }
}

/// Validate a state transition
///
/// # Errors
/// Returns [`StageStateError::IllegalTransition`] if `to` is not reachable
/// from `from` in one step
pub fn validate_transition(from: StageState, to: StageState) -> Result<(), StageStateError> {
    if allowed_transitions(from).contains(&to) {
        Ok(())
    } else {
        Err(StageStateError::IllegalTransition { from, to })
    }
}
