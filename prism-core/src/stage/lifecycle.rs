//! The stage state machine.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{PrismError, Result};

/// Where a stage is in its life.
///
/// `Configured → Running → Finalized`, with `Running → Failed` on any
/// unhandled error. `Finalized` and `Failed` are terminal: a terminal stage
/// is never re-entered, it is reconstructed for a retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StageState {
    /// Built and configured, not yet started.
    Configured,
    /// Inputs resolved, computation in progress.
    Running,
    /// All work done, outputs registered.
    Finalized,
    /// An unrecoverable error occurred; no outputs were registered.
    Failed,
}

impl StageState {
    /// Whether this state permits no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, StageState::Finalized | StageState::Failed)
    }
}

impl fmt::Display for StageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageState::Configured => write!(f, "Configured"),
            StageState::Running => write!(f, "Running"),
            StageState::Finalized => write!(f, "Finalized"),
            StageState::Failed => write!(f, "Failed"),
        }
    }
}

/// Tracks and guards the state of one stage instance.
#[derive(Debug)]
pub(crate) struct Lifecycle {
    stage: String,
    state: StageState,
}

impl Lifecycle {
    /// Starts in `Configured` (fit and transform shapes).
    pub(crate) fn configured(stage: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            state: StageState::Configured,
        }
    }

    /// Starts directly in `Running` (sample shape).
    pub(crate) fn running(stage: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            state: StageState::Running,
        }
    }

    pub(crate) fn state(&self) -> StageState {
        self.state
    }

    /// Rejects driving a terminal stage again.
    pub(crate) fn ensure_startable(&self) -> Result<()> {
        if self.state.is_terminal() {
            return Err(PrismError::StageAlreadyTerminal {
                stage: self.stage.clone(),
                state: self.state,
            });
        }
        Ok(())
    }

    /// Enters `Running`; a sample-shape stage is already there.
    pub(crate) fn begin(&mut self) -> Result<()> {
        self.ensure_startable()?;
        self.state = StageState::Running;
        Ok(())
    }

    /// Enters `Finalized` from `Running`.
    pub(crate) fn finalize(&mut self) -> Result<()> {
        if self.state != StageState::Running {
            return Err(PrismError::internal(format!(
                "stage '{}' cannot finalize from state {}",
                self.stage, self.state
            )));
        }
        self.state = StageState::Finalized;
        Ok(())
    }

    /// Enters `Failed` from any non-terminal state.
    pub(crate) fn fail(&mut self) {
        if !self.state.is_terminal() {
            self.state = StageState::Failed;
        }
    }
}
