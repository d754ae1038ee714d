use crate::changeset::ChangesetStatus;
use crate::common::Version;
use crate::errors::{MoveError, MoveResult};
use std::fmt::{Display, Formatter};

/// States of a migration run.
///
/// ```text
/// IDLE -> LOCKING -> DIFFING -> EXECUTING <-> RECORDING -> UNLOCKING -> DONE
///                                                                    \-> FAILED
/// ```
///
/// A failure in any state moves the run through `UNLOCKING` to `FAILED`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Locking,
    Diffing,
    Executing,
    Recording,
    Unlocking,
    Done,
    Failed,
}

impl RunState {
    pub(crate) fn transition(&mut self, next: RunState) {
        log::debug!("Migration run {} -> {}", self, next);
        *self = next;
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Done | RunState::Failed)
    }
}

impl Display for RunState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            RunState::Idle => write!(f, "IDLE"),
            RunState::Locking => write!(f, "LOCKING"),
            RunState::Diffing => write!(f, "DIFFING"),
            RunState::Executing => write!(f, "EXECUTING"),
            RunState::Recording => write!(f, "RECORDING"),
            RunState::Unlocking => write!(f, "UNLOCKING"),
            RunState::Done => write!(f, "DONE"),
            RunState::Failed => write!(f, "FAILED"),
        }
    }
}

/// Outcome of one changeset attempted or skipped by a run.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangesetOutcome {
    pub script: String,
    pub version: Version,
    pub status: ChangesetStatus,
    pub duration_ms: Option<u64>,
    pub error: Option<String>,
}

impl Display for ChangesetOutcome {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} v{} {}", self.script, self.version, self.status)?;
        if let Some(duration) = self.duration_ms {
            write!(f, " in {}ms", duration)?;
        }
        if let Some(error) = &self.error {
            write!(f, ": {}", error)?;
        }
        Ok(())
    }
}

/// Result of a migration run: its terminal state, what happened to every
/// changeset it touched, and the error that stopped it.
#[derive(Debug, Clone)]
pub struct RunReport {
    state: RunState,
    outcomes: Vec<ChangesetOutcome>,
    error: Option<MoveError>,
}

impl RunReport {
    pub(crate) fn new(state: RunState, outcomes: Vec<ChangesetOutcome>, error: Option<MoveError>) -> Self {
        RunReport {
            state,
            outcomes,
            error,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn outcomes(&self) -> &[ChangesetOutcome] {
        &self.outcomes
    }

    pub fn error(&self) -> Option<&MoveError> {
        self.error.as_ref()
    }

    pub fn is_success(&self) -> bool {
        self.state == RunState::Done
    }

    /// Scripts recorded as `SUCCESS` by this run, in execution order.
    pub fn applied(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|o| o.status == ChangesetStatus::Success)
            .map(|o| o.script.as_str())
            .collect()
    }

    /// Returns the terminal error of a failed run, the report otherwise.
    pub fn into_result(self) -> MoveResult<RunReport> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(self),
        }
    }
}

impl Display for RunReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Migration {}", self.state)?;
        if self.outcomes.is_empty() {
            write!(f, ", nothing to apply")?;
        }
        for outcome in &self.outcomes {
            write!(f, "\n  {}", outcome)?;
        }
        if let Some(error) = &self.error {
            write!(f, "\n  error: {}", error)?;
        }
        Ok(())
    }
}
