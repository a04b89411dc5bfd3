//! Shared deterministic types for setup steps and pipelines.

use std::fmt;

use serde::Serialize;

/// Why a step failed.
///
/// A missing precondition is never a failure: it is what triggers a step's
/// remedial action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StepFailure {
    /// An external process ran and exited unsuccessfully. `exit_code` is `None`
    /// when the process was terminated by a signal.
    ExternalProcess {
        command: String,
        exit_code: Option<i32>,
    },
    /// An external process could not be started at all.
    Spawn { command: String, reason: String },
    /// A directory or file the step needs could not be created or is missing.
    Filesystem { path: String, reason: String },
}

impl fmt::Display for StepFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepFailure::ExternalProcess {
                command,
                exit_code: Some(code),
            } => write!(f, "`{command}` exited with status {code}"),
            StepFailure::ExternalProcess {
                command,
                exit_code: None,
            } => write!(f, "`{command}` was terminated by a signal"),
            StepFailure::Spawn { command, reason } => {
                write!(f, "failed to start `{command}`: {reason}")
            }
            StepFailure::Filesystem { path, reason } => write!(f, "{path}: {reason}"),
        }
    }
}

/// Outcome of one setup step. There are no partial states.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "failure", rename_all = "snake_case")]
pub enum StepResult {
    Applied,
    AlreadySatisfied,
    Failed(StepFailure),
}

impl StepResult {
    pub fn is_failed(&self) -> bool {
        matches!(self, StepResult::Failed(_))
    }

    /// `Applied` if the step changed anything, `AlreadySatisfied` otherwise.
    pub fn from_changed(changed: bool) -> Self {
        if changed {
            StepResult::Applied
        } else {
            StepResult::AlreadySatisfied
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            StepResult::Applied => "applied",
            StepResult::AlreadySatisfied => "already satisfied",
            StepResult::Failed(_) => "failed",
        }
    }
}

impl From<StepFailure> for StepResult {
    fn from(failure: StepFailure) -> Self {
        StepResult::Failed(failure)
    }
}

/// One executed step as recorded by the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepRecord {
    pub name: String,
    pub result: StepResult,
    pub best_effort: bool,
    pub duration_ms: u64,
}
