//! Idempotent setup steps.
//!
//! A step has a cheap, side-effect-free precondition and an action. When the
//! precondition already holds, [`SetupStep::apply`] returns
//! [`StepResult::AlreadySatisfied`] without touching anything. Side effects are
//! limited to directory creation, external processes (through
//! [`ToolInvoker`]) and [`EnvironmentState`] mutation.

pub mod build;
pub mod package_manager;
pub mod toolkit;
pub mod venv;

use tracing::{debug, warn};

use crate::core::env_state::EnvironmentState;
use crate::core::types::{StepFailure, StepResult};
use crate::io::process::{ToolCommand, ToolInvoker};

/// A named, idempotent unit of setup work.
pub trait SetupStep {
    fn name(&self) -> &str;

    /// True when the step has nothing to do. Defaults to false: the step
    /// always runs.
    fn precondition(&self, _env: &EnvironmentState) -> bool {
        false
    }

    /// Perform the step's work. Called only when the precondition does not hold.
    fn action(&self, env: &mut EnvironmentState, invoker: &dyn ToolInvoker) -> StepResult;

    /// A best-effort step's failure is recorded but does not halt a pipeline.
    fn best_effort(&self) -> bool {
        false
    }

    fn apply(&self, env: &mut EnvironmentState, invoker: &dyn ToolInvoker) -> StepResult {
        if self.precondition(env) {
            debug!(step = self.name(), "precondition holds, skipping");
            return StepResult::AlreadySatisfied;
        }
        self.action(env, invoker)
    }
}

impl<S: SetupStep + ?Sized> SetupStep for Box<S> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn precondition(&self, env: &EnvironmentState) -> bool {
        (**self).precondition(env)
    }

    fn action(&self, env: &mut EnvironmentState, invoker: &dyn ToolInvoker) -> StepResult {
        (**self).action(env, invoker)
    }

    fn best_effort(&self) -> bool {
        (**self).best_effort()
    }
}

/// Run `command`, mapping a spawn error or non-zero exit to a [`StepFailure`].
pub fn run_checked(invoker: &dyn ToolInvoker, command: &ToolCommand) -> Result<(), StepFailure> {
    let status = invoker.run(command).map_err(|err| {
        warn!(command = %command.display(), err = %format!("{err:#}"), "tool could not be started");
        StepFailure::Spawn {
            command: command.display(),
            reason: format!("{err:#}"),
        }
    })?;
    if status.success() {
        Ok(())
    } else {
        warn!(command = %command.display(), exit_code = ?status.code, "tool failed");
        Err(StepFailure::ExternalProcess {
            command: command.display(),
            exit_code: status.code,
        })
    }
}

/// Wrap a step so its failure does not halt the pipeline.
pub struct BestEffort<S>(pub S);

impl<S: SetupStep> SetupStep for BestEffort<S> {
    fn name(&self) -> &str {
        self.0.name()
    }

    fn precondition(&self, env: &EnvironmentState) -> bool {
        self.0.precondition(env)
    }

    fn action(&self, env: &mut EnvironmentState, invoker: &dyn ToolInvoker) -> StepResult {
        self.0.action(env, invoker)
    }

    fn best_effort(&self) -> bool {
        true
    }
}
