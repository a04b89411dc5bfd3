//! Ordered, fail-fast execution of setup steps.

use std::time::Instant;

use tracing::{error, info, instrument, warn};

use crate::core::env_state::EnvironmentState;
use crate::core::types::{StepRecord, StepResult};
use crate::io::process::ToolInvoker;
use crate::steps::SetupStep;

/// An explicit, inspectable sequence of steps in dependency order.
#[derive(Default)]
pub struct Pipeline {
    steps: Vec<Box<dyn SetupStep>>,
}

/// Static view of one step, without running it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepPlan {
    pub name: String,
    /// Precondition evaluated against the state given to [`Pipeline::describe`].
    pub satisfied: bool,
    pub best_effort: bool,
}

/// Result of [`Pipeline::run`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineOutcome {
    /// State reached at completion, or just before the halting step.
    pub final_state: EnvironmentState,
    /// One record per executed step, in execution order.
    pub records: Vec<StepRecord>,
    /// Name of the step whose failure halted the pipeline.
    pub halted_at: Option<String>,
}

impl PipelineOutcome {
    pub fn failed(&self) -> bool {
        self.halted_at.is_some()
    }

    pub fn results(&self) -> Vec<&StepResult> {
        self.records.iter().map(|record| &record.result).collect()
    }
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_steps(steps: Vec<Box<dyn SetupStep>>) -> Self {
        Self { steps }
    }

    pub fn with_step(mut self, step: impl SetupStep + 'static) -> Self {
        self.steps.push(Box::new(step));
        self
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|step| step.name()).collect()
    }

    pub fn describe(&self, env: &EnvironmentState) -> Vec<StepPlan> {
        self.steps
            .iter()
            .map(|step| StepPlan {
                name: step.name().to_string(),
                satisfied: step.precondition(env),
                best_effort: step.best_effort(),
            })
            .collect()
    }

    /// Run every step in order, threading the state forward.
    ///
    /// Each step works on a copy of the state that is committed only when the
    /// step succeeds, so a failed step never leaves partial changes behind. The
    /// first failure of a step that is not best-effort halts the run; no later
    /// step executes. `on_step` is called after every executed step.
    #[instrument(skip_all, fields(steps = self.steps.len()))]
    pub fn run<F: FnMut(&StepRecord)>(
        &self,
        initial: EnvironmentState,
        invoker: &dyn ToolInvoker,
        mut on_step: F,
    ) -> PipelineOutcome {
        let mut state = initial;
        let mut records = Vec::with_capacity(self.steps.len());

        for step in &self.steps {
            let started = Instant::now();
            let mut working = state.clone();
            let result = step.apply(&mut working, invoker);
            let record = StepRecord {
                name: step.name().to_string(),
                result,
                best_effort: step.best_effort(),
                duration_ms: started.elapsed().as_millis() as u64,
            };
            on_step(&record);

            match &record.result {
                StepResult::Failed(failure) if record.best_effort => {
                    warn!(step = %record.name, %failure, "best-effort step failed, continuing");
                    records.push(record);
                }
                StepResult::Failed(failure) => {
                    error!(step = %record.name, %failure, "step failed, halting");
                    let halted_at = Some(record.name.clone());
                    records.push(record);
                    return PipelineOutcome {
                        final_state: state,
                        records,
                        halted_at,
                    };
                }
                result => {
                    info!(
                        step = %record.name,
                        result = result.label(),
                        duration_ms = record.duration_ms,
                        "step finished"
                    );
                    state = working;
                    records.push(record);
                }
            }
        }

        PipelineOutcome {
            final_state: state,
            records,
            halted_at: None,
        }
    }
}
