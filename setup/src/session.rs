//! Orchestration for one pipeline run against a project.
//!
//! A session assembles the pipeline from configuration, runs it from a given
//! starting environment, writes the run log, and keeps both the starting and
//! the final state so the caller can render an export script or hand the final
//! state to a child process.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{debug, info};

use crate::core::env_state::EnvironmentState;
use crate::core::export::render_export_script;
use crate::core::types::StepRecord;
use crate::exit_codes;
use crate::io::config::SetupConfig;
use crate::io::layout::ProjectPaths;
use crate::io::process::ToolInvoker;
use crate::io::run_log::{RunMeta, write_run_log};
use crate::pipeline::{Pipeline, PipelineOutcome};
use crate::plan::{build_pipeline, setup_pipeline};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineKind {
    Setup,
    Build,
}

impl PipelineKind {
    pub fn name(self) -> &'static str {
        match self {
            PipelineKind::Setup => "setup",
            PipelineKind::Build => "build",
        }
    }

    pub fn assemble(self, cfg: &SetupConfig, paths: &ProjectPaths) -> Result<Pipeline> {
        match self {
            PipelineKind::Setup => setup_pipeline(cfg, paths),
            PipelineKind::Build => build_pipeline(cfg, paths),
        }
    }
}

/// Outcome of [`run_session`].
#[derive(Debug, Clone)]
pub struct SessionOutcome {
    pub initial: EnvironmentState,
    pub outcome: PipelineOutcome,
    pub run_log: PathBuf,
}

impl SessionOutcome {
    /// Shell script turning the starting environment into the final one.
    pub fn export_script(&self) -> String {
        render_export_script(&self.initial, &self.outcome.final_state)
    }

    pub fn exit_code(&self) -> i32 {
        if self.outcome.failed() {
            exit_codes::STEP_FAILED
        } else {
            exit_codes::OK
        }
    }
}

/// Run the `kind` pipeline for the project at `paths`.
///
/// A halted pipeline is reported through [`SessionOutcome`], not as an error.
/// Errors are limited to invalid configuration and run-log I/O.
pub fn run_session<F: FnMut(&StepRecord)>(
    kind: PipelineKind,
    cfg: &SetupConfig,
    paths: &ProjectPaths,
    initial: EnvironmentState,
    invoker: &dyn ToolInvoker,
    on_step: F,
) -> Result<SessionOutcome> {
    let pipeline = kind.assemble(cfg, paths)?;
    debug!(pipeline = kind.name(), steps = ?pipeline.step_names(), "assembled pipeline");

    let started_at = Utc::now();
    let outcome = pipeline.run(initial.clone(), invoker, on_step);
    let ended_at = Utc::now();

    let meta = RunMeta::new(
        kind.name(),
        started_at,
        ended_at,
        outcome.halted_at.clone(),
        outcome.records.clone(),
    );
    let run_log = write_run_log(&paths.runs_dir, started_at, &meta)
        .with_context(|| format!("record {} run", kind.name()))?;
    info!(
        pipeline = kind.name(),
        failed = outcome.failed(),
        log = %run_log.display(),
        "run recorded"
    );

    Ok(SessionOutcome {
        initial,
        outcome,
        run_log,
    })
}
