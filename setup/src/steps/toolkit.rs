//! Sourcing of the external toolkit's and the release stack's environments.

use std::path::PathBuf;

use tracing::info;

use crate::core::env_state::EnvironmentState;
use crate::core::types::{StepFailure, StepResult};
use crate::io::process::ToolInvoker;
use crate::io::shell::source_scripts;
use crate::steps::SetupStep;

pub const SOURCE_RELEASE_STACK: &str = "source-release-stack";
pub const SOURCE_TOOLKIT_ENVIRONMENT: &str = "source-toolkit-environment";

/// Variables cleared before sourcing so entries from a previously sourced,
/// possibly conflicting, stack cannot leak into the new environment.
pub const STALE_VARS: &[&str] = &[
    "PYTHONPATH",
    "PYTHONHOME",
    "C_INCLUDE_PATH",
    "CPLUS_INCLUDE_PATH",
];

fn without_stale_vars(env: &EnvironmentState) -> EnvironmentState {
    let mut base = env.clone();
    for var in STALE_VARS {
        base.unset(var);
    }
    base
}

fn replace_state(env: &mut EnvironmentState, next: EnvironmentState) -> StepResult {
    let changed = *env != next;
    *env = next;
    StepResult::from_changed(changed)
}

fn missing_file(path: &std::path::Path, reason: &str) -> StepResult {
    StepFailure::Filesystem {
        path: path.display().to_string(),
        reason: reason.to_string(),
    }
    .into()
}

/// Sources a release-stack view (compilers, CMake, Python, ...) on a clean
/// Python and include-path slate.
#[derive(Debug, Clone)]
pub struct SourceReleaseStack {
    pub script: PathBuf,
    pub workdir: PathBuf,
}

impl SetupStep for SourceReleaseStack {
    fn name(&self) -> &str {
        SOURCE_RELEASE_STACK
    }

    fn action(&self, env: &mut EnvironmentState, invoker: &dyn ToolInvoker) -> StepResult {
        if !self.script.is_file() {
            return missing_file(&self.script, "release stack setup script not found");
        }
        info!(script = %self.script.display(), "sourcing release stack");
        let base = without_stale_vars(env);
        match source_scripts(invoker, &base, &self.workdir, std::slice::from_ref(&self.script)) {
            Ok(sourced) => replace_state(env, sourced),
            Err(failure) => failure.into(),
        }
    }
}

/// Sources the installed toolkit's `this_acts.sh` and, when present, its
/// Python bindings `setup.sh`, then makes sure the bindings directory is on
/// PYTHONPATH exactly once.
#[derive(Debug, Clone)]
pub struct SourceToolkitEnvironment {
    pub env_script: PathBuf,
    pub python_script: PathBuf,
    pub python_dir: PathBuf,
    pub workdir: PathBuf,
}

impl SetupStep for SourceToolkitEnvironment {
    fn name(&self) -> &str {
        SOURCE_TOOLKIT_ENVIRONMENT
    }

    fn action(&self, env: &mut EnvironmentState, invoker: &dyn ToolInvoker) -> StepResult {
        if !self.env_script.is_file() {
            return missing_file(
                &self.env_script,
                "toolkit is not installed (run `siliconai-setup build`)",
            );
        }
        let mut scripts = vec![self.env_script.clone()];
        if self.python_script.is_file() {
            scripts.push(self.python_script.clone());
        }
        info!(scripts = scripts.len(), "sourcing toolkit environment");

        let base = without_stale_vars(env);
        let mut sourced = match source_scripts(invoker, &base, &self.workdir, &scripts) {
            Ok(sourced) => sourced,
            Err(failure) => return failure.into(),
        };
        sourced.prepend_path("PYTHONPATH", &self.python_dir.display().to_string());
        replace_state(env, sourced)
    }
}
