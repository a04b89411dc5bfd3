//! Virtual environment: create, populate, activate.

use std::fs;
use std::path::PathBuf;

use tracing::info;

use crate::core::env_state::EnvironmentState;
use crate::core::types::{StepFailure, StepResult};
use crate::io::config::PackageManagerKind;
use crate::io::process::{ToolCommand, ToolInvoker};
use crate::steps::{SetupStep, run_checked};

pub const CREATE_VIRTUAL_ENVIRONMENT: &str = "create-virtual-environment";
pub const SYNC_DEPENDENCIES: &str = "sync-dependencies";
pub const ACTIVATE_VIRTUAL_ENVIRONMENT: &str = "activate-virtual-environment";

/// Creates the project's virtual environment directory when it is missing.
#[derive(Debug, Clone)]
pub struct CreateVirtualEnvironment {
    pub kind: PackageManagerKind,
    pub venv_dir: PathBuf,
    pub python: String,
    pub workdir: PathBuf,
}

impl CreateVirtualEnvironment {
    fn command(&self, env: &EnvironmentState) -> ToolCommand {
        let venv = self.venv_dir.display().to_string();
        match self.kind {
            PackageManagerKind::Uv => ToolCommand::new("uv", &self.workdir, env)
                .arg("venv")
                .arg(venv),
            PackageManagerKind::Pdm => ToolCommand::new(self.python.clone(), &self.workdir, env)
                .args(["-m", "venv"])
                .arg(venv),
        }
    }
}

impl SetupStep for CreateVirtualEnvironment {
    fn name(&self) -> &str {
        CREATE_VIRTUAL_ENVIRONMENT
    }

    fn precondition(&self, _env: &EnvironmentState) -> bool {
        self.venv_dir.is_dir()
    }

    fn action(&self, env: &mut EnvironmentState, invoker: &dyn ToolInvoker) -> StepResult {
        if let Some(parent) = self.venv_dir.parent()
            && let Err(err) = fs::create_dir_all(parent)
        {
            return StepFailure::Filesystem {
                path: parent.display().to_string(),
                reason: err.to_string(),
            }
            .into();
        }
        info!(venv = %self.venv_dir.display(), "creating virtual environment");
        if let Err(failure) = run_checked(invoker, &self.command(env)) {
            return failure.into();
        }
        if !self.venv_dir.is_dir() {
            return StepFailure::Filesystem {
                path: self.venv_dir.display().to_string(),
                reason: "virtual environment was not created".to_string(),
            }
            .into();
        }
        StepResult::Applied
    }
}

/// Installs the locked dependencies into the virtual environment. Always runs:
/// the package manager itself decides whether anything changed.
#[derive(Debug, Clone)]
pub struct SyncDependencies {
    pub kind: PackageManagerKind,
    pub venv_dir: PathBuf,
    pub workdir: PathBuf,
}

impl SetupStep for SyncDependencies {
    fn name(&self) -> &str {
        SYNC_DEPENDENCIES
    }

    fn action(&self, env: &mut EnvironmentState, invoker: &dyn ToolInvoker) -> StepResult {
        let mut command = ToolCommand::new(self.kind.program(), &self.workdir, env).arg("sync");
        if self.kind == PackageManagerKind::Uv {
            command = command.env_var(
                "UV_PROJECT_ENVIRONMENT",
                self.venv_dir.display().to_string(),
            );
        }
        info!(command = %command.display(), "syncing dependencies");
        match run_checked(invoker, &command) {
            Ok(()) => StepResult::Applied,
            Err(failure) => failure.into(),
        }
    }
}

/// Does what the virtual environment's `bin/activate` does, on the explicit
/// state: deactivates a different active venv, sets `VIRTUAL_ENV`, prepends
/// the venv's `bin/` to PATH and unsets `PYTHONHOME`.
#[derive(Debug, Clone)]
pub struct ActivateVirtualEnvironment {
    pub venv_dir: PathBuf,
    pub venv_bin: PathBuf,
}

impl SetupStep for ActivateVirtualEnvironment {
    fn name(&self) -> &str {
        ACTIVATE_VIRTUAL_ENVIRONMENT
    }

    fn action(&self, env: &mut EnvironmentState, _invoker: &dyn ToolInvoker) -> StepResult {
        if !self.venv_dir.is_dir() {
            return StepFailure::Filesystem {
                path: self.venv_dir.display().to_string(),
                reason: "virtual environment does not exist".to_string(),
            }
            .into();
        }
        let venv = self.venv_dir.display().to_string();
        let mut changed = false;
        if let Some(previous) = env.get("VIRTUAL_ENV").map(str::to_string)
            && previous != venv
        {
            let previous_bin = PathBuf::from(&previous).join("bin");
            changed |= env.remove_segment("PATH", &previous_bin.display().to_string());
        }
        changed |= env.set("VIRTUAL_ENV", venv);
        changed |= env.prepend_path("PATH", &self.venv_bin.display().to_string());
        changed |= env.unset("PYTHONHOME");
        StepResult::from_changed(changed)
    }
}
