//! Configure, build and install the external toolkit with CMake.

use std::fs;
use std::path::PathBuf;

use tracing::info;

use crate::core::env_state::EnvironmentState;
use crate::core::types::{StepFailure, StepResult};
use crate::io::process::{ToolCommand, ToolInvoker};
use crate::steps::{SetupStep, run_checked};

pub const BUILD_TOOLKIT: &str = "build-toolkit";

#[derive(Debug, Clone)]
pub struct BuildToolkit {
    pub source_dir: PathBuf,
    pub build_dir: PathBuf,
    pub install_dir: PathBuf,
    pub generator: String,
    pub configure_args: Vec<String>,
    pub jobs: Option<u32>,
    /// When set, an installed `this_acts.sh` means there is nothing to build.
    pub skip_if_installed: bool,
    pub env_script: PathBuf,
    pub workdir: PathBuf,
}

impl BuildToolkit {
    /// Configure, build and install commands, in execution order.
    pub fn commands(&self, env: &EnvironmentState) -> Vec<ToolCommand> {
        let configure = ToolCommand::new("cmake", &self.workdir, env)
            .arg("-S")
            .arg(self.source_dir.display().to_string())
            .arg("-B")
            .arg(self.build_dir.display().to_string())
            .arg("-G")
            .arg(self.generator.clone())
            .arg(format!(
                "-DCMAKE_INSTALL_PREFIX={}",
                self.install_dir.display()
            ))
            .args(self.configure_args.iter().cloned());

        let mut build = ToolCommand::new("cmake", &self.workdir, env)
            .arg("--build")
            .arg(self.build_dir.display().to_string());
        if let Some(jobs) = self.jobs {
            build = build.arg("-j").arg(jobs.to_string());
        }

        let install = ToolCommand::new("cmake", &self.workdir, env)
            .arg("--install")
            .arg(self.build_dir.display().to_string());

        vec![configure, build, install]
    }
}

impl SetupStep for BuildToolkit {
    fn name(&self) -> &str {
        BUILD_TOOLKIT
    }

    fn precondition(&self, _env: &EnvironmentState) -> bool {
        self.skip_if_installed && self.env_script.is_file()
    }

    fn action(&self, env: &mut EnvironmentState, invoker: &dyn ToolInvoker) -> StepResult {
        if !self.source_dir.is_dir() {
            return StepFailure::Filesystem {
                path: self.source_dir.display().to_string(),
                reason: "toolkit source tree not found".to_string(),
            }
            .into();
        }
        for dir in [&self.build_dir, &self.install_dir] {
            if let Err(err) = fs::create_dir_all(dir) {
                return StepFailure::Filesystem {
                    path: dir.display().to_string(),
                    reason: err.to_string(),
                }
                .into();
            }
        }
        for command in self.commands(env) {
            info!(command = %command.display(), "running build command");
            if let Err(failure) = run_checked(invoker, &command) {
                return failure.into();
            }
        }
        StepResult::Applied
    }
}
