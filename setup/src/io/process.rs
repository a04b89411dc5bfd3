//! External tool invocation (package manager, CMake, shells).
//!
//! The [`ToolInvoker`] trait decouples setup steps from real process spawning.
//! Tests use scripted invokers that return predetermined statuses without
//! spawning anything.

use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};

use anyhow::{Context, Result};
use tracing::{debug, error, instrument};

use crate::core::env_state::EnvironmentState;

/// A fully described external invocation.
///
/// `env` is the complete child environment: nothing is inherited from the
/// parent process beyond it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    pub program: String,
    pub args: Vec<String>,
    pub workdir: PathBuf,
    pub env: EnvironmentState,
}

impl ToolCommand {
    pub fn new(program: impl Into<String>, workdir: &Path, env: &EnvironmentState) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            workdir: workdir.to_path_buf(),
            env: env.clone(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set a variable for this child only; the caller's state is untouched.
    pub fn env_var(mut self, name: &str, value: impl Into<String>) -> Self {
        self.env.set(name, value);
        self
    }

    /// Human-readable command line used in logs and failure messages.
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Exit status of an external process. `code` is `None` when it was killed
/// by a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolStatus {
    pub code: Option<i32>,
}

impl ToolStatus {
    pub fn from_code(code: i32) -> Self {
        Self { code: Some(code) }
    }

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

impl From<ExitStatus> for ToolStatus {
    fn from(status: ExitStatus) -> Self {
        Self {
            code: status.code(),
        }
    }
}

/// Captured child process output.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub status: ToolStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

/// Abstraction over external process execution.
///
/// Both methods are synchronous and report a non-zero exit through the
/// returned status. They return `Err` only when the process cannot be started.
pub trait ToolInvoker {
    /// Run the command with inherited stdio so its diagnostics reach the user.
    fn run(&self, command: &ToolCommand) -> Result<ToolStatus>;

    /// Run the command collecting stdout and stderr.
    fn capture(&self, command: &ToolCommand) -> Result<CommandOutput>;
}

/// Invoker that spawns real processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemInvoker {
    /// Send child stdout to our stderr. Needed when our own stdout carries a
    /// script for the calling shell.
    pub stdout_to_stderr: bool,
}

impl SystemInvoker {
    fn command(&self, command: &ToolCommand) -> Command {
        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args)
            .current_dir(&command.workdir)
            .env_clear()
            .envs(command.env.vars());
        cmd
    }
}

impl ToolInvoker for SystemInvoker {
    #[instrument(skip_all, fields(command = %command.display()))]
    fn run(&self, command: &ToolCommand) -> Result<ToolStatus> {
        let mut cmd = self.command(command);
        if self.stdout_to_stderr {
            cmd.stdout(Stdio::from(io::stderr()));
        }
        debug!(workdir = %command.workdir.display(), "spawning tool");
        let status = match cmd.status() {
            Ok(status) => status,
            Err(err) => {
                error!(err = %err, "failed to spawn tool");
                return Err(err).with_context(|| format!("spawn {}", command.program));
            }
        };
        debug!(exit_code = ?status.code(), "tool finished");
        Ok(status.into())
    }

    #[instrument(skip_all, fields(command = %command.display()))]
    fn capture(&self, command: &ToolCommand) -> Result<CommandOutput> {
        let output = self
            .command(command)
            .stdin(Stdio::null())
            .output()
            .with_context(|| format!("spawn {}", command.program))?;
        if !output.status.success() && !output.stderr.is_empty() {
            debug!(stderr = %String::from_utf8_lossy(&output.stderr), "tool stderr");
        }
        debug!(exit_code = ?output.status.code(), "tool finished");
        Ok(CommandOutput {
            status: output.status.into(),
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }
}

/// Snapshot of the current process environment. Non-UTF-8 entries are skipped.
pub fn process_environment() -> EnvironmentState {
    std::env::vars_os()
        .filter_map(|(name, value)| Some((name.into_string().ok()?, value.into_string().ok()?)))
        .collect()
}
