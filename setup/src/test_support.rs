//! Test-only helpers: scripted invokers, fixed-outcome steps, temp projects.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use anyhow::{Result, anyhow};
use tempfile::TempDir;

use crate::core::env_state::EnvironmentState;
use crate::core::types::StepResult;
use crate::io::config::SetupConfig;
use crate::io::layout::ProjectPaths;
use crate::io::process::{CommandOutput, ToolCommand, ToolInvoker, ToolStatus};
use crate::steps::SetupStep;

type Effect = Box<dyn Fn(&ToolCommand)>;

/// One queued invoker response.
pub struct ScriptedResponse {
    pub code: i32,
    pub stdout: Vec<u8>,
    pub spawn_error: bool,
    effect: Option<Effect>,
}

impl ScriptedResponse {
    /// Process that exits with `code`.
    pub fn exit(code: i32) -> Self {
        Self {
            code,
            stdout: Vec::new(),
            spawn_error: false,
            effect: None,
        }
    }

    /// Process that exits with `code` after printing `stdout`.
    pub fn captured(code: i32, stdout: &[u8]) -> Self {
        Self {
            stdout: stdout.to_vec(),
            ..Self::exit(code)
        }
    }

    /// Process that cannot be started.
    pub fn spawn_error() -> Self {
        Self {
            spawn_error: true,
            ..Self::exit(127)
        }
    }

    /// Run `effect` when the command is invoked (e.g. create a directory the
    /// real tool would have created).
    pub fn with_effect(mut self, effect: impl Fn(&ToolCommand) + 'static) -> Self {
        self.effect = Some(Box::new(effect));
        self
    }
}

/// Invoker that replays queued responses in order and records every call.
///
/// Errors when invoked more often than responses were queued.
pub struct ScriptedInvoker {
    responses: RefCell<VecDeque<ScriptedResponse>>,
    calls: RefCell<Vec<ToolCommand>>,
}

impl ScriptedInvoker {
    pub fn new(responses: Vec<ScriptedResponse>) -> Self {
        Self {
            responses: RefCell::new(responses.into()),
            calls: RefCell::new(Vec::new()),
        }
    }

    /// Queue `count` successful exits.
    pub fn succeeding(count: usize) -> Self {
        Self::new((0..count).map(|_| ScriptedResponse::exit(0)).collect())
    }

    pub fn calls(&self) -> Vec<ToolCommand> {
        self.calls.borrow().clone()
    }

    pub fn call_lines(&self) -> Vec<String> {
        self.calls.borrow().iter().map(ToolCommand::display).collect()
    }

    pub fn remaining(&self) -> usize {
        self.responses.borrow().len()
    }

    fn next(&self, command: &ToolCommand) -> Result<CommandOutput> {
        self.calls.borrow_mut().push(command.clone());
        let response = self
            .responses
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| anyhow!("no scripted response for `{}`", command.display()))?;
        if response.spawn_error {
            return Err(anyhow!("spawn {}: not found", command.program));
        }
        if let Some(effect) = &response.effect {
            effect(command);
        }
        Ok(CommandOutput {
            status: ToolStatus::from_code(response.code),
            stdout: response.stdout,
            stderr: Vec::new(),
        })
    }
}

impl ToolInvoker for ScriptedInvoker {
    fn run(&self, command: &ToolCommand) -> Result<ToolStatus> {
        self.next(command).map(|output| output.status)
    }

    fn capture(&self, command: &ToolCommand) -> Result<CommandOutput> {
        self.next(command)
    }
}

/// Step with a fixed result that optionally sets one variable when applied.
pub struct FixedStep {
    pub name: String,
    pub result: StepResult,
    pub sets: Option<(String, String)>,
    pub best_effort: bool,
    pub satisfied: bool,
    runs: Cell<u32>,
}

impl FixedStep {
    pub fn new(name: &str, result: StepResult) -> Self {
        Self {
            name: name.to_string(),
            result,
            sets: None,
            best_effort: false,
            satisfied: false,
            runs: Cell::new(0),
        }
    }

    pub fn setting(mut self, var: &str, value: &str) -> Self {
        self.sets = Some((var.to_string(), value.to_string()));
        self
    }

    pub fn best_effort(mut self) -> Self {
        self.best_effort = true;
        self
    }

    pub fn satisfied(mut self) -> Self {
        self.satisfied = true;
        self
    }

    /// How many times the action ran.
    pub fn runs(&self) -> u32 {
        self.runs.get()
    }
}

impl SetupStep for FixedStep {
    fn name(&self) -> &str {
        &self.name
    }

    fn precondition(&self, _env: &EnvironmentState) -> bool {
        self.satisfied
    }

    fn action(&self, env: &mut EnvironmentState, _invoker: &dyn ToolInvoker) -> StepResult {
        self.runs.set(self.runs.get() + 1);
        if let Some((var, value)) = &self.sets {
            env.set(var.clone(), value.clone());
        }
        self.result.clone()
    }

    fn best_effort(&self) -> bool {
        self.best_effort
    }
}

/// Temporary project root with a default configuration.
pub struct TestProject {
    temp: TempDir,
    pub config: SetupConfig,
}

impl TestProject {
    pub fn new() -> Result<Self> {
        Ok(Self {
            temp: tempfile::tempdir()?,
            config: SetupConfig::default(),
        })
    }

    pub fn root(&self) -> &Path {
        self.temp.path()
    }

    pub fn paths(&self) -> ProjectPaths {
        ProjectPaths::new(self.root(), &self.config)
    }

    /// Create a file (and its parents) under the project root.
    pub fn touch(&self, relative: impl AsRef<Path>) -> Result<PathBuf> {
        let path = self.root().join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, "")?;
        Ok(path)
    }

    /// Base environment for step tests: a plain PATH and nothing else.
    pub fn base_env(&self) -> EnvironmentState {
        EnvironmentState::from_pairs([("PATH", "/usr/bin:/bin")])
    }
}
