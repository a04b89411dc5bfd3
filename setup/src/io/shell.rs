//! Sourcing of externally generated environment scripts.
//!
//! Scripts such as `this_acts.sh` are fixed-contract files: they are sourced by
//! a real shell, never parsed. The shell starts from the current
//! [`EnvironmentState`], sources each script, and dumps its environment with
//! `env -0`; the dump becomes the new state. Variables the dumping shell
//! manages for itself (`PWD`, `SHLVL`, ...) keep their pre-sourcing values.

use std::path::{Path, PathBuf};

use tracing::{debug, instrument};

use crate::core::env_dump::{SHELL_INTERNAL_VARS, parse_env_dump};
use crate::core::env_state::EnvironmentState;
use crate::core::types::StepFailure;
use crate::io::process::{ToolCommand, ToolInvoker};

pub const SOURCE_SHELL: &str = "bash";

/// Positional parameters are cleared before sourcing so scripts do not see our
/// file list as their arguments. Script stdout is folded into stderr so that
/// stdout carries only the dump.
const SOURCE_PROGRAM: &str = r#"files=("$@"); set --; for f in "${files[@]}"; do . "$f" >&2 || exit $?; done; exec env -0"#;

/// Command that sources `scripts` in order on top of `env`.
pub fn source_command(env: &EnvironmentState, workdir: &Path, scripts: &[PathBuf]) -> ToolCommand {
    ToolCommand::new(SOURCE_SHELL, workdir, env)
        .arg("-c")
        .arg(SOURCE_PROGRAM)
        .arg("siliconai-setup")
        .args(scripts.iter().map(|script| script.display().to_string()))
}

/// Source `scripts` in order and return the resulting environment.
#[instrument(skip_all, fields(scripts = scripts.len()))]
pub fn source_scripts(
    invoker: &dyn ToolInvoker,
    env: &EnvironmentState,
    workdir: &Path,
    scripts: &[PathBuf],
) -> Result<EnvironmentState, StepFailure> {
    let label = format!(
        "source {}",
        scripts
            .iter()
            .map(|script| script.display().to_string())
            .collect::<Vec<_>>()
            .join(" ")
    );
    let command = source_command(env, workdir, scripts);
    let output = invoker
        .capture(&command)
        .map_err(|err| StepFailure::Spawn {
            command: label.clone(),
            reason: format!("{err:#}"),
        })?;
    if !output.stderr.is_empty() {
        debug!(stderr = %String::from_utf8_lossy(&output.stderr), "sourced script output");
    }
    if !output.status.success() {
        return Err(StepFailure::ExternalProcess {
            command: label,
            exit_code: output.status.code,
        });
    }
    let mut sourced = parse_env_dump(&output.stdout);
    for name in SHELL_INTERNAL_VARS {
        if let Some(value) = env.get(name) {
            sourced.set(*name, value);
        }
    }
    debug!(vars = sourced.len(), "captured sourced environment");
    Ok(sourced)
}
