//! Pipeline-level tests for full setup and build scenarios.
//!
//! These tests drive the assembled pipelines against a temporary project with
//! scripted tools to verify end-to-end behavior: step ordering, state threading,
//! idempotent re-runs and halting on failure.

use std::fs;
use std::path::PathBuf;

use anyhow::Result;
use siliconai_setup::core::env_state::EnvironmentState;
use siliconai_setup::core::types::{StepFailure, StepResult};
use siliconai_setup::io::layout::ProjectPaths;
use siliconai_setup::io::process::{CommandOutput, ToolCommand, ToolInvoker, ToolStatus};
use siliconai_setup::plan::{build_pipeline, setup_pipeline};
use siliconai_setup::test_support::{ScriptedInvoker, ScriptedResponse, TestProject};

/// Scripted tools plus a shell that "sources" the toolkit by echoing the
/// environment it was given with the toolkit's variables added.
struct ToolkitShell {
    tools: ScriptedInvoker,
    toolkit_bin: String,
}

impl ToolInvoker for ToolkitShell {
    fn run(&self, command: &ToolCommand) -> Result<ToolStatus> {
        self.tools.run(command)
    }

    fn capture(&self, command: &ToolCommand) -> Result<CommandOutput> {
        let mut sourced = command.env.clone();
        sourced.set("ACTS_VERSION", "40.0.0");
        sourced.prepend_path("PATH", &self.toolkit_bin);
        let mut stdout = Vec::new();
        for (name, value) in sourced.vars() {
            stdout.extend_from_slice(format!("{name}={value}").as_bytes());
            stdout.push(0);
        }
        Ok(CommandOutput {
            status: ToolStatus::from_code(0),
            stdout,
            stderr: Vec::new(),
        })
    }
}

fn create_dir(path: PathBuf) -> ScriptedResponse {
    ScriptedResponse::exit(0).with_effect(move |_| {
        fs::create_dir_all(&path).expect("create dir");
    })
}

fn installed_toolkit(project: &TestProject) -> ProjectPaths {
    let paths = project.paths();
    project
        .touch(&paths.toolkit_env_script)
        .expect("this_acts.sh");
    paths
}

/// Fresh project: every step does work on the first run. On the second run,
/// from the state the first run produced, only dependency sync runs again and
/// the state is unchanged.
///
/// Run 1: install uv → PATH → `uv venv` → `uv sync` → activate → source.
/// Run 2: `uv sync` only (always runs), everything else already satisfied.
#[test]
fn setup_twice_is_idempotent() {
    let project = TestProject::new().expect("project");
    let paths = installed_toolkit(&project);
    let pipeline = setup_pipeline(&project.config, &paths).expect("pipeline");
    let toolkit_bin = paths.toolkit_install.join("bin").display().to_string();

    let first = ToolkitShell {
        tools: ScriptedInvoker::new(vec![
            create_dir(paths.package_manager_bin.clone()),
            create_dir(paths.venv_bin.clone()),
            ScriptedResponse::exit(0),
        ]),
        toolkit_bin: toolkit_bin.clone(),
    };
    let mut initial = project.base_env();
    initial.set("PYTHONPATH", "/stale/python");

    let run1 = pipeline.run(initial, &first, |_| {});

    assert!(!run1.failed());
    assert!(
        run1.results()
            .iter()
            .all(|result| **result == StepResult::Applied)
    );
    let tool_calls = first.tools.call_lines();
    assert!(tool_calls[0].starts_with("sh -c curl"));
    assert_eq!(tool_calls[1], format!("uv venv {}", paths.venv_dir.display()));
    assert_eq!(tool_calls[2], "uv sync");

    let state = &run1.final_state;
    let venv = paths.venv_dir.display().to_string();
    let python_dir = paths.toolkit_python_dir.display().to_string();
    assert_eq!(state.get("VIRTUAL_ENV"), Some(venv.as_str()));
    assert_eq!(state.get("ACTS_VERSION"), Some("40.0.0"));
    assert_eq!(state.get("PYTHONPATH"), Some(python_dir.as_str()));
    let venv_bin = paths.venv_bin.display().to_string();
    let package_manager_bin = paths.package_manager_bin.display().to_string();
    assert_eq!(
        state.segments("PATH"),
        vec![
            toolkit_bin.as_str(),
            venv_bin.as_str(),
            package_manager_bin.as_str(),
            "/usr/bin",
            "/bin",
        ]
    );

    let second = ToolkitShell {
        tools: ScriptedInvoker::succeeding(1),
        toolkit_bin,
    };
    let run2 = pipeline.run(run1.final_state.clone(), &second, |_| {});

    assert!(!run2.failed());
    assert_eq!(
        run2.results(),
        vec![
            &StepResult::AlreadySatisfied,
            &StepResult::AlreadySatisfied,
            &StepResult::AlreadySatisfied,
            &StepResult::Applied,
            &StepResult::AlreadySatisfied,
            &StepResult::AlreadySatisfied,
        ]
    );
    assert_eq!(second.tools.call_lines(), vec!["uv sync".to_string()]);
    assert_eq!(run2.final_state, run1.final_state);
}

/// The installer runs but leaves nothing behind: the pipeline halts at the
/// first step and never touches PATH or the virtual environment.
#[test]
fn failed_package_manager_install_halts_setup() {
    let project = TestProject::new().expect("project");
    let paths = project.paths();
    let pipeline = setup_pipeline(&project.config, &paths).expect("pipeline");
    let invoker = ScriptedInvoker::new(vec![ScriptedResponse::exit(0)]);

    let outcome = pipeline.run(project.base_env(), &invoker, |_| {});

    assert!(outcome.failed());
    assert_eq!(outcome.records.len(), 1);
    assert!(matches!(
        outcome.records[0].result,
        StepResult::Failed(StepFailure::Filesystem { .. })
    ));
    assert_eq!(outcome.final_state, project.base_env());
    assert!(!paths.venv_dir.exists());
}

/// A failing compile leaves the state as it was before the build and the
/// toolkit environment is never sourced.
#[test]
fn build_failure_keeps_pre_build_state() {
    let project = TestProject::new().expect("project");
    let paths = project.paths();
    fs::create_dir_all(&paths.toolkit_source).expect("source tree");
    let pipeline = build_pipeline(&project.config, &paths).expect("pipeline");
    let invoker = ScriptedInvoker::new(vec![ScriptedResponse::exit(0), ScriptedResponse::exit(2)]);
    let before = EnvironmentState::from_pairs([
        ("PATH", "/p/.venv/bin:/usr/bin"),
        ("VIRTUAL_ENV", "/p/.venv"),
    ]);

    let outcome = pipeline.run(before.clone(), &invoker, |_| {});

    assert_eq!(outcome.halted_at.as_deref(), Some("build-toolkit"));
    assert_eq!(outcome.final_state, before);
    assert_eq!(outcome.records.len(), 1);
    assert!(matches!(
        &outcome.records[0].result,
        StepResult::Failed(StepFailure::ExternalProcess {
            exit_code: Some(2),
            ..
        })
    ));
    assert!(invoker.call_lines()[1].starts_with("cmake --build"));
}

/// Build then source: the installed toolkit's bindings end up on PYTHONPATH.
#[test]
fn build_installs_and_sources_toolkit() {
    let project = TestProject::new().expect("project");
    let paths = project.paths();
    fs::create_dir_all(&paths.toolkit_source).expect("source tree");
    let pipeline = build_pipeline(&project.config, &paths).expect("pipeline");
    let env_script = paths.toolkit_env_script.clone();
    let shell = ToolkitShell {
        tools: ScriptedInvoker::new(vec![
            ScriptedResponse::exit(0),
            ScriptedResponse::exit(0),
            ScriptedResponse::exit(0).with_effect(move |_| {
                fs::create_dir_all(env_script.parent().expect("bin dir")).expect("bin dir");
                fs::write(&env_script, "").expect("this_acts.sh");
            }),
        ]),
        toolkit_bin: paths.toolkit_install.join("bin").display().to_string(),
    };

    let outcome = pipeline.run(project.base_env(), &shell, |_| {});

    assert!(!outcome.failed());
    assert_eq!(
        outcome.results(),
        vec![&StepResult::Applied, &StepResult::Applied]
    );
    assert_eq!(
        outcome.final_state.segments("PYTHONPATH"),
        vec![paths.toolkit_python_dir.display().to_string().as_str()]
    );
}
