//! Assembly of the concrete setup and build pipelines from configuration.

use anyhow::{Result, bail};

use crate::io::config::SetupConfig;
use crate::io::layout::ProjectPaths;
use crate::pipeline::Pipeline;
use crate::steps::build::{BUILD_TOOLKIT, BuildToolkit};
use crate::steps::package_manager::{
    ADD_PACKAGE_MANAGER_TO_PATH, AddPackageManagerToPath, RESOLVE_PACKAGE_MANAGER,
    ResolvePackageManager,
};
use crate::steps::toolkit::{
    SOURCE_RELEASE_STACK, SOURCE_TOOLKIT_ENVIRONMENT, SourceReleaseStack, SourceToolkitEnvironment,
};
use crate::steps::venv::{
    ACTIVATE_VIRTUAL_ENVIRONMENT, ActivateVirtualEnvironment, CREATE_VIRTUAL_ENVIRONMENT,
    CreateVirtualEnvironment, SYNC_DEPENDENCIES, SyncDependencies,
};
use crate::steps::{BestEffort, SetupStep};

/// Every step name either pipeline can contain.
pub const STEP_NAMES: &[&str] = &[
    RESOLVE_PACKAGE_MANAGER,
    ADD_PACKAGE_MANAGER_TO_PATH,
    CREATE_VIRTUAL_ENVIRONMENT,
    SYNC_DEPENDENCIES,
    ACTIVATE_VIRTUAL_ENVIRONMENT,
    SOURCE_RELEASE_STACK,
    BUILD_TOOLKIT,
    SOURCE_TOOLKIT_ENVIRONMENT,
];

/// Project setup: package manager, virtual environment, then the installed
/// toolkit's environment.
pub fn setup_pipeline(cfg: &SetupConfig, paths: &ProjectPaths) -> Result<Pipeline> {
    check_best_effort_names(cfg)?;
    let pm = &cfg.package_manager;
    let mut steps: Vec<Box<dyn SetupStep>> = Vec::new();

    push(
        &mut steps,
        cfg,
        ResolvePackageManager {
            kind: pm.kind,
            home: paths.package_manager_home.clone(),
            bin: paths.package_manager_bin.clone(),
            installer_url: pm.installer_url().to_string(),
            workdir: paths.root.clone(),
        },
    );
    push(
        &mut steps,
        cfg,
        AddPackageManagerToPath {
            kind: pm.kind,
            home: paths.package_manager_home.clone(),
            bin: paths.package_manager_bin.clone(),
        },
    );
    push(
        &mut steps,
        cfg,
        CreateVirtualEnvironment {
            kind: pm.kind,
            venv_dir: paths.venv_dir.clone(),
            python: cfg.venv.python.clone(),
            workdir: paths.root.clone(),
        },
    );
    push(
        &mut steps,
        cfg,
        SyncDependencies {
            kind: pm.kind,
            venv_dir: paths.venv_dir.clone(),
            workdir: paths.root.clone(),
        },
    );
    push(
        &mut steps,
        cfg,
        ActivateVirtualEnvironment {
            venv_dir: paths.venv_dir.clone(),
            venv_bin: paths.venv_bin.clone(),
        },
    );
    push(&mut steps, cfg, source_toolkit(paths));

    Ok(Pipeline::from_steps(steps))
}

/// Toolkit build: optional release stack, build and install, then source the
/// freshly installed environment.
pub fn build_pipeline(cfg: &SetupConfig, paths: &ProjectPaths) -> Result<Pipeline> {
    check_best_effort_names(cfg)?;
    let mut steps: Vec<Box<dyn SetupStep>> = Vec::new();

    if let Some(script) = &paths.release_stack_script {
        push(
            &mut steps,
            cfg,
            SourceReleaseStack {
                script: script.clone(),
                workdir: paths.root.clone(),
            },
        );
    }
    push(
        &mut steps,
        cfg,
        BuildToolkit {
            source_dir: paths.toolkit_source.clone(),
            build_dir: paths.toolkit_build.clone(),
            install_dir: paths.toolkit_install.clone(),
            generator: cfg.build.generator.clone(),
            configure_args: cfg.build.configure_args.clone(),
            jobs: cfg.build.jobs,
            skip_if_installed: cfg.build.skip_if_installed,
            env_script: paths.toolkit_env_script.clone(),
            workdir: paths.root.clone(),
        },
    );
    push(&mut steps, cfg, source_toolkit(paths));

    Ok(Pipeline::from_steps(steps))
}

fn source_toolkit(paths: &ProjectPaths) -> SourceToolkitEnvironment {
    SourceToolkitEnvironment {
        env_script: paths.toolkit_env_script.clone(),
        python_script: paths.toolkit_python_script.clone(),
        python_dir: paths.toolkit_python_dir.clone(),
        workdir: paths.root.clone(),
    }
}

fn push(steps: &mut Vec<Box<dyn SetupStep>>, cfg: &SetupConfig, step: impl SetupStep + 'static) {
    let best_effort = cfg
        .pipeline
        .best_effort
        .iter()
        .any(|name| name == step.name());
    if best_effort {
        steps.push(Box::new(BestEffort(step)));
    } else {
        steps.push(Box::new(step));
    }
}

fn check_best_effort_names(cfg: &SetupConfig) -> Result<()> {
    for name in &cfg.pipeline.best_effort {
        if !STEP_NAMES.contains(&name.as_str()) {
            bail!(
                "pipeline.best_effort: unknown step `{name}` (expected one of: {})",
                STEP_NAMES.join(", ")
            );
        }
    }
    Ok(())
}
