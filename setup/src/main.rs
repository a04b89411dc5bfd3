//! Idempotent environment setup for the validator project.
//!
//! Resolves the package manager, prepares the virtual environment, builds the
//! toolkit and sources its environment. Every command can be re-run safely.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};

use siliconai_setup::core::types::{StepRecord, StepResult};
use siliconai_setup::exit_codes;
use siliconai_setup::io::config::{SetupConfig, load_config, load_existing_config};
use siliconai_setup::io::init::{InitOptions, init_project};
use siliconai_setup::io::layout::{CONFIG_FILE, ProjectPaths};
use siliconai_setup::io::process::{
    SystemInvoker, ToolCommand, ToolInvoker, process_environment,
};
use siliconai_setup::logging;
use siliconai_setup::session::{PipelineKind, SessionOutcome, run_session};

#[derive(Parser)]
#[command(
    name = "siliconai-setup",
    version,
    about = "Idempotent project environment setup"
)]
struct Cli {
    /// Configuration file, relative to the project root unless absolute.
    #[arg(
        short = 'g',
        long = "global-config",
        env = "SILICONAI_SETUP_CONFIG",
        default_value = CONFIG_FILE,
        global = true
    )]
    config: PathBuf,

    /// Enable debug-level logging.
    #[arg(long, global = true)]
    debug: bool,

    /// Project root (defaults to the current directory).
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write the default config and create the project directories.
    Init {
        /// Overwrite an existing config file.
        #[arg(short, long)]
        force: bool,
    },
    /// Print the effective configuration.
    Config,
    /// Print the ordered step list and which steps are already satisfied.
    Plan {
        /// Show the build pipeline instead of the setup pipeline.
        #[arg(long)]
        build: bool,
    },
    /// Run the setup pipeline.
    Setup {
        /// Write a shell script reproducing the resulting environment.
        #[arg(long)]
        export: Option<PathBuf>,
    },
    /// Run the setup pipeline and print the export script on stdout.
    Env,
    /// Build and install the toolkit, then source its environment.
    Build {
        /// Write a shell script reproducing the resulting environment.
        #[arg(long)]
        export: Option<PathBuf>,
    },
    /// Run the setup pipeline, then run a command in the resulting environment.
    Exec {
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },
}

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{:#}", err);
            std::process::exit(exit_codes::INVALID);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    let root = match &cli.root {
        Some(root) => root.clone(),
        None => std::env::current_dir().context("resolve current directory")?,
    };
    let config_path = if cli.config.is_absolute() {
        cli.config.clone()
    } else {
        root.join(&cli.config)
    };

    match cli.command {
        Command::Init { force } => {
            logging::init(cli.debug, None)?;
            cmd_init(&root, &config_path, force)
        }
        Command::Config => {
            let cfg = load_config(&config_path)?;
            logging::init(cli.debug || cfg.output.debug, None)?;
            print!("{}", cfg.to_toml()?);
            Ok(exit_codes::OK)
        }
        Command::Plan { build } => {
            let cfg = load_config(&config_path)?;
            logging::init(cli.debug || cfg.output.debug, None)?;
            let kind = if build {
                PipelineKind::Build
            } else {
                PipelineKind::Setup
            };
            cmd_plan(&root, &cfg, kind)
        }
        Command::Setup { export } => {
            let (cfg, paths) = prepare(&root, &config_path, cli.debug)?;
            cmd_pipeline(PipelineKind::Setup, &cfg, &paths, export.as_deref())
        }
        Command::Build { export } => {
            let (cfg, paths) = prepare(&root, &config_path, cli.debug)?;
            cmd_pipeline(PipelineKind::Build, &cfg, &paths, export.as_deref())
        }
        Command::Env => {
            let (cfg, paths) = prepare(&root, &config_path, cli.debug)?;
            cmd_env(&cfg, &paths)
        }
        Command::Exec { command } => {
            let (cfg, paths) = prepare(&root, &config_path, cli.debug)?;
            cmd_exec(&cfg, &paths, &command)
        }
    }
}

/// Load the required config and start logging into the output directory.
fn prepare(root: &Path, config_path: &Path, debug: bool) -> Result<(SetupConfig, ProjectPaths)> {
    let cfg = load_existing_config(config_path)?;
    let paths = ProjectPaths::new(root, &cfg);
    logging::init(debug || cfg.output.debug, Some(&paths.log_path))?;
    Ok((cfg, paths))
}

fn cmd_init(root: &Path, config_path: &Path, force: bool) -> Result<i32> {
    let paths = init_project(root, config_path, &InitOptions { force })?;
    println!("wrote {}", config_path.display());
    println!("created {}", paths.dependencies_dir.display());
    println!("created {}", paths.output_dir.display());
    Ok(exit_codes::OK)
}

fn cmd_plan(root: &Path, cfg: &SetupConfig, kind: PipelineKind) -> Result<i32> {
    let paths = ProjectPaths::new(root, cfg);
    let pipeline = kind.assemble(cfg, &paths)?;
    let env = process_environment();
    for (index, step) in pipeline.describe(&env).iter().enumerate() {
        let status = if step.satisfied { "satisfied" } else { "pending" };
        let best_effort = if step.best_effort { " (best effort)" } else { "" };
        println!("{}. {} [{status}]{best_effort}", index + 1, step.name);
    }
    Ok(exit_codes::OK)
}

fn cmd_pipeline(
    kind: PipelineKind,
    cfg: &SetupConfig,
    paths: &ProjectPaths,
    export: Option<&Path>,
) -> Result<i32> {
    let session = run_session(
        kind,
        cfg,
        paths,
        process_environment(),
        &SystemInvoker::default(),
        |record| println!("{}", format_record(record)),
    )?;
    report(&session);
    if let Some(path) = export {
        write_export(path, &session)?;
        println!("export script written to {}", path.display());
    }
    Ok(session.exit_code())
}

/// Stdout carries only the export script; everything else goes to stderr.
fn cmd_env(cfg: &SetupConfig, paths: &ProjectPaths) -> Result<i32> {
    let session = run_session(
        PipelineKind::Setup,
        cfg,
        paths,
        process_environment(),
        &SystemInvoker {
            stdout_to_stderr: true,
        },
        |record| eprintln!("{}", format_record(record)),
    )?;
    if session.outcome.failed() {
        report(&session);
        return Ok(session.exit_code());
    }
    print!("{}", session.export_script());
    Ok(exit_codes::OK)
}

fn cmd_exec(cfg: &SetupConfig, paths: &ProjectPaths, command: &[String]) -> Result<i32> {
    let Some((program, args)) = command.split_first() else {
        bail!("exec: missing command");
    };
    let session = run_session(
        PipelineKind::Setup,
        cfg,
        paths,
        process_environment(),
        &SystemInvoker {
            stdout_to_stderr: true,
        },
        |record| eprintln!("{}", format_record(record)),
    )?;
    if session.outcome.failed() {
        report(&session);
        return Ok(session.exit_code());
    }

    let workdir = std::env::current_dir().context("resolve current directory")?;
    let child = ToolCommand::new(program.clone(), &workdir, &session.outcome.final_state)
        .args(args.iter().cloned());
    let status = SystemInvoker::default().run(&child)?;
    // Killed by a signal: no code to forward.
    Ok(status.code.unwrap_or(exit_codes::INVALID))
}

fn format_record(record: &StepRecord) -> String {
    let best_effort = if record.best_effort { " (best effort)" } else { "" };
    match &record.result {
        StepResult::Failed(failure) => format!(
            "[{}] failed{best_effort}: {failure} ({} ms)",
            record.name, record.duration_ms
        ),
        result => format!(
            "[{}] {} ({} ms)",
            record.name,
            result.label(),
            record.duration_ms
        ),
    }
}

fn report(session: &SessionOutcome) {
    if let Some(step) = &session.outcome.halted_at {
        eprintln!("pipeline halted at `{step}`; later steps were not run");
    }
    eprintln!("run log: {}", session.run_log.display());
}

fn write_export(path: &Path, session: &SessionOutcome) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    fs::write(path, session.export_script())
        .with_context(|| format!("write export script {}", path.display()))
}
