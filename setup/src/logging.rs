//! Tracing setup for the CLI.
//!
//! - **Tracing (this module)**: diagnostics via `RUST_LOG` or `--debug`, output
//!   to stderr and, for pipeline commands, appended to the log file in the
//!   output directory.
//!
//! - **Run logging (`io/run_log`)**: per-run JSON records in `<output>/runs/`.
//!   Always written, unaffected by `RUST_LOG`.

use std::fs::{self, OpenOptions};
use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber.
///
/// `debug` forces the `debug` level; otherwise `RUST_LOG` is read and defaults
/// to `warn`.
///
/// # Example
/// ```bash
/// RUST_LOG=siliconai_setup=info siliconai-setup setup
/// ```
pub fn init(debug: bool, log_file: Option<&Path>) -> Result<()> {
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    let file_layer = match log_file {
        Some(path) => {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("create log directory {}", parent.display()))?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("open log file {}", path.display()))?;
            Some(
                fmt::layer()
                    .with_writer(Mutex::new(file))
                    .with_ansi(false),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .with(file_layer)
        .try_init()
        .context("initialize tracing")?;
    Ok(())
}
