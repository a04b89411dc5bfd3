//! Project scaffolding for `siliconai-setup init`.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use tracing::info;

use super::config::{SetupConfig, write_config};
use super::layout::ProjectPaths;

/// Options for `init_project`.
#[derive(Debug, Clone)]
pub struct InitOptions {
    /// If true, overwrite an existing configuration file.
    pub force: bool,
}

/// Write the default configuration to `config_path` and create the
/// dependencies and output directories under `root`.
///
/// Fails if the configuration already exists unless `options.force` is set.
pub fn init_project(
    root: &Path,
    config_path: &Path,
    options: &InitOptions,
) -> Result<ProjectPaths> {
    if config_path.exists() && !options.force {
        return Err(anyhow!(
            "init: {} already exists (use --force to overwrite)",
            config_path.display()
        ));
    }
    if config_path.is_dir() {
        return Err(anyhow!(
            "init: {} exists but is a directory",
            config_path.display()
        ));
    }

    let cfg = SetupConfig::default();
    let paths = ProjectPaths::new(root, &cfg);
    write_config(config_path, &cfg)?;
    create_dir(&paths.dependencies_dir)?;
    create_dir(&paths.output_dir)?;
    info!(config = %config_path.display(), "initialized project");

    Ok(paths)
}

fn create_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path).with_context(|| format!("create directory {}", path.display()))
}
