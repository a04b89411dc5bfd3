//! Setup configuration stored in `config.toml` at the project root.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

/// Setup configuration (TOML).
///
/// Intended to be edited by humans. Missing fields default to values that
/// match the repository layout (`.venv`, `dependencies/{ACTS,build,install}`).
/// Relative paths are resolved against the project root.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SetupConfig {
    pub output: OutputConfig,
    pub package_manager: PackageManagerConfig,
    pub venv: VenvConfig,
    pub toolkit: ToolkitConfig,
    pub release_stack: ReleaseStackConfig,
    pub build: BuildConfig,
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory for run logs and the log file.
    pub path: PathBuf,
    /// Enable debug-level logging without passing `--debug`.
    pub debug: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("run"),
            debug: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PackageManagerKind {
    #[default]
    Uv,
    Pdm,
}

impl PackageManagerKind {
    pub fn program(self) -> &'static str {
        match self {
            PackageManagerKind::Uv => "uv",
            PackageManagerKind::Pdm => "pdm",
        }
    }

    pub fn default_installer_url(self) -> &'static str {
        match self {
            PackageManagerKind::Uv => "https://astral.sh/uv/install.sh",
            PackageManagerKind::Pdm => "https://pdm-project.org/install-pdm.py",
        }
    }

    /// Shell pipeline that downloads and runs the installer passed as `$1`.
    pub fn installer_script(self) -> &'static str {
        match self {
            PackageManagerKind::Uv => r#"curl -LsSf "$1" | sh"#,
            PackageManagerKind::Pdm => r#"curl -sSL "$1" | python3 -"#,
        }
    }

    /// Variable that tells the installer (and the tool) where its home is,
    /// with the value to use for a given home directory.
    pub fn home_var(self, home: &Path) -> (&'static str, PathBuf) {
        match self {
            PackageManagerKind::Uv => ("UV_INSTALL_DIR", home.join("bin")),
            PackageManagerKind::Pdm => ("PDM_HOME", home.to_path_buf()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PackageManagerConfig {
    pub kind: PackageManagerKind,
    /// Home directory of the package manager; its `bin/` is added to PATH.
    pub home: PathBuf,
    /// Installer script location. Defaults to the manager's official installer.
    pub installer_url: Option<String>,
}

impl Default for PackageManagerConfig {
    fn default() -> Self {
        Self {
            kind: PackageManagerKind::default(),
            home: PathBuf::from(".tools/uv"),
            installer_url: None,
        }
    }
}

impl PackageManagerConfig {
    pub fn installer_url(&self) -> &str {
        self.installer_url
            .as_deref()
            .unwrap_or_else(|| self.kind.default_installer_url())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct VenvConfig {
    pub dir: PathBuf,
    /// Interpreter used when the package manager cannot create the venv itself.
    pub python: String,
}

impl Default for VenvConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(".venv"),
            python: "python3".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ToolkitConfig {
    pub dependencies_dir: PathBuf,
    pub source_dir: String,
    pub build_dir: String,
    pub install_dir: String,
}

impl Default for ToolkitConfig {
    fn default() -> Self {
        Self {
            dependencies_dir: PathBuf::from("dependencies"),
            source_dir: "ACTS".to_string(),
            build_dir: "build".to_string(),
            install_dir: "install".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ReleaseStackConfig {
    /// Release-stack view setup script (e.g. an LCG view `setup.sh`). When
    /// unset, the release-stack step is omitted.
    pub setup_script: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BuildConfig {
    pub generator: String,
    /// Extra `-D...` arguments for the configure step.
    pub configure_args: Vec<String>,
    /// Parallel build jobs; the generator's default when unset.
    pub jobs: Option<u32>,
    /// Treat an existing `bin/this_acts.sh` in the install tree as "already built".
    pub skip_if_installed: bool,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            generator: "Ninja".to_string(),
            configure_args: vec![
                "-DCMAKE_BUILD_TYPE=RelWithDebInfo".to_string(),
                "-DACTS_BUILD_EXAMPLES_PYTHON_BINDINGS=ON".to_string(),
                "-DACTS_BUILD_FATRAS=ON".to_string(),
            ],
            jobs: None,
            skip_if_installed: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PipelineConfig {
    /// Step names whose failure is recorded but does not halt the pipeline.
    pub best_effort: Vec<String>,
}

impl SetupConfig {
    pub fn validate(&self) -> Result<()> {
        if self.output.path.as_os_str().is_empty() {
            return Err(anyhow!("output.path must not be empty"));
        }
        if self.package_manager.home.as_os_str().is_empty() {
            return Err(anyhow!("package_manager.home must not be empty"));
        }
        if self.package_manager.installer_url().trim().is_empty() {
            return Err(anyhow!("package_manager.installer_url must not be empty"));
        }
        if self.venv.dir.as_os_str().is_empty() {
            return Err(anyhow!("venv.dir must not be empty"));
        }
        if self.venv.python.trim().is_empty() {
            return Err(anyhow!("venv.python must not be empty"));
        }
        for (field, value) in [
            ("toolkit.source_dir", &self.toolkit.source_dir),
            ("toolkit.build_dir", &self.toolkit.build_dir),
            ("toolkit.install_dir", &self.toolkit.install_dir),
        ] {
            if value.trim().is_empty() {
                return Err(anyhow!("{field} must not be empty"));
            }
        }
        if self.build.generator.trim().is_empty() {
            return Err(anyhow!("build.generator must not be empty"));
        }
        if self.build.jobs == Some(0) {
            return Err(anyhow!("build.jobs must be > 0"));
        }
        Ok(())
    }

    pub fn to_toml(&self) -> Result<String> {
        let mut buf = toml::to_string_pretty(self).context("serialize config toml")?;
        if !buf.ends_with('\n') {
            buf.push('\n');
        }
        Ok(buf)
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `SetupConfig::default()`.
pub fn load_config(path: &Path) -> Result<SetupConfig> {
    if !path.exists() {
        let cfg = SetupConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: SetupConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("invalid config {}", path.display()))?;
    Ok(cfg)
}

/// Load config from a TOML file that must exist.
pub fn load_existing_config(path: &Path) -> Result<SetupConfig> {
    if !path.exists() {
        return Err(anyhow!(
            "config file {} not found (run `siliconai-setup init` first)",
            path.display()
        ));
    }
    load_config(path)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &SetupConfig) -> Result<()> {
    cfg.validate()?;
    write_atomic(path, &cfg.to_toml()?)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    if !parent.as_os_str().is_empty() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}
