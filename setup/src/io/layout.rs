//! Canonical filesystem layout of a project being set up.

use std::path::{Path, PathBuf};

use crate::io::config::SetupConfig;

/// File name of the configuration at the project root.
pub const CONFIG_FILE: &str = "config.toml";

/// All canonical paths for a project root, with configuration applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectPaths {
    pub root: PathBuf,
    pub output_dir: PathBuf,
    pub runs_dir: PathBuf,
    pub log_path: PathBuf,
    pub package_manager_home: PathBuf,
    pub package_manager_bin: PathBuf,
    pub venv_dir: PathBuf,
    pub venv_bin: PathBuf,
    pub dependencies_dir: PathBuf,
    pub toolkit_source: PathBuf,
    pub toolkit_build: PathBuf,
    pub toolkit_install: PathBuf,
    /// Toolkit environment script generated by its install step.
    pub toolkit_env_script: PathBuf,
    /// Python bindings environment script generated by its install step.
    pub toolkit_python_script: PathBuf,
    /// Python bindings directory prepended to PYTHONPATH.
    pub toolkit_python_dir: PathBuf,
    pub release_stack_script: Option<PathBuf>,
}

impl ProjectPaths {
    pub fn new(root: impl Into<PathBuf>, cfg: &SetupConfig) -> Self {
        let root = root.into();
        let output_dir = resolve(&root, &cfg.output.path);
        let package_manager_home = resolve(&root, &cfg.package_manager.home);
        let venv_dir = resolve(&root, &cfg.venv.dir);
        let dependencies_dir = resolve(&root, &cfg.toolkit.dependencies_dir);
        let toolkit_install = dependencies_dir.join(&cfg.toolkit.install_dir);
        let toolkit_python_dir = toolkit_install.join("python");
        Self {
            root: root.clone(),
            runs_dir: output_dir.join("runs"),
            log_path: output_dir.join("siliconai_setup.log"),
            output_dir,
            package_manager_bin: package_manager_home.join("bin"),
            package_manager_home,
            venv_bin: venv_dir.join("bin"),
            venv_dir,
            toolkit_source: dependencies_dir.join(&cfg.toolkit.source_dir),
            toolkit_build: dependencies_dir.join(&cfg.toolkit.build_dir),
            toolkit_env_script: toolkit_install.join("bin").join("this_acts.sh"),
            toolkit_python_script: toolkit_python_dir.join("setup.sh"),
            toolkit_python_dir,
            toolkit_install,
            dependencies_dir,
            release_stack_script: cfg
                .release_stack
                .setup_script
                .as_deref()
                .map(|script| resolve(&root, script)),
        }
    }
}

fn resolve(root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_layout_matches_repository_convention() {
        let paths = ProjectPaths::new("/p", &SetupConfig::default());
        assert_eq!(paths.venv_dir, PathBuf::from("/p/.venv"));
        assert_eq!(paths.toolkit_source, PathBuf::from("/p/dependencies/ACTS"));
        assert_eq!(paths.toolkit_build, PathBuf::from("/p/dependencies/build"));
        assert_eq!(
            paths.toolkit_env_script,
            PathBuf::from("/p/dependencies/install/bin/this_acts.sh")
        );
        assert_eq!(
            paths.toolkit_python_script,
            PathBuf::from("/p/dependencies/install/python/setup.sh")
        );
        assert_eq!(paths.package_manager_bin, PathBuf::from("/p/.tools/uv/bin"));
        assert_eq!(paths.release_stack_script, None);
    }

    #[test]
    fn absolute_paths_are_kept() {
        let mut cfg = SetupConfig::default();
        cfg.package_manager.home = PathBuf::from("/opt/pkgmgr");
        cfg.release_stack.setup_script = Some(PathBuf::from("/cvmfs/lcg/view/setup.sh"));
        let paths = ProjectPaths::new("/p", &cfg);
        assert_eq!(paths.package_manager_bin, PathBuf::from("/opt/pkgmgr/bin"));
        assert_eq!(
            paths.release_stack_script,
            Some(PathBuf::from("/cvmfs/lcg/view/setup.sh"))
        );
    }
}
