//! Package-manager resolution: install it if missing, put it on PATH.

use std::path::PathBuf;

use tracing::info;

use crate::core::env_state::EnvironmentState;
use crate::core::types::{StepFailure, StepResult};
use crate::io::config::PackageManagerKind;
use crate::io::process::{ToolCommand, ToolInvoker};
use crate::steps::{SetupStep, run_checked};

pub const RESOLVE_PACKAGE_MANAGER: &str = "resolve-package-manager";
pub const ADD_PACKAGE_MANAGER_TO_PATH: &str = "add-package-manager-to-path";

/// Installs the package manager into its home directory when that directory
/// does not exist yet. This is the only step allowed to reach the network, and
/// only through the external installer.
#[derive(Debug, Clone)]
pub struct ResolvePackageManager {
    pub kind: PackageManagerKind,
    pub home: PathBuf,
    pub bin: PathBuf,
    pub installer_url: String,
    pub workdir: PathBuf,
}

impl SetupStep for ResolvePackageManager {
    fn name(&self) -> &str {
        RESOLVE_PACKAGE_MANAGER
    }

    fn precondition(&self, _env: &EnvironmentState) -> bool {
        self.home.is_dir()
    }

    fn action(&self, env: &mut EnvironmentState, invoker: &dyn ToolInvoker) -> StepResult {
        info!(
            kind = self.kind.program(),
            home = %self.home.display(),
            url = %self.installer_url,
            "installing package manager"
        );
        let (home_var, home_value) = self.kind.home_var(&self.home);
        let mut command = ToolCommand::new("sh", &self.workdir, env)
            .arg("-c")
            .arg(self.kind.installer_script())
            .arg("siliconai-setup")
            .arg(self.installer_url.clone())
            .env_var(home_var, home_value.display().to_string());
        if self.kind == PackageManagerKind::Uv {
            // Keep the installer away from shell profiles.
            command = command.env_var("UV_NO_MODIFY_PATH", "1");
        }
        if let Err(failure) = run_checked(invoker, &command) {
            return failure.into();
        }
        if !self.bin.is_dir() {
            return StepFailure::Filesystem {
                path: self.bin.display().to_string(),
                reason: "installer finished but the bin directory does not exist".to_string(),
            }
            .into();
        }
        StepResult::Applied
    }
}

/// Prepends the package manager's bin directory to PATH and exports its home.
#[derive(Debug, Clone)]
pub struct AddPackageManagerToPath {
    pub kind: PackageManagerKind,
    pub home: PathBuf,
    pub bin: PathBuf,
}

impl AddPackageManagerToPath {
    fn bin_segment(&self) -> String {
        self.bin.display().to_string()
    }
}

impl SetupStep for AddPackageManagerToPath {
    fn name(&self) -> &str {
        ADD_PACKAGE_MANAGER_TO_PATH
    }

    /// Holds only when PATH has the bin dir and the home variable is exported
    /// with the expected value.
    fn precondition(&self, env: &EnvironmentState) -> bool {
        let (home_var, home_value) = self.kind.home_var(&self.home);
        env.contains_segment("PATH", &self.bin_segment())
            && env.get(home_var) == Some(home_value.display().to_string().as_str())
    }

    fn action(&self, env: &mut EnvironmentState, _invoker: &dyn ToolInvoker) -> StepResult {
        let (home_var, home_value) = self.kind.home_var(&self.home);
        let mut changed = env.prepend_path("PATH", &self.bin_segment());
        changed |= env.set(home_var, home_value.display().to_string());
        StepResult::from_changed(changed)
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::test_support::{ScriptedInvoker, ScriptedResponse, TestProject};

    fn resolve_step(project: &TestProject) -> ResolvePackageManager {
        let paths = project.paths();
        ResolvePackageManager {
            kind: PackageManagerKind::Uv,
            home: paths.package_manager_home,
            bin: paths.package_manager_bin,
            installer_url: "https://example.invalid/install.sh".to_string(),
            workdir: paths.root,
        }
    }

    #[test]
    fn existing_home_is_already_satisfied() {
        let project = TestProject::new().expect("project");
        let step = resolve_step(&project);
        fs::create_dir_all(&step.home).expect("home");
        let invoker = ScriptedInvoker::new(Vec::new());
        let mut env = project.base_env();

        assert_eq!(step.apply(&mut env, &invoker), StepResult::AlreadySatisfied);
        assert!(invoker.calls().is_empty());
        assert_eq!(env, project.base_env());
    }

    #[test]
    fn missing_home_runs_installer_with_install_dir() {
        let project = TestProject::new().expect("project");
        let step = resolve_step(&project);
        let bin = step.bin.clone();
        let invoker = ScriptedInvoker::new(vec![ScriptedResponse::exit(0).with_effect(move |_| {
            fs::create_dir_all(&bin).expect("create bin");
        })]);
        let mut env = project.base_env();

        assert_eq!(step.apply(&mut env, &invoker), StepResult::Applied);
        let calls = invoker.calls();
        assert_eq!(calls[0].program, "sh");
        assert_eq!(
            calls[0].args.last().map(String::as_str),
            Some("https://example.invalid/install.sh")
        );
        assert_eq!(
            calls[0].env.get("UV_INSTALL_DIR"),
            Some(step.bin.display().to_string().as_str())
        );
        assert_eq!(calls[0].env.get("UV_NO_MODIFY_PATH"), Some("1"));
        assert_eq!(env, project.base_env());

        assert_eq!(step.apply(&mut env, &invoker), StepResult::AlreadySatisfied);
    }

    #[test]
    fn pdm_installer_gets_only_its_home_variable() {
        let project = TestProject::new().expect("project");
        let mut step = resolve_step(&project);
        step.kind = PackageManagerKind::Pdm;
        let invoker = ScriptedInvoker::new(vec![ScriptedResponse::exit(1)]);
        let mut env = project.base_env();

        assert!(step.apply(&mut env, &invoker).is_failed());
        let calls = invoker.calls();
        assert_eq!(
            calls[0].env.get("PDM_HOME"),
            Some(step.home.display().to_string().as_str())
        );
        assert_eq!(calls[0].env.get("UV_NO_MODIFY_PATH"), None);
        assert_eq!(calls[0].env.get("UV_INSTALL_DIR"), None);
    }

    #[test]
    fn installer_failure_is_reported() {
        let project = TestProject::new().expect("project");
        let step = resolve_step(&project);
        let invoker = ScriptedInvoker::new(vec![ScriptedResponse::exit(22)]);
        let mut env = project.base_env();

        let result = step.apply(&mut env, &invoker);
        assert!(matches!(
            result,
            StepResult::Failed(StepFailure::ExternalProcess {
                exit_code: Some(22),
                ..
            })
        ));
    }

    #[test]
    fn installer_success_without_bin_dir_is_filesystem_failure() {
        let project = TestProject::new().expect("project");
        let step = resolve_step(&project);
        let invoker = ScriptedInvoker::succeeding(1);
        let mut env = project.base_env();

        assert!(matches!(
            step.apply(&mut env, &invoker),
            StepResult::Failed(StepFailure::Filesystem { .. })
        ));
    }

    #[test]
    fn path_already_containing_bin_is_unchanged() {
        let step = AddPackageManagerToPath {
            kind: PackageManagerKind::Uv,
            home: PathBuf::from("/opt/pkgmgr"),
            bin: PathBuf::from("/opt/pkgmgr/bin"),
        };
        let mut env = EnvironmentState::from_pairs([
            ("PATH", "/usr/bin:/opt/pkgmgr/bin"),
            ("UV_INSTALL_DIR", "/opt/pkgmgr/bin"),
        ]);
        let before = env.clone();

        let result = step.apply(&mut env, &ScriptedInvoker::new(Vec::new()));

        assert_eq!(result, StepResult::AlreadySatisfied);
        assert_eq!(env, before);
    }

    #[test]
    fn missing_home_variable_is_exported_without_touching_path() {
        let step = AddPackageManagerToPath {
            kind: PackageManagerKind::Pdm,
            home: PathBuf::from("/opt/pdm"),
            bin: PathBuf::from("/opt/pdm/bin"),
        };
        let invoker = ScriptedInvoker::new(Vec::new());
        let mut env = EnvironmentState::from_pairs([("PATH", "/usr/bin:/opt/pdm/bin")]);

        assert!(!step.precondition(&env));
        assert_eq!(step.apply(&mut env, &invoker), StepResult::Applied);
        assert_eq!(env.get("PATH"), Some("/usr/bin:/opt/pdm/bin"));
        assert_eq!(env.get("PDM_HOME"), Some("/opt/pdm"));
        assert_eq!(step.apply(&mut env, &invoker), StepResult::AlreadySatisfied);
    }

    #[test]
    fn bin_dir_is_prepended_once() {
        let step = AddPackageManagerToPath {
            kind: PackageManagerKind::Pdm,
            home: PathBuf::from("/opt/pdm"),
            bin: PathBuf::from("/opt/pdm/bin"),
        };
        let invoker = ScriptedInvoker::new(Vec::new());
        let mut env = EnvironmentState::from_pairs([("PATH", "/usr/bin")]);

        assert_eq!(step.apply(&mut env, &invoker), StepResult::Applied);
        assert_eq!(step.apply(&mut env, &invoker), StepResult::AlreadySatisfied);
        assert_eq!(env.get("PATH"), Some("/opt/pdm/bin:/usr/bin"));
        assert_eq!(env.get("PDM_HOME"), Some("/opt/pdm"));
    }
}
