//! Run configuration.

use std::path::PathBuf;

use bumpgate_ci::{GatePipeline, PackageManagerKind, ScriptConfig, DEFAULT_MAX_OUTPUT_BYTES};
use bumpgate_core::domain::error::{CoreResult, UpgradeError};
use serde::{Deserialize, Serialize};

/// How the orchestrator tries its single bulk attempt before iterating.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case", tag = "mode", content = "command")]
pub enum FastPathMode {
    /// Go straight to per-dependency iteration.
    Off,
    /// Apply every newest candidate at once and run the full gate.
    #[default]
    Bulk,
    /// Run one caller-supplied command against the unchanged manifest.
    Admin(ScriptConfig),
}

/// Options for one orchestrator run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpgradeOptions {
    pub working_dir: PathBuf,
    pub package_manager: PackageManagerKind,
    pub install_script: Option<ScriptConfig>,
    pub test_script: Option<ScriptConfig>,
    pub build_script: Option<ScriptConfig>,
    pub lint_script: Option<ScriptConfig>,

    /// Lockfile sync run after each manifest change. Defaults to the
    /// package manager's bare `install`.
    pub sync_script: Option<ScriptConfig>,
    pub fast_path: FastPathMode,
    pub rollback_on_failure: bool,
    pub max_output_bytes: usize,
}

impl Default for UpgradeOptions {
    fn default() -> Self {
        Self {
            working_dir: PathBuf::from("."),
            package_manager: PackageManagerKind::default(),
            install_script: None,
            test_script: None,
            build_script: None,
            lint_script: None,
            sync_script: None,
            fast_path: FastPathMode::default(),
            rollback_on_failure: true,
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
        }
    }
}

impl UpgradeOptions {
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: working_dir.into(),
            ..Self::default()
        }
    }

    /// Shorthand for test, build and lint scripts of the configured package manager.
    pub fn with_stages(mut self, test: &str, build: &str, lint: &str) -> Self {
        let pm = self.package_manager;
        self.test_script = Some(ScriptConfig::new(pm, test));
        self.build_script = Some(ScriptConfig::new(pm, build));
        self.lint_script = Some(ScriptConfig::new(pm, lint));
        self
    }

    /// Check every script config and assemble the gate pipeline.
    pub fn validate(&self) -> CoreResult<GatePipeline> {
        if self.max_output_bytes == 0 {
            return Err(UpgradeError::ValidationFailed(
                "max_output_bytes must be positive".to_string(),
            ));
        }
        self.sync_config()?;
        if let FastPathMode::Admin(command) = &self.fast_path {
            command.validate()?;
        }
        GatePipeline::from_parts(
            self.install_script.clone(),
            self.test_script.clone(),
            self.build_script.clone(),
            self.lint_script.clone(),
        )
    }

    /// The lockfile sync command.
    pub fn sync_config(&self) -> CoreResult<ScriptConfig> {
        let config = match &self.sync_script {
            Some(config) => config.clone(),
            None if self.package_manager == PackageManagerKind::Shell => {
                return Err(UpgradeError::ValidationFailed(
                    "a sync script is required when the package manager is shell".to_string(),
                ))
            }
            None => ScriptConfig::new(self.package_manager, "install"),
        };
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bumpgate_core::UpgradeErrorKind;

    #[test]
    fn test_defaults() {
        let options = UpgradeOptions::default();
        assert!(options.rollback_on_failure);
        assert_eq!(options.fast_path, FastPathMode::Bulk);
        assert_eq!(options.max_output_bytes, 1024 * 1024);
        assert_eq!(options.package_manager, PackageManagerKind::Npm);
    }

    #[test]
    fn test_missing_test_script_fails_validation() {
        let mut options = UpgradeOptions::new("/tmp").with_stages("test", "build", "lint");
        options.test_script = None;
        let err = options.validate().unwrap_err();
        assert_eq!(err.kind(), UpgradeErrorKind::ValidationFailed);
        assert!(err.to_string().contains("test script is required"));
    }

    #[test]
    fn test_validate_builds_pipeline_with_install() {
        let mut options = UpgradeOptions::new("/tmp").with_stages("test", "run build", "lint");
        options.install_script = Some(ScriptConfig::new(PackageManagerKind::Npm, "ci"));
        let pipeline = options.validate().unwrap();
        assert_eq!(pipeline.stages().len(), 4);
    }

    #[test]
    fn test_sync_defaults_to_bare_install() {
        let mut options = UpgradeOptions::new("/tmp");
        options.package_manager = PackageManagerKind::Pnpm;
        let sync = options.sync_config().unwrap();
        assert_eq!(sync.kind, PackageManagerKind::Pnpm);
        assert_eq!(sync.command, "install");
    }

    #[test]
    fn test_shell_package_manager_needs_sync_script() {
        let mut options = UpgradeOptions::new("/tmp");
        options.package_manager = PackageManagerKind::Shell;
        assert!(options.sync_config().is_err());

        options.sync_script = Some(ScriptConfig::shell("npm ci"));
        assert_eq!(options.sync_config().unwrap().command, "npm ci");
    }

    #[test]
    fn test_admin_command_is_validated() {
        let mut options = UpgradeOptions::new("/tmp").with_stages("test", "build", "lint");
        options.fast_path = FastPathMode::Admin(ScriptConfig::shell(""));
        let err = options.validate().unwrap_err();
        assert!(err.to_string().contains("Script command cannot be empty"));
    }

    #[test]
    fn test_options_deserialize_with_defaults() {
        let options: UpgradeOptions = serde_json::from_str(
            r#"{"working_dir":"/srv/app","fast_path":{"mode":"admin","command":{"kind":"shell","command":"make ci"}}}"#,
        )
        .unwrap();
        assert_eq!(options.working_dir, PathBuf::from("/srv/app"));
        assert!(options.rollback_on_failure);
        match options.fast_path {
            FastPathMode::Admin(cfg) => assert_eq!(cfg.command, "make ci"),
            other => panic!("unexpected fast path {:?}", other),
        }
    }
}
