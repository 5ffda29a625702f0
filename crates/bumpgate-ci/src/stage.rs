//! Script configuration: which package manager runs what, and for how long.

use std::fmt;
use std::str::FromStr;

use bumpgate_core::domain::error::{CoreResult, UpgradeError};
use serde::{Deserialize, Serialize};

/// Tool a script is executed through.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum PackageManagerKind {
    #[default]
    Npm,
    Yarn,
    Pnpm,
    Bun,
    /// The command string is handed to `sh -c` verbatim.
    Shell,
}

impl PackageManagerKind {
    pub const ALL: [PackageManagerKind; 5] = [
        PackageManagerKind::Npm,
        PackageManagerKind::Yarn,
        PackageManagerKind::Pnpm,
        PackageManagerKind::Bun,
        PackageManagerKind::Shell,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            PackageManagerKind::Npm => "npm",
            PackageManagerKind::Yarn => "yarn",
            PackageManagerKind::Pnpm => "pnpm",
            PackageManagerKind::Bun => "bun",
            PackageManagerKind::Shell => "shell",
        }
    }

    /// The executable invoked for this kind.
    pub fn executable(&self) -> &'static str {
        match self {
            PackageManagerKind::Shell => "sh",
            other => other.name(),
        }
    }
}

impl fmt::Display for PackageManagerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PackageManagerKind {
    type Err = UpgradeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PackageManagerKind::ALL
            .into_iter()
            .find(|k| k.name() == s)
            .ok_or_else(|| {
                UpgradeError::ValidationFailed(format!(
                    "Invalid script type: {}. Must be one of: npm, yarn, pnpm, bun, shell",
                    s
                ))
            })
    }
}

/// One script to execute.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScriptConfig {
    pub kind: PackageManagerKind,

    /// Script name or command line; must not be blank.
    pub command: String,

    /// Wall-clock bound in milliseconds; must be positive.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_timeout_ms() -> u64 {
    ScriptConfig::DEFAULT_TIMEOUT_MS
}

impl ScriptConfig {
    /// Five minutes.
    pub const DEFAULT_TIMEOUT_MS: u64 = 300_000;

    pub fn new(kind: PackageManagerKind, command: impl Into<String>) -> Self {
        Self {
            kind,
            command: command.into(),
            timeout_ms: Self::DEFAULT_TIMEOUT_MS,
        }
    }

    /// A `sh -c` script.
    pub fn shell(command: impl Into<String>) -> Self {
        Self::new(PackageManagerKind::Shell, command)
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Reject blank commands and zero timeouts before anything is spawned.
    pub fn validate(&self) -> CoreResult<()> {
        if self.command.trim().is_empty() {
            return Err(UpgradeError::ValidationFailed(
                "Script command cannot be empty".to_string(),
            ));
        }
        if self.timeout_ms == 0 {
            return Err(UpgradeError::ValidationFailed(
                "Script timeout must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

impl fmt::Display for ScriptConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bumpgate_core::UpgradeErrorKind;

    #[test]
    fn test_kind_round_trips_through_names() {
        for kind in PackageManagerKind::ALL {
            assert_eq!(kind.name().parse::<PackageManagerKind>().unwrap(), kind);
        }
        assert_eq!(PackageManagerKind::Shell.executable(), "sh");
        assert_eq!(PackageManagerKind::Pnpm.executable(), "pnpm");
    }

    #[test]
    fn test_unknown_kind_is_validation_error() {
        let err = "deno".parse::<PackageManagerKind>().unwrap_err();
        assert_eq!(err.kind(), UpgradeErrorKind::ValidationFailed);
        assert!(err.to_string().contains("Invalid script type: deno"));
    }

    #[test]
    fn test_default_timeout() {
        let config = ScriptConfig::new(PackageManagerKind::Npm, "test");
        assert_eq!(config.timeout_ms, 300_000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_blank_command_rejected() {
        let err = ScriptConfig::shell("   ").validate().unwrap_err();
        assert!(err.to_string().contains("Script command cannot be empty"));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let err = ScriptConfig::shell("true")
            .with_timeout_ms(0)
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("Script timeout must be positive"));
    }

    #[test]
    fn test_timeout_defaults_when_deserialized() {
        let config: ScriptConfig =
            serde_json::from_str(r#"{"kind":"pnpm","command":"build"}"#).unwrap();
        assert_eq!(config.kind, PackageManagerKind::Pnpm);
        assert_eq!(config.timeout_ms, ScriptConfig::DEFAULT_TIMEOUT_MS);
    }
}
