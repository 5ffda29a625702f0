//! Domain-level error taxonomy for bumpgate.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Errors produced by the semver policy.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SemverError {
    #[error("invalid version: {0}")]
    InvalidVersion(String),
}

/// Errors produced while reading or writing the dependency manifest.
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("project path does not exist: {0}")]
    ProjectNotFound(PathBuf),

    #[error("package.json not found at {0}")]
    NotFound(PathBuf),

    #[error("invalid JSON in {path}: {source}")]
    InvalidJson {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("unexpected manifest shape: {0}")]
    Shape(String),

    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors produced by a registry lookup.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("registry request for {package} failed: {reason}")]
    Http { package: String, reason: String },

    #[error("registry returned status {status} for {package}")]
    Status { package: String, status: u16 },

    #[error("unexpected registry payload for {package}: {reason}")]
    Decode { package: String, reason: String },

    #[error("failed to build registry client: {0}")]
    Client(String),
}

/// Serializable error kind, mirrored in reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UpgradeErrorKind {
    ValidationFailed,
    StateCaptureFailed,
    ScriptExecutionFailed,
    RollbackFailed,
    PackageManagerError,
}

/// Upgrade run errors surfaced to callers.
#[derive(Debug, thiserror::Error)]
pub enum UpgradeError {
    #[error("validation failed: {0}")]
    ValidationFailed(String),

    #[error("failed to capture initial state: {0}")]
    StateCaptureFailed(String),

    #[error("script execution failed: {0}")]
    ScriptExecutionFailed(String),

    #[error(
        "failed to rollback {target_state_count} dependencies in {}: {reason}",
        file_path.display()
    )]
    RollbackFailed {
        target_state_count: usize,
        file_path: PathBuf,
        reason: String,
    },

    #[error("package manager error: {0}")]
    PackageManagerError(String),
}

impl UpgradeError {
    pub fn kind(&self) -> UpgradeErrorKind {
        match self {
            UpgradeError::ValidationFailed(_) => UpgradeErrorKind::ValidationFailed,
            UpgradeError::StateCaptureFailed(_) => UpgradeErrorKind::StateCaptureFailed,
            UpgradeError::ScriptExecutionFailed(_) => UpgradeErrorKind::ScriptExecutionFailed,
            UpgradeError::RollbackFailed { .. } => UpgradeErrorKind::RollbackFailed,
            UpgradeError::PackageManagerError(_) => UpgradeErrorKind::PackageManagerError,
        }
    }

    /// None of the surfaced kinds leave a rollback target the caller can rely on.
    pub fn rollback_available(&self) -> bool {
        false
    }
}

impl From<SemverError> for UpgradeError {
    fn from(err: SemverError) -> Self {
        UpgradeError::ValidationFailed(err.to_string())
    }
}

/// Result type for core operations.
pub type CoreResult<T> = std::result::Result<T, UpgradeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upgrade_error_kinds() {
        let err = UpgradeError::ValidationFailed("Script command cannot be empty".to_string());
        assert_eq!(err.kind(), UpgradeErrorKind::ValidationFailed);
        assert!(err.to_string().contains("validation failed"));
        assert!(!err.rollback_available());

        let err = UpgradeError::StateCaptureFailed("package.json not found".to_string());
        assert_eq!(err.kind(), UpgradeErrorKind::StateCaptureFailed);
    }

    #[test]
    fn test_rollback_failed_carries_target_details() {
        let err = UpgradeError::RollbackFailed {
            target_state_count: 3,
            file_path: PathBuf::from("/tmp/project/package.json"),
            reason: "permission denied".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains('3'));
        assert!(msg.contains("/tmp/project/package.json"));
        assert!(msg.contains("permission denied"));
        assert_eq!(err.kind(), UpgradeErrorKind::RollbackFailed);
    }

    #[test]
    fn test_error_kind_serializes_screaming_snake() {
        let json = serde_json::to_string(&UpgradeErrorKind::StateCaptureFailed).unwrap();
        assert_eq!(json, "\"STATE_CAPTURE_FAILED\"");
    }

    #[test]
    fn test_semver_error_converts_to_validation() {
        let err: UpgradeError = SemverError::InvalidVersion("abc".to_string()).into();
        assert_eq!(err.kind(), UpgradeErrorKind::ValidationFailed);
    }
}
