//! Run outcome: upgraded and skipped dependencies, attempts, transitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::execution::{ExecutionResult, GateOutcome, GateStage};
use crate::domain::phase::PhaseTransition;
use crate::domain::snapshot::DependencyState;

/// A dependency whose new version passed the gate and was kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpgradedDependency {
    pub package_name: String,
    /// Bare version before the run.
    pub from_version: String,
    /// Bare version now on disk.
    pub to_version: String,
}

/// A dependency left at its original version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedDependency {
    pub package_name: String,
    pub reason: String,
}

/// One candidate trial. Built for the report only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpgradeAttempt {
    pub package_name: String,
    pub tried_version: String,
    pub accepted: bool,

    /// `None` when the lockfile sync failed and the gate never ran.
    pub gate_passed: Option<bool>,
    pub failed_stage: Option<GateStage>,
    pub exit_code: Option<i32>,
    pub peer_conflict: bool,
    pub reason: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl UpgradeAttempt {
    /// Attempt whose lockfile sync step failed.
    pub fn sync_failed(package_name: &str, tried_version: &str, sync: &ExecutionResult) -> Self {
        Self {
            package_name: package_name.to_string(),
            tried_version: tried_version.to_string(),
            accepted: false,
            gate_passed: None,
            failed_stage: None,
            exit_code: Some(sync.exit_code),
            peer_conflict: sync.is_peer_conflict(),
            reason: Some(format!("lockfile sync failed with exit code {}", sync.exit_code)),
            timestamp: Utc::now(),
        }
    }

    /// Attempt that reached the gate.
    pub fn gated(package_name: &str, tried_version: &str, outcome: &GateOutcome) -> Self {
        let failure = outcome.failure();
        Self {
            package_name: package_name.to_string(),
            tried_version: tried_version.to_string(),
            accepted: outcome.passed,
            gate_passed: Some(outcome.passed),
            failed_stage: outcome.failed_stage,
            exit_code: failure.map(|r| r.exit_code),
            peer_conflict: outcome.is_peer_conflict(),
            reason: outcome
                .failed_stage
                .map(|stage| format!("{} stage failed", stage)),
            timestamp: Utc::now(),
        }
    }

    /// Attempt that never got to run because the manifest write failed.
    pub fn aborted(package_name: &str, tried_version: &str, reason: impl Into<String>) -> Self {
        Self {
            package_name: package_name.to_string(),
            tried_version: tried_version.to_string(),
            accepted: false,
            gate_passed: None,
            failed_stage: None,
            exit_code: None,
            peer_conflict: false,
            reason: Some(reason.into()),
            timestamp: Utc::now(),
        }
    }
}

/// Aggregate outcome of one orchestrator run.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UpgradeResult {
    pub upgraded: Vec<UpgradedDependency>,
    pub skipped: Vec<SkippedDependency>,
    pub remaining_outdated: Vec<String>,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,

    /// When true the manifest on disk matches `initial_state`.
    pub rollback_performed: bool,

    /// False once a rollback write has failed.
    pub rollback_available: bool,
    pub initial_state: Option<Vec<DependencyState>>,
    pub rollback_errors: Vec<String>,

    pub fast_path_succeeded: bool,
    pub attempts: Vec<UpgradeAttempt>,
    pub transitions: Vec<PhaseTransition>,
}

impl UpgradeResult {
    /// Empty result with a rollback target still available.
    pub fn new() -> Self {
        Self {
            rollback_available: true,
            ..Self::default()
        }
    }

    pub fn skip(&mut self, package_name: &str, reason: impl Into<String>) {
        self.skipped.push(SkippedDependency {
            package_name: package_name.to_string(),
            reason: reason.into(),
        });
        if !self.remaining_outdated.iter().any(|n| n == package_name) {
            self.remaining_outdated.push(package_name.to_string());
        }
    }

    /// Whether a rollback was attempted and failed.
    pub fn rollback_failed(&self) -> bool {
        !self.rollback_errors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_result_has_rollback_available() {
        let result = UpgradeResult::new();
        assert!(result.rollback_available);
        assert!(!result.rollback_performed);
        assert!(!result.rollback_failed());
    }

    #[test]
    fn skip_records_remaining_outdated_once() {
        let mut result = UpgradeResult::new();
        result.skip("lodash", "all newer versions failed the gate");
        result.skip("lodash", "reverted by project rollback");
        assert_eq!(result.skipped.len(), 2);
        assert_eq!(result.remaining_outdated, vec!["lodash".to_string()]);
    }

    #[test]
    fn gated_attempt_captures_failed_stage() {
        let outcome = GateOutcome {
            passed: false,
            failed_stage: Some(GateStage::Build),
            results: vec![(
                GateStage::Build,
                ExecutionResult::from_exit(2, String::new(), "tsc error".into(), 9),
            )],
        };
        let attempt = UpgradeAttempt::gated("typescript", "5.4.0", &outcome);
        assert!(!attempt.accepted);
        assert_eq!(attempt.gate_passed, Some(false));
        assert_eq!(attempt.failed_stage, Some(GateStage::Build));
        assert_eq!(attempt.exit_code, Some(2));
        assert_eq!(attempt.reason.as_deref(), Some("build stage failed"));
    }

    #[test]
    fn sync_failure_flags_peer_conflicts() {
        let attempt = UpgradeAttempt::sync_failed(
            "react",
            "19.0.0",
            &ExecutionResult::from_exit(1, String::new(), "npm ERR! ERESOLVE".into(), 40),
        );
        assert!(attempt.peer_conflict);
        assert_eq!(attempt.gate_passed, None);
    }
}
