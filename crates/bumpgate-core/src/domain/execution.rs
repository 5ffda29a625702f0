//! Script execution and gate outcome types.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Exit code reported when a script exceeds its wall-clock bound.
pub const TIMEOUT_EXIT_CODE: i32 = 124;

/// Exit code reported when the executable could not be found.
pub const NOT_FOUND_EXIT_CODE: i32 = 127;

/// Exit code reported for any other spawn or wait failure.
pub const SPAWN_FAILURE_EXIT_CODE: i32 = 1;

/// Outcome of running one external command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// Equal to `exit_code == 0`.
    pub success: bool,
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub duration_ms: u64,
}

impl ExecutionResult {
    /// Build a result whose `success` flag follows the exit code.
    pub fn from_exit(exit_code: i32, stdout: String, stderr: String, duration_ms: u64) -> Self {
        Self {
            success: exit_code == 0,
            exit_code,
            stdout,
            stderr,
            duration_ms,
        }
    }

    /// Result for a process killed after exceeding `timeout_ms`.
    pub fn timed_out(timeout_ms: u64, stdout: String, duration_ms: u64) -> Self {
        Self::from_exit(
            TIMEOUT_EXIT_CODE,
            stdout,
            format!("Command timed out after {}ms", timeout_ms),
            duration_ms,
        )
    }

    /// Result for a process that never started.
    pub fn spawn_failed(exit_code: i32, message: impl Into<String>) -> Self {
        Self::from_exit(exit_code, String::new(), message.into(), 0)
    }

    pub fn is_timeout(&self) -> bool {
        self.exit_code == TIMEOUT_EXIT_CODE
    }

    /// Whether stderr carries a peer-dependency resolution conflict.
    pub fn is_peer_conflict(&self) -> bool {
        self.stderr.contains("ERESOLVE") || self.stderr.contains("peer dep")
    }
}

/// A stage of the acceptance gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateStage {
    Install,
    Test,
    Build,
    Lint,
    /// Single caller-supplied command used by the admin fast path.
    Admin,
}

impl GateStage {
    pub fn name(&self) -> &'static str {
        match self {
            GateStage::Install => "install",
            GateStage::Test => "test",
            GateStage::Build => "build",
            GateStage::Lint => "lint",
            GateStage::Admin => "admin",
        }
    }
}

impl fmt::Display for GateStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Result of running the gate pipeline once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateOutcome {
    pub passed: bool,

    /// First stage that failed; later stages were not started.
    pub failed_stage: Option<GateStage>,

    /// One entry per stage that actually ran, in order.
    pub results: Vec<(GateStage, ExecutionResult)>,
}

impl GateOutcome {
    /// The result of the failing stage, if any.
    pub fn failure(&self) -> Option<&ExecutionResult> {
        let stage = self.failed_stage?;
        self.results
            .iter()
            .find(|(s, _)| *s == stage)
            .map(|(_, r)| r)
    }

    /// Whether the failing stage reported a peer-dependency conflict.
    pub fn is_peer_conflict(&self) -> bool {
        self.failure().is_some_and(ExecutionResult::is_peer_conflict)
    }

    pub fn total_duration_ms(&self) -> u64 {
        self.results.iter().map(|(_, r)| r.duration_ms).sum()
    }
}
