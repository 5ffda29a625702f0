//! Orchestrator phases and the single transition function between them.
//!
//! A run moves `Idle → Checking → Fetching → {FastPath | Iterating} → Done`,
//! detouring through `RollingBack` when the fast path fails or a fatal error
//! hits. Any pair not listed in [`OrchestratorPhase::on`] is rejected.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Why a whole-project rollback was started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RollbackCause {
    /// The bulk attempt failed; iteration resumes afterwards.
    FastPathFailed,
    /// An unrecoverable error; the run ends afterwards.
    Fatal,
}

/// Closed set of orchestrator phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "phase", content = "cause")]
pub enum OrchestratorPhase {
    Idle,
    Checking,
    Fetching,
    FastPath,
    Iterating,
    RollingBack(RollbackCause),
    Done,
    Failed,
}

impl OrchestratorPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrchestratorPhase::Done | OrchestratorPhase::Failed)
    }

    /// Apply `event`, returning the next phase or the rejected pair.
    pub fn on(self, event: PhaseEvent) -> Result<OrchestratorPhase, IllegalTransition> {
        use OrchestratorPhase as P;
        use PhaseEvent as E;

        let next = match (self, event) {
            (P::Idle, E::Start) => P::Checking,

            (P::Checking, E::SnapshotCaptured) => P::Fetching,

            (P::Fetching, E::NothingToUpgrade) => P::Done,
            (P::Fetching, E::BeginFastPath) => P::FastPath,
            (P::Fetching, E::BeginIteration) => P::Iterating,

            (P::FastPath, E::FastPathPassed) => P::Done,
            (P::FastPath, E::FastPathFailed) => P::RollingBack(RollbackCause::FastPathFailed),

            (P::Iterating, E::IterationFinished) => P::Done,

            (P::RollingBack(RollbackCause::FastPathFailed), E::RollbackSucceeded) => P::Iterating,
            (P::RollingBack(RollbackCause::Fatal), E::RollbackSucceeded) => P::Failed,
            (P::RollingBack(_), E::RollbackFailed) => P::Failed,

            (
                P::Checking | P::Fetching | P::FastPath | P::Iterating,
                E::Fatal { rollback: false },
            ) => P::Failed,
            (P::Fetching | P::FastPath | P::Iterating, E::Fatal { rollback: true }) => {
                P::RollingBack(RollbackCause::Fatal)
            }

            (from, event) => return Err(IllegalTransition { from, event }),
        };
        Ok(next)
    }
}

impl fmt::Display for OrchestratorPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrchestratorPhase::Idle => f.write_str("idle"),
            OrchestratorPhase::Checking => f.write_str("checking"),
            OrchestratorPhase::Fetching => f.write_str("fetching"),
            OrchestratorPhase::FastPath => f.write_str("fast_path"),
            OrchestratorPhase::Iterating => f.write_str("iterating"),
            OrchestratorPhase::RollingBack(_) => f.write_str("rolling_back"),
            OrchestratorPhase::Done => f.write_str("done"),
            OrchestratorPhase::Failed => f.write_str("failed"),
        }
    }
}

/// Inputs that drive the phase machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "event")]
pub enum PhaseEvent {
    Start,
    SnapshotCaptured,
    NothingToUpgrade,
    BeginFastPath,
    BeginIteration,
    FastPathPassed,
    FastPathFailed,
    IterationFinished,
    RollbackSucceeded,
    RollbackFailed,
    Fatal { rollback: bool },
}

/// A rejected `(phase, event)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("illegal transition from {from} on {event:?}")]
pub struct IllegalTransition {
    pub from: OrchestratorPhase,
    pub event: PhaseEvent,
}

/// One recorded step of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseTransition {
    pub from: OrchestratorPhase,
    pub to: OrchestratorPhase,
    pub event: PhaseEvent,
    pub at: DateTime<Utc>,
}
