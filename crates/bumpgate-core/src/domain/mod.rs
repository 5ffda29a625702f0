//! Domain models for bumpgate.
//!
//! Canonical definitions for the core entities:
//! - `DependencyState`: one captured manifest entry
//! - `VersionCandidateSet`: newer versions to try for one dependency
//! - `ExecutionResult` / `GateOutcome`: script and gate outcomes
//! - `UpgradeResult`: the aggregate report of a run
//! - `OrchestratorPhase`: the run's phase machine

pub mod candidate;
pub mod error;
pub mod execution;
pub mod phase;
pub mod result;
pub mod snapshot;

pub use candidate::VersionCandidateSet;
pub use error::{
    CoreResult, ManifestError, RegistryError, SemverError, UpgradeError, UpgradeErrorKind,
};
pub use execution::{
    ExecutionResult, GateOutcome, GateStage, NOT_FOUND_EXIT_CODE, SPAWN_FAILURE_EXIT_CODE,
    TIMEOUT_EXIT_CODE,
};
pub use phase::{IllegalTransition, OrchestratorPhase, PhaseEvent, PhaseTransition, RollbackCause};
pub use result::{SkippedDependency, UpgradeAttempt, UpgradedDependency, UpgradeResult};
pub use snapshot::{DependencySection, DependencyState, SemverSign};
