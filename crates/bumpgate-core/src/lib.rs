//! bumpgate core library
//!
//! Domain model, semver policy, manifest state management and registry
//! lookups shared by the gate and engine crates.

pub mod domain;
pub mod fakes;
pub mod manifest;
pub mod obs;
pub mod registry;
pub mod reporting;
pub mod semver_policy;
pub mod telemetry;

pub use domain::{
    CoreResult, DependencySection, DependencyState, ExecutionResult, GateOutcome, GateStage,
    IllegalTransition, ManifestError, OrchestratorPhase, PhaseEvent, PhaseTransition,
    RegistryError, RollbackCause, SemverError, SemverSign, SkippedDependency, UpgradeAttempt,
    UpgradeError, UpgradeErrorKind, UpgradeResult, UpgradedDependency, VersionCandidateSet,
};

pub use manifest::{ManifestStateManager, MANIFEST_FILE};
pub use registry::{
    detect_custom_registry, NpmRegistry, RegistryConfig, VersionSource, NPM_REGISTRY_URL,
};
pub use reporting::{read_snapshot_json, render_summary, write_result_json, write_snapshot_json};
pub use semver_policy::{bump_preserving_sign, parse_sign, sort_descending_stable};

pub use obs::{
    emit_candidate_tried, emit_gate_evaluated, emit_peer_conflict, emit_phase_changed,
    emit_rollback, emit_run_finished, emit_run_started, run_span,
};
pub use telemetry::init_tracing;

/// bumpgate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
