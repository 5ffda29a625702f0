//! bumpgate engine - gated dependency upgrades
//!
//! Drives a run over one project:
//! - Snapshot the manifest and resolve candidates from the registry
//! - Optional fast path (bulk upgrade or an admin command)
//! - Per-dependency candidate retries behind the gate
//! - Whole-project rollback on fatal errors

pub mod candidate;
pub mod error;
pub mod options;
pub mod orchestrator;

pub use candidate::{CandidateOutcome, CandidateUpgrader, EXHAUSTED_REASON};
pub use error::{EngineError, EngineResult};
pub use options::{FastPathMode, UpgradeOptions};
pub use orchestrator::{
    UpgradeOrchestrator, ABORTED_REASON, ADMIN_FAST_PATH_NOTE, BULK_FAST_PATH_FAILED, BULK_FAST_PATH_NOTE,
    REGISTRY_FAILURE_REASON, REVERTED_REASON,
};
