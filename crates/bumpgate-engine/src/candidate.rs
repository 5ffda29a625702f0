//! Per-dependency candidate retries.
//!
//! For one dependency, candidates are tried newest first. Each attempt
//! applies the candidate, syncs the lockfile and runs the gate. The first
//! candidate that passes is kept; every failed attempt restores the
//! dependency's captured entry before the next one is tried.

use std::path::Path;

use bumpgate_ci::{Gate, ScriptConfig, ScriptExecutor};
use bumpgate_core::domain::execution::{ExecutionResult, SPAWN_FAILURE_EXIT_CODE};
use bumpgate_core::domain::{DependencyState, UpgradeAttempt, VersionCandidateSet};
use bumpgate_core::obs;
use bumpgate_core::semver_policy::bump_preserving_sign;
use bumpgate_core::ManifestStateManager;
use tracing::{debug, info};

use crate::error::EngineResult;

/// Skip reason for a dependency whose every candidate failed.
pub const EXHAUSTED_REASON: &str = "all newer versions failed the gate";

/// Terminal state of one dependency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CandidateOutcome {
    Accepted { version: String },
    Exhausted,
}

/// Walks one dependency's candidates against a single mutable manifest.
pub struct CandidateUpgrader<'a> {
    manifest: &'a ManifestStateManager,
    executor: &'a dyn ScriptExecutor,
    sync: &'a ScriptConfig,
    gate: &'a dyn Gate,
    run_id: &'a str,
}

impl<'a> CandidateUpgrader<'a> {
    pub fn new(
        manifest: &'a ManifestStateManager,
        executor: &'a dyn ScriptExecutor,
        sync: &'a ScriptConfig,
        gate: &'a dyn Gate,
        run_id: &'a str,
    ) -> Self {
        Self {
            manifest,
            executor,
            sync,
            gate,
            run_id,
        }
    }

    /// Try every candidate in `set` until one passes.
    ///
    /// `backup` is the dependency's captured entry. Attempts are appended to
    /// `attempts`. An error means the manifest could not be written and the
    /// run cannot continue safely.
    pub async fn upgrade(
        &self,
        set: &VersionCandidateSet,
        backup: &DependencyState,
        attempts: &mut Vec<UpgradeAttempt>,
    ) -> EngineResult<CandidateOutcome> {
        let name = set.package_name.as_str();
        let cwd = self.manifest.project_dir();
        let current_spec = backup.version_spec();

        for candidate in &set.candidates {
            let spec = bump_preserving_sign(&current_spec, candidate)?;
            debug!(package = %name, from = %current_spec, to = %spec, "Trying candidate");

            if let Err(e) = self.manifest.apply_candidate(name, set.section, &spec) {
                attempts.push(UpgradeAttempt::aborted(name, candidate, e.to_string()));
                self.manifest.restore_entry(backup)?;
                return Err(e.into());
            }

            let sync = run_script(self.executor, self.sync, cwd).await;
            if !sync.success {
                self.manifest.restore_entry(backup)?;
                if sync.is_peer_conflict() {
                    obs::emit_peer_conflict(self.run_id, name, candidate);
                }
                info!(
                    package = %name,
                    version = %candidate,
                    exit_code = sync.exit_code,
                    "Lockfile sync failed, trying next candidate"
                );
                attempts.push(UpgradeAttempt::sync_failed(name, candidate, &sync));
                obs::emit_candidate_tried(self.run_id, name, candidate, false);
                continue;
            }

            let outcome = self.gate.evaluate(cwd).await;
            obs::emit_gate_evaluated(
                self.run_id,
                outcome.passed,
                outcome.failed_stage,
                outcome.total_duration_ms(),
            );
            attempts.push(UpgradeAttempt::gated(name, candidate, &outcome));
            obs::emit_candidate_tried(self.run_id, name, candidate, outcome.passed);

            if outcome.passed {
                info!(package = %name, version = %candidate, "Candidate accepted");
                return Ok(CandidateOutcome::Accepted {
                    version: candidate.clone(),
                });
            }

            self.manifest.restore_entry(backup)?;
            if outcome.is_peer_conflict() {
                obs::emit_peer_conflict(self.run_id, name, candidate);
            }
        }

        info!(package = %name, tried = set.candidates.len(), "No candidate passed the gate");
        Ok(CandidateOutcome::Exhausted)
    }
}

/// Run one script, folding a rejected config into a failed result.
pub(crate) async fn run_script(
    executor: &dyn ScriptExecutor,
    config: &ScriptConfig,
    cwd: &Path,
) -> ExecutionResult {
    match executor.run(config, cwd).await {
        Ok(result) => result,
        Err(e) => ExecutionResult::spawn_failed(SPAWN_FAILURE_EXIT_CODE, e.to_string()),
    }
}
