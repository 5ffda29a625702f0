//! Top-level upgrade driver.
//!
//! A run captures the manifest snapshot, resolves candidates from the
//! registry, optionally tries a single fast-path attempt, then walks each
//! outdated dependency through a [`CandidateUpgrader`]. Every phase change
//! goes through [`OrchestratorPhase::on`] and is recorded on the result and
//! on the optional observer channel.
//!
//! Fatal errors after the snapshot was taken trigger a whole-project
//! rollback when `rollback_on_failure` is set. That rollback also reverts
//! upgrades accepted earlier in the run.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use bumpgate_ci::{Gate, GateRunner, PipelineGate, ScriptConfig, ScriptExecutor};
use bumpgate_core::domain::error::{CoreResult, UpgradeError};
use bumpgate_core::domain::{
    DependencyState, OrchestratorPhase, PhaseEvent, PhaseTransition, SkippedDependency,
    UpgradeAttempt, UpgradeResult, UpgradedDependency, VersionCandidateSet,
};
use bumpgate_core::registry::{detect_custom_registry, VersionSource};
use bumpgate_core::semver_policy::bump_preserving_sign;
use bumpgate_core::{obs, ManifestStateManager};
use chrono::Utc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn, Instrument};
use uuid::Uuid;

use crate::candidate::{run_script, CandidateOutcome, CandidateUpgrader, EXHAUSTED_REASON};
use crate::error::{EngineError, EngineResult};
use crate::options::{FastPathMode, UpgradeOptions};

/// Warning recorded when the admin fast path passes.
pub const ADMIN_FAST_PATH_NOTE: &str =
    "Fast-path successful: admin gate passed, no iterative upgrades needed";

/// Warning recorded when the bulk fast path passes.
pub const BULK_FAST_PATH_NOTE: &str =
    "Fast-path successful: all dependencies upgraded to their newest versions";

/// Prefix of the warning recorded when the bulk fast path fails.
pub const BULK_FAST_PATH_FAILED: &str = "Fast-path failed";

/// Skip reason for accepted upgrades undone by a whole-project rollback.
pub const REVERTED_REASON: &str = "reverted by project rollback";

/// Prefix of the skip reason for dependencies left unfinished by a fatal error.
pub const ABORTED_REASON: &str = "run aborted";

/// Skip reason for dependencies whose versions could not be fetched.
pub const REGISTRY_FAILURE_REASON: &str = "registry lookup failed";

pub struct UpgradeOrchestrator {
    options: UpgradeOptions,
    registry: Arc<dyn VersionSource>,
    executor: Arc<dyn ScriptExecutor>,
    observer: Option<mpsc::UnboundedSender<PhaseTransition>>,
}

/// Captured state shared by the later phases of one run.
struct RunState {
    run_id: String,
    manifest: ManifestStateManager,
    snapshot: Vec<DependencyState>,
    baseline_digest: String,
}

impl UpgradeOrchestrator {
    pub fn new(
        options: UpgradeOptions,
        registry: Arc<dyn VersionSource>,
        executor: Arc<dyn ScriptExecutor>,
    ) -> Self {
        Self {
            options,
            registry,
            executor,
            observer: None,
        }
    }

    /// Send every phase transition of the run to `observer`.
    pub fn with_observer(mut self, observer: mpsc::UnboundedSender<PhaseTransition>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn options(&self) -> &UpgradeOptions {
        &self.options
    }

    /// Execute one upgrade run.
    ///
    /// Configuration errors are returned before anything is touched. Every
    /// other failure is reported through the returned [`UpgradeResult`].
    pub async fn run(&self) -> EngineResult<UpgradeResult> {
        let pipeline = self.options.validate()?;
        let sync = self.options.sync_config()?;
        let gate = PipelineGate::new(GateRunner::new(self.executor.clone()), pipeline);

        let run_id = Uuid::new_v4().to_string();
        let span = obs::run_span(&run_id);
        self.drive(run_id, &gate, &sync).instrument(span).await
    }

    async fn drive(
        &self,
        run_id: String,
        gate: &PipelineGate,
        sync: &ScriptConfig,
    ) -> EngineResult<UpgradeResult> {
        let started = Instant::now();
        let mut result = UpgradeResult::new();
        let mut phases = PhaseTracker::new(&run_id, self.observer.as_ref());

        phases.fire(PhaseEvent::Start, &mut result)?;

        // Checking
        let (manifest, snapshot, baseline_digest) = match capture(&self.options.working_dir) {
            Ok(captured) => captured,
            Err(e) => {
                error!(error = %e, "Initial state capture failed");
                result.errors.push(e.to_string());
                result.rollback_available = false;
                phases.fire(PhaseEvent::Fatal { rollback: false }, &mut result)?;
                finish(&run_id, started, &result);
                return Ok(result);
            }
        };
        obs::emit_run_started(&run_id, manifest.project_dir(), snapshot.len());
        result.initial_state = Some(snapshot.clone());
        phases.fire(PhaseEvent::SnapshotCaptured, &mut result)?;

        let state = RunState {
            run_id: run_id.clone(),
            manifest,
            snapshot,
            baseline_digest,
        };

        // Fetching
        let sets = self.resolve_candidates(&state, &mut result).await;
        if sets.is_empty() {
            info!("All dependencies are up to date");
            phases.fire(PhaseEvent::NothingToUpgrade, &mut result)?;
            finish(&run_id, started, &result);
            return Ok(result);
        }

        // FastPath
        let fast_path = match &self.options.fast_path {
            FastPathMode::Off => None,
            FastPathMode::Bulk => Some(None),
            FastPathMode::Admin(command) => Some(Some(command)),
        };
        if let Some(admin) = fast_path {
            phases.fire(PhaseEvent::BeginFastPath, &mut result)?;
            let attempt = match admin {
                Some(command) => self.admin_attempt(&state, command, &mut result).await,
                None => self.bulk_attempt(&state, &sets, sync, gate, &mut result).await,
            };
            match attempt {
                Ok(true) => {
                    result.fast_path_succeeded = true;
                    phases.fire(PhaseEvent::FastPathPassed, &mut result)?;
                    finish(&run_id, started, &result);
                    return Ok(result);
                }
                Ok(false) => {
                    info!("Fast path failed, restoring manifest before iterating");
                    phases.fire(PhaseEvent::FastPathFailed, &mut result)?;
                    if !rollback(&state, &mut result) {
                        phases.fire(PhaseEvent::RollbackFailed, &mut result)?;
                        finish(&run_id, started, &result);
                        return Ok(result);
                    }
                    phases.fire(PhaseEvent::RollbackSucceeded, &mut result)?;
                }
                Err(e) => {
                    skip_unfinished(&sets, &e, &mut result);
                    self.abort(&state, &mut phases, e, &mut result)?;
                    finish(&run_id, started, &result);
                    return Ok(result);
                }
            }
        } else {
            phases.fire(PhaseEvent::BeginIteration, &mut result)?;
        }

        // Iterating
        let upgrader = CandidateUpgrader::new(
            &state.manifest,
            self.executor.as_ref(),
            sync,
            gate,
            &state.run_id,
        );
        for (index, (set, backup)) in sets.iter().enumerate() {
            info!(
                package = %set.package_name,
                current = %set.current_version,
                candidates = set.candidates.len(),
                "Upgrading dependency"
            );
            match upgrader.upgrade(set, backup, &mut result.attempts).await {
                Ok(CandidateOutcome::Accepted { version }) => {
                    result.upgraded.push(UpgradedDependency {
                        package_name: set.package_name.clone(),
                        from_version: set.current_version.clone(),
                        to_version: version,
                    });
                }
                Ok(CandidateOutcome::Exhausted) => {
                    result.skip(&set.package_name, EXHAUSTED_REASON);
                }
                Err(e) => {
                    skip_unfinished(&sets[index..], &e, &mut result);
                    self.abort(&state, &mut phases, e, &mut result)?;
                    finish(&run_id, started, &result);
                    return Ok(result);
                }
            }
        }

        phases.fire(PhaseEvent::IterationFinished, &mut result)?;
        finish(&run_id, started, &result);
        Ok(result)
    }

    /// Look up registry versions for every captured dependency, in snapshot order.
    async fn resolve_candidates(
        &self,
        state: &RunState,
        result: &mut UpgradeResult,
    ) -> Vec<(VersionCandidateSet, DependencyState)> {
        if let Some(warning) = detect_custom_registry(state.manifest.project_dir()) {
            warn!("{}", warning);
            result.warnings.push(warning);
        }

        let mut sets = Vec::new();
        for dependency in &state.snapshot {
            let versions = match self.registry.fetch_versions(&dependency.package_name).await {
                Ok(versions) => versions,
                Err(e) => {
                    warn!(package = %dependency.package_name, error = %e, "Version lookup failed");
                    result.warnings.push(format!(
                        "Failed to fetch versions for {}: {}",
                        dependency.package_name, e
                    ));
                    result.skipped.push(SkippedDependency {
                        package_name: dependency.package_name.clone(),
                        reason: REGISTRY_FAILURE_REASON.to_string(),
                    });
                    continue;
                }
            };

            match VersionCandidateSet::resolve(dependency, &versions) {
                Some(set) => sets.push((set, dependency.clone())),
                None => debug!(
                    package = %dependency.package_name,
                    spec = %dependency.version_spec(),
                    "No newer candidates"
                ),
            }
        }
        sets
    }

    /// Apply every newest candidate at once, sync and run the full gate.
    async fn bulk_attempt(
        &self,
        state: &RunState,
        sets: &[(VersionCandidateSet, DependencyState)],
        sync: &ScriptConfig,
        gate: &PipelineGate,
        result: &mut UpgradeResult,
    ) -> EngineResult<bool> {
        let mut applied = Vec::with_capacity(sets.len());
        for (set, backup) in sets {
            let Some(newest) = set.newest() else {
                continue;
            };
            let spec = bump_preserving_sign(&backup.version_spec(), newest)?;
            state
                .manifest
                .apply_candidate(&set.package_name, set.section, &spec)?;
            applied.push((set, newest));
        }
        info!(dependencies = applied.len(), "Trying bulk upgrade");

        let cwd = state.manifest.project_dir();
        let sync_result = run_script(self.executor.as_ref(), sync, cwd).await;
        if !sync_result.success {
            info!(exit_code = sync_result.exit_code, "Bulk lockfile sync failed");
            result.warnings.push(format!(
                "{}: lockfile sync exited with code {}",
                BULK_FAST_PATH_FAILED, sync_result.exit_code
            ));
            return Ok(false);
        }

        let outcome = gate.evaluate(cwd).await;
        obs::emit_gate_evaluated(
            &state.run_id,
            outcome.passed,
            outcome.failed_stage,
            outcome.total_duration_ms(),
        );
        if !outcome.passed {
            let stage = outcome.failed_stage.map_or("unknown", |stage| stage.name());
            let exit_code = outcome.failure().map_or(-1, |failure| failure.exit_code);
            info!(stage = %stage, exit_code, "Bulk upgrade failed the gate");
            result.warnings.push(format!(
                "{}: {} stage exited with code {}",
                BULK_FAST_PATH_FAILED, stage, exit_code
            ));
            return Ok(false);
        }

        for (set, newest) in applied {
            result
                .attempts
                .push(UpgradeAttempt::gated(&set.package_name, newest, &outcome));
            result.upgraded.push(UpgradedDependency {
                package_name: set.package_name.clone(),
                from_version: set.current_version.clone(),
                to_version: newest.to_string(),
            });
        }
        result.warnings.push(BULK_FAST_PATH_NOTE.to_string());
        Ok(true)
    }

    /// Run the caller's admin command against the unchanged manifest.
    async fn admin_attempt(
        &self,
        state: &RunState,
        command: &ScriptConfig,
        result: &mut UpgradeResult,
    ) -> EngineResult<bool> {
        let gate = PipelineGate::admin(GateRunner::new(self.executor.clone()), command.clone());
        let outcome = gate.evaluate(state.manifest.project_dir()).await;
        obs::emit_gate_evaluated(
            &state.run_id,
            outcome.passed,
            outcome.failed_stage,
            outcome.total_duration_ms(),
        );
        if outcome.passed {
            result.warnings.push(ADMIN_FAST_PATH_NOTE.to_string());
        }
        Ok(outcome.passed)
    }

    /// Record a fatal error and, if configured, restore the whole project.
    fn abort(
        &self,
        state: &RunState,
        phases: &mut PhaseTracker<'_>,
        err: EngineError,
        result: &mut UpgradeResult,
    ) -> EngineResult<()> {
        if let EngineError::Phase(_) = err {
            return Err(err);
        }
        error!(error = %err, "Upgrade run aborted");
        result.errors.push(err.to_string());

        if !self.options.rollback_on_failure {
            phases.fire(PhaseEvent::Fatal { rollback: false }, result)?;
            return Ok(());
        }

        phases.fire(PhaseEvent::Fatal { rollback: true }, result)?;
        if rollback(state, result) {
            for reverted in std::mem::take(&mut result.upgraded) {
                result.skip(&reverted.package_name, REVERTED_REASON);
            }
            phases.fire(PhaseEvent::RollbackSucceeded, result)?;
        } else {
            phases.fire(PhaseEvent::RollbackFailed, result)?;
        }
        Ok(())
    }
}

/// Open the manifest, snapshot it and fingerprint its bytes.
fn capture(dir: &Path) -> CoreResult<(ManifestStateManager, Vec<DependencyState>, String)> {
    let manifest = ManifestStateManager::new(dir)
        .map_err(|e| UpgradeError::StateCaptureFailed(e.to_string()))?;
    let snapshot = manifest.capture_initial_state()?;
    let digest = manifest
        .digest()
        .map_err(|e| UpgradeError::StateCaptureFailed(e.to_string()))?;
    Ok((manifest, snapshot, digest))
}

/// Give every dependency the run never finished a skip reason naming the abort.
fn skip_unfinished(
    sets: &[(VersionCandidateSet, DependencyState)],
    err: &EngineError,
    result: &mut UpgradeResult,
) {
    let reason = format!("{}: {}", ABORTED_REASON, err);
    for (set, _) in sets {
        result.skip(&set.package_name, reason.clone());
    }
}

/// Restore the captured snapshot. Returns whether the write succeeded.
fn rollback(state: &RunState, result: &mut UpgradeResult) -> bool {
    match state.manifest.rollback_to_state(&state.snapshot) {
        Ok(()) => {
            result.rollback_performed = true;
            obs::emit_rollback(&state.run_id, state.snapshot.len(), true);
            match state.manifest.digest() {
                Ok(digest) if digest == state.baseline_digest => {}
                Ok(_) => result.warnings.push(
                    "Manifest restored, but its formatting differs from the original file"
                        .to_string(),
                ),
                Err(e) => result
                    .warnings
                    .push(format!("Could not verify restored manifest: {}", e)),
            }
            true
        }
        Err(e) => {
            result.rollback_errors.push(e.to_string());
            result.rollback_available = false;
            obs::emit_rollback(&state.run_id, state.snapshot.len(), false);
            false
        }
    }
}

fn finish(run_id: &str, started: Instant, result: &UpgradeResult) {
    obs::emit_run_finished(
        run_id,
        started.elapsed().as_millis() as u64,
        result.upgraded.len(),
        result.skipped.len(),
        result.errors.is_empty() && !result.rollback_failed(),
    );
}

/// Current phase of a run plus where to report its transitions.
struct PhaseTracker<'a> {
    phase: OrchestratorPhase,
    run_id: &'a str,
    observer: Option<&'a mpsc::UnboundedSender<PhaseTransition>>,
}

impl<'a> PhaseTracker<'a> {
    fn new(run_id: &'a str, observer: Option<&'a mpsc::UnboundedSender<PhaseTransition>>) -> Self {
        Self {
            phase: OrchestratorPhase::Idle,
            run_id,
            observer,
        }
    }

    fn fire(&mut self, event: PhaseEvent, result: &mut UpgradeResult) -> EngineResult<()> {
        let from = self.phase;
        let to = from.on(event)?;
        obs::emit_phase_changed(self.run_id, from, to, event);

        let transition = PhaseTransition {
            from,
            to,
            event,
            at: Utc::now(),
        };
        if let Some(observer) = self.observer {
            if observer.send(transition.clone()).is_err() {
                debug!("Phase observer dropped");
            }
        }
        result.transitions.push(transition);
        self.phase = to;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bumpgate_ci::fakes::ScriptedExecutor;
    use bumpgate_core::fakes::StaticVersionSource;

    fn up_to_date_project() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("package.json"),
            "{\n  \"dependencies\": {\n    \"lodash\": \"^4.17.21\"\n  }\n}\n",
        )
        .unwrap();
        dir
    }

    #[tokio::test]
    async fn test_nothing_to_upgrade_goes_straight_to_done() {
        let dir = up_to_date_project();
        let options = UpgradeOptions::new(dir.path()).with_stages("test", "build", "lint");
        let registry = Arc::new(StaticVersionSource::new().with("lodash", &["4.17.20", "4.17.21"]));
        let executor = Arc::new(ScriptedExecutor::new());

        let result = UpgradeOrchestrator::new(options, registry, executor.clone())
            .run()
            .await
            .unwrap();

        let phases: Vec<_> = result.transitions.iter().map(|t| t.to).collect();
        assert_eq!(
            phases,
            vec![
                OrchestratorPhase::Checking,
                OrchestratorPhase::Fetching,
                OrchestratorPhase::Done
            ]
        );
        assert!(executor.invocations().is_empty());
        assert!(result.upgraded.is_empty());
    }

    #[tokio::test]
    async fn test_missing_stage_is_rejected_before_capture() {
        let dir = up_to_date_project();
        let mut options = UpgradeOptions::new(dir.path()).with_stages("test", "build", "lint");
        options.lint_script = None;
        let executor = Arc::new(ScriptedExecutor::new());

        let registry = Arc::new(StaticVersionSource::new());
        let err = UpgradeOrchestrator::new(options, registry, executor.clone())
            .run()
            .await
            .unwrap_err();

        assert!(matches!(err, EngineError::Upgrade(UpgradeError::ValidationFailed(_))));
        assert!(executor.invocations().is_empty());
    }

    #[tokio::test]
    async fn test_missing_manifest_fails_without_rollback() {
        let dir = tempfile::tempdir().unwrap();
        let options = UpgradeOptions::new(dir.path()).with_stages("test", "build", "lint");

        let result = UpgradeOrchestrator::new(
            options,
            Arc::new(StaticVersionSource::new()),
            Arc::new(ScriptedExecutor::new()),
        )
        .run()
        .await
        .unwrap();

        assert_eq!(result.transitions.last().unwrap().to, OrchestratorPhase::Failed);
        assert!(!result.rollback_performed);
        assert!(!result.rollback_available);
        assert!(result.errors[0].contains("failed to capture initial state"));
        assert!(result.initial_state.is_none());
    }
}
