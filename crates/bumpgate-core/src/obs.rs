//! Structured observability hooks for upgrade runs.
//!
//! This module provides:
//! - A run-scoped tracing span via [`run_span`]
//! - Emission functions for run lifecycle events: start, candidate tried,
//!   gate evaluated, peer conflict, rollback, phase change, finish
//!
//! Events are emitted at `info!` level (filterable via `RUST_LOG`).

use std::path::Path;

use tracing::{info, warn};

use crate::domain::execution::GateStage;
use crate::domain::phase::{OrchestratorPhase, PhaseEvent};

/// A span tagged with `run_id`, for use with `Instrument` across awaits.
pub fn run_span(run_id: &str) -> tracing::Span {
    tracing::info_span!("bumpgate.run", run_id = %run_id)
}

/// Emit event: run started against a project.
pub fn emit_run_started(run_id: &str, project_dir: &Path, dependencies: usize) {
    info!(
        event = "run.started",
        run_id = %run_id,
        project_dir = %project_dir.display(),
        dependencies = dependencies,
    );
}

/// Emit event: a candidate version was applied and judged.
pub fn emit_candidate_tried(run_id: &str, package: &str, version: &str, accepted: bool) {
    info!(
        event = "candidate.tried",
        run_id = %run_id,
        package = %package,
        version = %version,
        accepted = accepted,
    );
}

/// Emit event: the gate pipeline finished.
pub fn emit_gate_evaluated(
    run_id: &str,
    passed: bool,
    failed_stage: Option<GateStage>,
    duration_ms: u64,
) {
    info!(
        event = "gate.evaluated",
        run_id = %run_id,
        passed = passed,
        failed_stage = failed_stage.map(|s| s.name()).unwrap_or("none"),
        duration_ms = duration_ms,
    );
}

/// Emit event: a candidate hit a peer-dependency conflict (warning level).
pub fn emit_peer_conflict(run_id: &str, package: &str, version: &str) {
    warn!(
        event = "candidate.peer_conflict",
        run_id = %run_id,
        package = %package,
        version = %version,
    );
}

/// Emit event: a whole-project rollback completed or failed.
pub fn emit_rollback(run_id: &str, target_state_count: usize, success: bool) {
    if success {
        info!(
            event = "rollback.finished",
            run_id = %run_id,
            target_state_count = target_state_count,
            success = true,
        );
    } else {
        warn!(
            event = "rollback.finished",
            run_id = %run_id,
            target_state_count = target_state_count,
            success = false,
        );
    }
}

/// Emit event: the orchestrator changed phase.
pub fn emit_phase_changed(
    run_id: &str,
    from: OrchestratorPhase,
    to: OrchestratorPhase,
    trigger: PhaseEvent,
) {
    info!(
        event = "phase.changed",
        run_id = %run_id,
        from = %from,
        to = %to,
        trigger = ?trigger,
    );
}

/// Emit event: run finished.
pub fn emit_run_finished(
    run_id: &str,
    duration_ms: u64,
    upgraded: usize,
    skipped: usize,
    success: bool,
) {
    info!(
        event = "run.finished",
        run_id = %run_id,
        duration_ms = duration_ms,
        upgraded = upgraded,
        skipped = skipped,
        success = success,
    );
}
