//! Observability tests for upgrade run lifecycle tracing.

use std::path::Path;

use bumpgate_core::{
    emit_candidate_tried, emit_gate_evaluated, emit_peer_conflict, emit_phase_changed,
    emit_rollback, emit_run_finished, emit_run_started, run_span, GateStage, OrchestratorPhase,
    PhaseEvent,
};
use tracing_test::traced_test;

#[traced_test]
#[test]
fn test_emit_run_started_logs_project_and_count() {
    emit_run_started("run-123", Path::new("/work/app"), 7);
    assert!(logs_contain("run.started"));
    assert!(logs_contain("/work/app"));
}

#[traced_test]
#[test]
fn test_emit_candidate_tried_logs_package_and_version() {
    emit_candidate_tried("run-123", "lodash", "4.17.21", true);
    assert!(logs_contain("candidate.tried"));
    assert!(logs_contain("4.17.21"));
}

#[traced_test]
#[test]
fn test_emit_gate_evaluated_logs_failed_stage() {
    emit_gate_evaluated("run-gate-001", false, Some(GateStage::Test), 1200);
    assert!(logs_contain("gate.evaluated"));
    assert!(logs_contain("failed_stage=\"test\""));
}

#[traced_test]
#[test]
fn test_emit_peer_conflict_is_warning() {
    emit_peer_conflict("run-456", "react-dom", "19.0.0");
    assert!(logs_contain("WARN"));
    assert!(logs_contain("candidate.peer_conflict"));
}

#[traced_test]
#[test]
fn test_emit_rollback_failure_is_warning() {
    emit_rollback("run-789", 3, false);
    assert!(logs_contain("WARN"));
    assert!(logs_contain("rollback.finished"));
}

#[traced_test]
#[test]
fn test_emit_phase_changed_logs_both_phases() {
    emit_phase_changed(
        "run-789",
        OrchestratorPhase::Fetching,
        OrchestratorPhase::Iterating,
        PhaseEvent::BeginIteration,
    );
    assert!(logs_contain("from=fetching"));
    assert!(logs_contain("to=iterating"));
}

#[traced_test]
#[test]
fn test_emit_run_finished_logs_counts() {
    emit_run_finished("run-456", 5000, 2, 1, true);
    assert!(logs_contain("run.finished"));
}

#[traced_test]
#[test]
fn test_run_span_tags_events() {
    let span = run_span("span-run-42").entered();
    emit_candidate_tried("span-run-42", "zod", "3.23.8", false);
    drop(span);
    assert!(logs_contain("span-run-42"));
}
