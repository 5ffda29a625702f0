//! The acceptance gate capability.
//!
//! The engine decides whether a manifest state is acceptable by asking a
//! [`Gate`]. [`PipelineGate`] is the script-backed implementation: a
//! [`GatePipeline`] bound to the runner that executes it.

use std::path::Path;

use async_trait::async_trait;
use bumpgate_core::domain::execution::{GateOutcome, GateStage};

use crate::pipeline::{GatePipeline, GateRunner};
use crate::stage::ScriptConfig;

/// Judges the project in `cwd` as it currently stands on disk.
#[async_trait]
pub trait Gate: Send + Sync {
    async fn evaluate(&self, cwd: &Path) -> GateOutcome;
}

/// A gate pipeline executed by a [`GateRunner`].
pub struct PipelineGate {
    runner: GateRunner,
    pipeline: GatePipeline,
}

impl PipelineGate {
    pub fn new(runner: GateRunner, pipeline: GatePipeline) -> Self {
        Self { runner, pipeline }
    }

    /// A gate consisting of one caller-supplied command.
    pub fn admin(runner: GateRunner, command: ScriptConfig) -> Self {
        Self::new(runner, GatePipeline::single(GateStage::Admin, command))
    }

    pub fn pipeline(&self) -> &GatePipeline {
        &self.pipeline
    }
}

#[async_trait]
impl Gate for PipelineGate {
    async fn evaluate(&self, cwd: &Path) -> GateOutcome {
        self.runner.run_gate(&self.pipeline, cwd).await
    }
}
