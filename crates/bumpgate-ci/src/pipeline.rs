//! Ordered gate pipeline execution.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use bumpgate_core::domain::error::{CoreResult, UpgradeError};
use bumpgate_core::domain::execution::{
    ExecutionResult, GateOutcome, GateStage, SPAWN_FAILURE_EXIT_CODE,
};
use tracing::{info, warn};

use crate::runner::ScriptExecutor;
use crate::stage::ScriptConfig;

/// Stages of one gate, in execution order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatePipeline {
    stages: Vec<(GateStage, ScriptConfig)>,
}

impl GatePipeline {
    /// install? → test → build → lint.
    pub fn new(
        install: Option<ScriptConfig>,
        test: ScriptConfig,
        build: ScriptConfig,
        lint: ScriptConfig,
    ) -> Self {
        let mut stages = Vec::with_capacity(4);
        if let Some(install) = install {
            stages.push((GateStage::Install, install));
        }
        stages.push((GateStage::Test, test));
        stages.push((GateStage::Build, build));
        stages.push((GateStage::Lint, lint));
        Self { stages }
    }

    /// Build from optional stage configs; test, build and lint are required.
    pub fn from_parts(
        install: Option<ScriptConfig>,
        test: Option<ScriptConfig>,
        build: Option<ScriptConfig>,
        lint: Option<ScriptConfig>,
    ) -> CoreResult<Self> {
        let required = |config: Option<ScriptConfig>, stage: GateStage| {
            config.ok_or_else(|| {
                UpgradeError::ValidationFailed(format!(
                    "{} script is required but missing",
                    stage
                ))
            })
        };
        let pipeline = Self::new(
            install,
            required(test, GateStage::Test)?,
            required(build, GateStage::Build)?,
            required(lint, GateStage::Lint)?,
        );
        pipeline.validate()?;
        Ok(pipeline)
    }

    /// A one-stage pipeline, e.g. the admin fast-path command.
    pub fn single(stage: GateStage, config: ScriptConfig) -> Self {
        Self {
            stages: vec![(stage, config)],
        }
    }

    pub fn stages(&self) -> &[(GateStage, ScriptConfig)] {
        &self.stages
    }

    /// Validate every stage config.
    pub fn validate(&self) -> CoreResult<()> {
        for (stage, config) in &self.stages {
            config.validate().map_err(|e| match e {
                UpgradeError::ValidationFailed(msg) => {
                    UpgradeError::ValidationFailed(format!("{} stage: {}", stage, msg))
                }
                other => other,
            })?;
        }
        Ok(())
    }
}

/// Runs a [`GatePipeline`] through a [`ScriptExecutor`].
#[derive(Clone)]
pub struct GateRunner {
    executor: Arc<dyn ScriptExecutor>,
}

impl GateRunner {
    pub fn new(executor: Arc<dyn ScriptExecutor>) -> Self {
        Self { executor }
    }

    pub fn executor(&self) -> &Arc<dyn ScriptExecutor> {
        &self.executor
    }

    /// Execute the stages in order, stopping at the first failure.
    ///
    /// Stages after the failing one are never started.
    pub async fn run_gate(&self, pipeline: &GatePipeline, cwd: &Path) -> GateOutcome {
        let start = Instant::now();
        let mut results = Vec::with_capacity(pipeline.stages().len());

        for (stage, config) in pipeline.stages() {
            info!(stage = %stage, command = %config.command, "Executing gate stage");

            let result = match self.executor.run(config, cwd).await {
                Ok(result) => result,
                Err(e) => {
                    warn!(stage = %stage, error = %e, "gate stage rejected before spawn");
                    ExecutionResult::spawn_failed(SPAWN_FAILURE_EXIT_CODE, e.to_string())
                }
            };
            let passed = result.success;
            results.push((*stage, result));

            if !passed {
                info!(
                    stage = %stage,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Gate failed"
                );
                return GateOutcome {
                    passed: false,
                    failed_stage: Some(*stage),
                    results,
                };
            }
        }

        info!(
            stages = results.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Gate passed"
        );
        GateOutcome {
            passed: true,
            failed_stage: None,
            results,
        }
    }
}
