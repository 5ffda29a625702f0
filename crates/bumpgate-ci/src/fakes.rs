//! In-memory script executor for tests.
//!
//! `ScriptedExecutor` never spawns a process. Each invocation is answered
//! from a per-command queue, then from an optional handler, then with a
//! plain success, and recorded for later inspection.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use bumpgate_core::domain::error::CoreResult;
use bumpgate_core::domain::execution::ExecutionResult;

use crate::runner::ScriptExecutor;
use crate::stage::{PackageManagerKind, ScriptConfig};

type Handler = Box<dyn Fn(&ScriptConfig, &Path) -> ExecutionResult + Send + Sync>;

/// One recorded call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub kind: PackageManagerKind,
    pub command: String,
    pub cwd: PathBuf,
}

#[derive(Default)]
pub struct ScriptedExecutor {
    queued: Mutex<HashMap<String, VecDeque<ExecutionResult>>>,
    handler: Option<Handler>,
    invocations: Mutex<Vec<Invocation>>,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer every unqueued call with `handler`.
    pub fn with_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&ScriptConfig, &Path) -> ExecutionResult + Send + Sync + 'static,
    {
        self.handler = Some(Box::new(handler));
        self
    }

    /// Queue `result` for the next call whose command equals `command`.
    pub fn push(self, command: &str, result: ExecutionResult) -> Self {
        self.queued
            .lock()
            .unwrap()
            .entry(command.to_string())
            .or_default()
            .push_back(result);
        self
    }

    pub fn invocations(&self) -> Vec<Invocation> {
        self.invocations.lock().unwrap().clone()
    }

    /// Number of calls made with exactly `command`.
    pub fn count(&self, command: &str) -> usize {
        self.invocations
            .lock()
            .unwrap()
            .iter()
            .filter(|i| i.command == command)
            .count()
    }
}

/// A zero-exit result.
pub fn ok() -> ExecutionResult {
    ExecutionResult::from_exit(0, String::new(), String::new(), 1)
}

/// A failing result with `stderr`.
pub fn fail(exit_code: i32, stderr: &str) -> ExecutionResult {
    ExecutionResult::from_exit(exit_code, String::new(), stderr.to_string(), 1)
}

#[async_trait]
impl ScriptExecutor for ScriptedExecutor {
    async fn run(&self, config: &ScriptConfig, cwd: &Path) -> CoreResult<ExecutionResult> {
        config.validate()?;

        self.invocations.lock().unwrap().push(Invocation {
            kind: config.kind,
            command: config.command.clone(),
            cwd: cwd.to_path_buf(),
        });

        let queued = self
            .queued
            .lock()
            .unwrap()
            .get_mut(&config.command)
            .and_then(|q| q.pop_front());
        if let Some(result) = queued {
            return Ok(result);
        }
        Ok(match &self.handler {
            Some(handler) => handler(config, cwd),
            None => ok(),
        })
    }
}
