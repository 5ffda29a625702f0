//! bumpgate CI - script execution and the acceptance gate
//!
//! Provides the pieces the engine uses to judge a manifest state:
//! - Package-manager command construction (npm, yarn, pnpm, bun, shell)
//! - A script runner with timeouts, process-group kill and output caps
//! - The install → test → build → lint gate pipeline

pub mod command;
pub mod fakes;
pub mod gate;
pub mod pipeline;
pub mod runner;
pub mod stage;

// Re-export key types
pub use command::{CommandAdapter, CommandLine, Verb};
pub use gate::{Gate, PipelineGate};
pub use pipeline::{GatePipeline, GateRunner};
pub use runner::{ScriptExecutor, ScriptRunner, DEFAULT_MAX_OUTPUT_BYTES};
pub use stage::{PackageManagerKind, ScriptConfig};
