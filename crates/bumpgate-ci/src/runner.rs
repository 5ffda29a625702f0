//! Bounded external command execution.
//!
//! [`ScriptRunner::run`] never fails once a config has validated: non-zero
//! exits, timeouts and spawn errors all come back as an [`ExecutionResult`].

use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bumpgate_core::domain::error::CoreResult;
use bumpgate_core::domain::execution::{
    ExecutionResult, NOT_FOUND_EXIT_CODE, SPAWN_FAILURE_EXIT_CODE,
};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::command::{CommandAdapter, CommandLine};
use crate::stage::{PackageManagerKind, ScriptConfig};

/// Default cap on captured bytes per stream.
pub const DEFAULT_MAX_OUTPUT_BYTES: usize = 1024 * 1024;

/// Timeout for `<pm> --version` probes.
const PROBE_TIMEOUT_MS: u64 = 5_000;

/// How long to wait for output readers after a timed-out child is killed.
const READER_GRACE: Duration = Duration::from_millis(500);

/// Executes scripts on behalf of the gate and the upgrader.
#[async_trait]
pub trait ScriptExecutor: Send + Sync {
    /// Run `config` rooted at `cwd`.
    ///
    /// Only an invalid config is an error; every execution outcome is `Ok`.
    async fn run(&self, config: &ScriptConfig, cwd: &Path) -> CoreResult<ExecutionResult>;
}

/// Process-backed [`ScriptExecutor`].
#[derive(Debug, Clone)]
pub struct ScriptRunner {
    max_output_bytes: usize,
}

impl Default for ScriptRunner {
    fn default() -> Self {
        Self {
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
        }
    }
}

impl ScriptRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_output_bytes(mut self, max_output_bytes: usize) -> Self {
        self.max_output_bytes = max_output_bytes;
        self
    }

    /// Spawn `line` in `cwd` and wait at most `timeout_ms` for it.
    pub async fn execute(
        &self,
        line: &CommandLine,
        cwd: &Path,
        timeout_ms: u64,
    ) -> ExecutionResult {
        let start = Instant::now();

        let mut command = Command::new(&line.program);
        command
            .args(&line.args)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        command.process_group(0);

        debug!(command = %line, cwd = %cwd.display(), timeout_ms, "spawning script");

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                let exit_code = if e.kind() == std::io::ErrorKind::NotFound {
                    NOT_FOUND_EXIT_CODE
                } else {
                    SPAWN_FAILURE_EXIT_CODE
                };
                warn!(command = %line, error = %e, exit_code, "failed to spawn script");
                let message = format!("failed to spawn {}: {}", line, e);
                let mut result = ExecutionResult::spawn_failed(exit_code, message);
                result.duration_ms = elapsed_ms(start);
                return result;
            }
        };

        let pid = child.id();
        let stdout_reader = child
            .stdout
            .take()
            .map(|s| tokio::spawn(read_capped(s, self.max_output_bytes)));
        let stderr_reader = child
            .stderr
            .take()
            .map(|s| tokio::spawn(read_capped(s, self.max_output_bytes)));

        match tokio::time::timeout(Duration::from_millis(timeout_ms), child.wait()).await {
            Ok(Ok(status)) => {
                // Descendants may still hold the pipes open; bound the wait by what is left.
                let remaining = Duration::from_millis(timeout_ms)
                    .saturating_sub(start.elapsed())
                    .max(READER_GRACE);
                let stdout = collect(stdout_reader, remaining).await;
                let stderr = collect(stderr_reader, remaining).await;
                if stdout.is_none() || stderr.is_none() {
                    warn!(command = %line, "script exited but left descendants holding its output");
                    if let Some(pid) = pid {
                        kill_process_group(pid).await;
                    }
                }
                let stdout = stdout.unwrap_or_default();
                let stderr = stderr.unwrap_or_default();
                let exit_code = exit_code_of(status);
                let duration_ms = elapsed_ms(start);
                debug!(command = %line, exit_code, duration_ms, "script exited");
                ExecutionResult::from_exit(exit_code, stdout, stderr, duration_ms)
            }
            Ok(Err(e)) => {
                kill_tree(&mut child).await;
                let stdout = collect(stdout_reader, READER_GRACE).await.unwrap_or_default();
                warn!(command = %line, error = %e, "failed waiting for script");
                ExecutionResult::from_exit(
                    SPAWN_FAILURE_EXIT_CODE,
                    stdout,
                    format!("failed waiting for {}: {}", line, e),
                    elapsed_ms(start),
                )
            }
            Err(_) => {
                kill_tree(&mut child).await;
                let duration_ms = elapsed_ms(start);
                let stdout = collect(stdout_reader, READER_GRACE).await.unwrap_or_default();
                // Whatever stderr the child wrote is replaced by the timeout message.
                collect(stderr_reader, READER_GRACE).await;
                warn!(command = %line, timeout_ms, "script timed out and was killed");
                ExecutionResult::timed_out(timeout_ms, stdout, duration_ms)
            }
        }
    }

    /// The package manager's `--version` output, or `None` if it is unavailable.
    pub async fn probe_package_manager(&self, kind: PackageManagerKind) -> Option<String> {
        if kind == PackageManagerKind::Shell {
            return Some("builtin".to_string());
        }

        let line = CommandLine {
            program: kind.executable().to_string(),
            args: vec!["--version".to_string()],
        };
        let cwd = std::env::current_dir().ok()?;
        let result = self.execute(&line, &cwd, PROBE_TIMEOUT_MS).await;
        if result.success {
            Some(result.stdout.trim().to_string())
        } else {
            debug!(
                package_manager = %kind,
                exit_code = result.exit_code,
                "package manager probe failed"
            );
            None
        }
    }
}

#[async_trait]
impl ScriptExecutor for ScriptRunner {
    async fn run(&self, config: &ScriptConfig, cwd: &Path) -> CoreResult<ExecutionResult> {
        let line = CommandAdapter::from_script(config)?;
        Ok(self.execute(&line, cwd, config.timeout_ms).await)
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

#[cfg(unix)]
fn exit_code_of(status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    status
        .code()
        .or_else(|| status.signal().map(|sig| 128 + sig))
        .unwrap_or(SPAWN_FAILURE_EXIT_CODE)
}

#[cfg(not(unix))]
fn exit_code_of(status: ExitStatus) -> i32 {
    status.code().unwrap_or(SPAWN_FAILURE_EXIT_CODE)
}

/// Kill the child and, on unix, its whole process group, then reap it.
async fn kill_tree(child: &mut Child) {
    if let Some(pid) = child.id() {
        kill_process_group(pid).await;
    }
    let _ = child.start_kill();
    let _ = child.wait().await;
}

/// The child leads its own group, so `-pid` addresses every descendant.
#[cfg(unix)]
async fn kill_process_group(pid: u32) {
    let status = Command::new("kill")
        .args(["-s", "KILL", "--", &format!("-{}", pid)])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await;
    if let Err(e) = status {
        debug!(pid, error = %e, "process group kill failed");
    }
}

#[cfg(not(unix))]
async fn kill_process_group(_pid: u32) {}

/// Read a stream to the end, keeping at most `cap` bytes.
///
/// Reading continues past the cap so the child never blocks on a full pipe.
async fn read_capped<R>(mut stream: R, cap: usize) -> String
where
    R: AsyncRead + Unpin,
{
    let mut kept = Vec::new();
    let mut truncated = false;
    let mut buf = [0u8; 8192];
    loop {
        match stream.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                let room = cap.saturating_sub(kept.len());
                if n > room {
                    truncated = true;
                }
                kept.extend_from_slice(&buf[..n.min(room)]);
            }
        }
    }

    let mut out = String::from_utf8_lossy(&kept).into_owned();
    if truncated {
        out.push_str(&format!("\n\n[Output truncated - exceeded {} bytes]", cap));
    }
    out
}

/// Join an output reader, giving up (and aborting it) after `grace`.
async fn collect(reader: Option<JoinHandle<String>>, grace: Duration) -> Option<String> {
    let Some(handle) = reader else {
        return Some(String::new());
    };
    let abort = handle.abort_handle();
    match tokio::time::timeout(grace, handle).await {
        Ok(joined) => Some(joined.unwrap_or_default()),
        Err(_) => {
            abort.abort();
            None
        }
    }
}
