/*!
 * Subprocess runner for the external tool.
 *
 * Each run gets its own temporary working directory, removed on every exit
 * path. Stdin is fed from a separate task while stdout and stderr are drained
 * concurrently, so large outputs never dead-lock on a full pipe.
 *
 * Lifecycle of a child:
 *
 * ```text
 * Running --timeout--> Terminating --grace elapsed--> Killed --> Exited
 *    |                      |
 *    +------exit------------+--------exit-----------------------> Exited
 * ```
 */

use async_trait::async_trait;
use log::{debug, warn};
use std::io::ErrorKind;
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;

use super::{ProcessResult, ToolInvocation, ToolRunner};
use crate::errors::RunnerError;

/// Default delay between the graceful and the forced termination signal
pub const DEFAULT_KILL_GRACE: Duration = Duration::from_secs(5);

/// How long to wait for output pipes to close once the child is gone
const PIPE_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Output beyond this many bytes per stream is discarded
const MAX_STREAM_BYTES: usize = 8 * 1024 * 1024;

/// Placeholder replaced by the per-run working directory
pub const WORKDIR_PLACEHOLDER: &str = "{workdir}";

#[derive(Debug)]
enum ProcessState {
    Running,
    Terminating,
    Killed,
    Exited(ExitStatus),
}

/// Runs the external tool as a child process
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    kill_grace: Duration,
}

impl ProcessRunner {
    pub fn new(kill_grace: Duration) -> Self {
        Self { kill_grace }
    }

    /// Drive the child through the lifecycle until it has exited and been reaped
    async fn supervise(
        &self,
        child: &mut Child,
        invocation: &ToolInvocation,
        deadline: tokio::time::Instant,
    ) -> Result<(ExitStatus, bool), RunnerError> {
        let mut state = ProcessState::Running;
        let mut timed_out = false;

        loop {
            state = match state {
                ProcessState::Running => {
                    match tokio::time::timeout_at(deadline, child.wait()).await {
                        Ok(status) => ProcessState::Exited(status.map_err(|e| io_error(invocation, e))?),
                        Err(_) => {
                            timed_out = true;
                            warn!(
                                "`{}` exceeded {:?}, sending termination signal",
                                invocation.program, invocation.timeout
                            );
                            send_terminate(child).await;
                            ProcessState::Terminating
                        }
                    }
                }
                ProcessState::Terminating => {
                    match tokio::time::timeout(self.kill_grace, child.wait()).await {
                        Ok(status) => ProcessState::Exited(status.map_err(|e| io_error(invocation, e))?),
                        Err(_) => {
                            warn!(
                                "`{}` still running {:?} after termination signal, killing",
                                invocation.program, self.kill_grace
                            );
                            if let Err(e) = child.start_kill() {
                                debug!("Kill signal failed: {}", e);
                            }
                            ProcessState::Killed
                        }
                    }
                }
                ProcessState::Killed => {
                    ProcessState::Exited(child.wait().await.map_err(|e| io_error(invocation, e))?)
                }
                ProcessState::Exited(status) => return Ok((status, timed_out)),
            };
        }
    }
}

impl Default for ProcessRunner {
    fn default() -> Self {
        Self::new(DEFAULT_KILL_GRACE)
    }
}

#[async_trait]
impl ToolRunner for ProcessRunner {
    async fn run(&self, invocation: ToolInvocation) -> Result<ProcessResult, RunnerError> {
        // Dropping the guard removes the directory, whichever way we leave
        let workdir = tempfile::Builder::new()
            .prefix("fragtrans-")
            .tempdir()
            .map_err(|e| RunnerError::WorkDir(e.to_string()))?;
        let workdir_path = workdir.path().to_string_lossy().to_string();

        let args: Vec<String> = invocation
            .args
            .iter()
            .map(|arg| arg.replace(WORKDIR_PLACEHOLDER, &workdir_path))
            .collect();

        let mut command = Command::new(&invocation.program);
        command
            .args(&args)
            .current_dir(workdir.path())
            .stdin(if invocation.stdin.is_some() { Stdio::piped() } else { Stdio::null() })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let started = Instant::now();
        let deadline = tokio::time::Instant::now() + invocation.timeout;
        let mut child = command.spawn().map_err(|e| spawn_error(&invocation.program, e))?;
        let pid = child.id();
        debug!(
            "Spawned {:?} `{}` (pid {:?}) in {}",
            invocation.kind,
            invocation.program,
            pid,
            workdir_path
        );

        let writer = match (invocation.stdin.clone(), child.stdin.take()) {
            (Some(input), Some(mut stdin)) => Some(tokio::spawn(async move {
                if let Err(e) = stdin.write_all(input.as_bytes()).await {
                    // The child may exit without reading its input
                    debug!("Writing stdin failed: {}", e);
                }
                let _ = stdin.shutdown().await;
            })),
            _ => None,
        };
        let stdout_reader = spawn_reader(child.stdout.take());
        let stderr_reader = spawn_reader(child.stderr.take());

        let (status, timed_out) = self.supervise(&mut child, &invocation, deadline).await?;

        if let Some(writer) = writer {
            writer.abort();
        }
        let stdout_text = collect_output(stdout_reader).await;
        let stderr_text = collect_output(stderr_reader).await;
        let duration = started.elapsed();

        debug!(
            "`{}` finished in {:?} (status {:?}, timed out: {})",
            invocation.program, duration, status, timed_out
        );

        if let Err(e) = workdir.close() {
            warn!("Failed to remove working directory {}: {}", workdir_path, e);
        }

        Ok(ProcessResult {
            exit_code: status.code(),
            stdout_text,
            stderr_text,
            timed_out,
            duration,
            pid,
        })
    }
}

/// Ask the child to stop; falls back to a forced kill where signals are unavailable
async fn send_terminate(child: &mut Child) {
    #[cfg(unix)]
    {
        if let Some(pid) = child.id() {
            let sent = Command::new("kill")
                .args(["-TERM", &pid.to_string()])
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .await;
            match sent {
                Ok(status) if status.success() => return,
                Ok(status) => debug!("kill -TERM {} returned {}", pid, status),
                Err(e) => debug!("kill -TERM {} failed: {}", pid, e),
            }
        }
    }

    if let Err(e) = child.start_kill() {
        debug!("Kill signal failed: {}", e);
    }
}

fn spawn_reader<R>(handle: Option<R>) -> JoinHandle<Vec<u8>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut collected = Vec::new();
        let Some(mut handle) = handle else {
            return collected;
        };
        let mut chunk = [0u8; 8192];
        loop {
            match handle.read(&mut chunk).await {
                Ok(0) => break,
                Ok(n) => {
                    let room = MAX_STREAM_BYTES.saturating_sub(collected.len());
                    collected.extend_from_slice(&chunk[..n.min(room)]);
                }
                Err(e) => {
                    debug!("Reading child output failed: {}", e);
                    break;
                }
            }
        }
        collected
    })
}

/// Wait briefly for a reader; a grandchild may still hold the pipe open
async fn collect_output(mut reader: JoinHandle<Vec<u8>>) -> String {
    match tokio::time::timeout(PIPE_DRAIN_TIMEOUT, &mut reader).await {
        Ok(Ok(bytes)) => String::from_utf8_lossy(&bytes).into_owned(),
        Ok(Err(e)) => {
            debug!("Output reader failed: {}", e);
            String::new()
        }
        Err(_) => {
            warn!("Output pipe still open {:?} after exit, abandoning it", PIPE_DRAIN_TIMEOUT);
            reader.abort();
            String::new()
        }
    }
}

fn spawn_error(program: &str, error: std::io::Error) -> RunnerError {
    if error.kind() == ErrorKind::NotFound {
        RunnerError::NotFound { program: program.to_string() }
    } else {
        RunnerError::Spawn {
            program: program.to_string(),
            message: error.to_string(),
        }
    }
}

fn io_error(invocation: &ToolInvocation, error: std::io::Error) -> RunnerError {
    RunnerError::Io {
        program: invocation.program.clone(),
        message: error.to_string(),
    }
}
