/*!
 * Access to the external command-line translation tool.
 *
 * - `process`: the real subprocess runner with timeout and escalating termination
 * - `health`: cached installation / login probes
 * - `mock`: scripted runner for tests
 */

use async_trait::async_trait;
use std::fmt::Debug;
use std::time::Duration;

use crate::errors::RunnerError;

/// What an invocation is for; lets runners and logs tell probes from work
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationKind {
    /// Installation probe (version query)
    Version,
    /// Authentication probe (login status query)
    LoginStatus,
    /// A batch translation run
    Translate,
}

/// A single run of the external tool
#[derive(Debug, Clone)]
pub struct ToolInvocation {
    pub kind: InvocationKind,
    pub program: String,
    /// Arguments; `{workdir}` is replaced with the per-run scratch directory
    pub args: Vec<String>,
    /// Written to the child's stdin, which is then closed
    pub stdin: Option<String>,
    pub timeout: Duration,
}

impl ToolInvocation {
    pub fn new(kind: InvocationKind, program: &str, args: &[String], timeout: Duration) -> Self {
        Self {
            kind,
            program: program.to_string(),
            args: args.to_vec(),
            stdin: None,
            timeout,
        }
    }

    pub fn with_stdin(mut self, input: String) -> Self {
        self.stdin = Some(input);
        self
    }

    /// `program arg1 arg2`, for messages
    pub fn display_command(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Outcome of a run that was started successfully
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProcessResult {
    /// Exit code; `None` when the process was ended by a signal
    pub exit_code: Option<i32>,
    pub stdout_text: String,
    pub stderr_text: String,
    /// The run hit its timeout and was terminated
    pub timed_out: bool,
    pub duration: Duration,
    pub pid: Option<u32>,
}

impl ProcessResult {
    /// Finished on its own with exit code 0
    pub fn success(&self) -> bool {
        !self.timed_out && self.exit_code == Some(0)
    }

    /// Human readable exit description
    pub fn exit_description(&self) -> String {
        match (self.timed_out, self.exit_code) {
            (true, _) => "timed out".to_string(),
            (false, Some(code)) => format!("exit code {}", code),
            (false, None) => "terminated by signal".to_string(),
        }
    }
}

/// Common trait for everything that can run the external tool
///
/// The orchestrator and the health monitor only talk to the tool through this
/// trait, so tests can substitute a scripted runner.
#[async_trait]
pub trait ToolRunner: Send + Sync + Debug {
    /// Run the invocation to completion (or timeout)
    ///
    /// # Returns
    /// * `Ok(ProcessResult)` - The process ran; inspect exit code and `timed_out`
    /// * `Err(RunnerError)` - The process could not be started or observed
    async fn run(&self, invocation: ToolInvocation) -> Result<ProcessResult, RunnerError>;
}

pub mod health;
pub mod mock;
pub mod process;

pub use health::{HealthMonitor, HealthSnapshot};
pub use mock::{MockReply, MockRunner};
pub use process::ProcessRunner;
