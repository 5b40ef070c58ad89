/*!
 * Mock tool runner for testing.
 *
 * This module provides a scripted runner that simulates the external tool:
 * - `MockRunner::working()` - installed, logged in, translates every item
 * - `MockRunner::logged_out()` - installed but not authenticated
 * - `MockRunner::not_installed()` - the program cannot be found
 *
 * Translation runs can be scripted with `push_reply`; once the script is
 * exhausted the runner falls back to echoing a translation per prompt item.
 */

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use super::{InvocationKind, ProcessResult, ToolInvocation, ToolRunner};
use crate::errors::RunnerError;

/// Marker the prompt builder places before the items JSON
const INPUT_HEADER: &str = "## Input\n";

/// A scripted answer to one translation run
#[derive(Debug, Clone)]
pub enum MockReply {
    /// Exit 0 with the given stdout
    Stdout(String),
    /// Arbitrary exit code and streams
    Exit { code: i32, stdout: String, stderr: String },
    /// The run hit its timeout
    Timeout,
    /// The program could not be started
    SpawnFailure,
    /// Sleep before answering with the inner reply
    Delayed { delay_ms: u64, reply: Box<MockReply> },
}

/// Behavior mode for the probes
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MockAvailability {
    Ready,
    LoggedOut,
    NotInstalled,
}

/// Scripted runner standing in for the external tool
#[derive(Debug)]
pub struct MockRunner {
    availability: MockAvailability,
    replies: Mutex<VecDeque<MockReply>>,
    translate_calls: AtomicUsize,
    probe_calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
    translate_args: Mutex<Vec<Vec<String>>>,
    translation_prefix: String,
}

impl MockRunner {
    /// Create a new mock runner with the specified availability
    pub fn new(availability: MockAvailability) -> Self {
        Self {
            availability,
            replies: Mutex::new(VecDeque::new()),
            translate_calls: AtomicUsize::new(0),
            probe_calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
            translate_args: Mutex::new(Vec::new()),
            translation_prefix: "[TRANSLATED] ".to_string(),
        }
    }

    /// Installed, logged in, echoes translations
    pub fn working() -> Self {
        Self::new(MockAvailability::Ready)
    }

    /// Installed but not authenticated
    pub fn logged_out() -> Self {
        Self::new(MockAvailability::LoggedOut)
    }

    /// Program missing
    pub fn not_installed() -> Self {
        Self::new(MockAvailability::NotInstalled)
    }

    /// Queue a reply for the next translation run
    pub fn push_reply(&self, reply: MockReply) {
        self.replies.lock().push_back(reply);
    }

    /// Builder form of `push_reply`
    pub fn with_reply(self, reply: MockReply) -> Self {
        self.push_reply(reply);
        self
    }

    /// Number of translation runs so far
    pub fn translate_calls(&self) -> usize {
        self.translate_calls.load(Ordering::SeqCst)
    }

    /// Number of probe runs (version and login status) so far
    pub fn probe_calls(&self) -> usize {
        self.probe_calls.load(Ordering::SeqCst)
    }

    /// Prompts received by translation runs, in order
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }

    /// Argument lists of translation runs, in order
    pub fn translate_args(&self) -> Vec<Vec<String>> {
        self.translate_args.lock().clone()
    }

    /// Build the JSON a well-behaved tool would print for `prompt`
    pub fn echo_translation(&self, prompt: &str) -> String {
        let items = prompt
            .find(INPUT_HEADER)
            .and_then(|start| serde_json::from_str::<Value>(&prompt[start + INPUT_HEADER.len()..]).ok())
            .and_then(|value| value.get("items").and_then(Value::as_array).cloned())
            .unwrap_or_default();

        let results: Vec<Value> = items
            .iter()
            .map(|item| {
                json!({
                    "id": item.get("id").cloned().unwrap_or(Value::Null),
                    "translatedText": format!(
                        "{}{}",
                        self.translation_prefix,
                        item.get("text").and_then(Value::as_str).unwrap_or_default()
                    ),
                })
            })
            .collect();

        json!({ "results": results }).to_string()
    }

    fn probe(&self, kind: InvocationKind) -> Result<ProcessResult, RunnerError> {
        self.probe_calls.fetch_add(1, Ordering::SeqCst);
        match (self.availability, kind) {
            (MockAvailability::NotInstalled, _) => Err(RunnerError::NotFound { program: "mock".into() }),
            (_, InvocationKind::Version) => Ok(exit(0, "mock-tool 1.0.0\n", "")),
            (MockAvailability::LoggedOut, _) => Ok(exit(1, "", "Not logged in\n")),
            _ => Ok(exit(0, "Logged in using ChatGPT\n", "")),
        }
    }

    async fn answer(&self, reply: MockReply, prompt: &str) -> Result<ProcessResult, RunnerError> {
        let mut reply = reply;
        while let MockReply::Delayed { delay_ms, reply: inner } = reply {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            reply = *inner;
        }

        match reply {
            MockReply::Stdout(stdout) => Ok(exit(0, &stdout, "")),
            MockReply::Exit { code, stdout, stderr } => Ok(exit(code, &stdout, &stderr)),
            MockReply::Timeout => Ok(ProcessResult {
                exit_code: None,
                timed_out: true,
                ..ProcessResult::default()
            }),
            MockReply::SpawnFailure => Err(RunnerError::Spawn {
                program: "mock".into(),
                message: "permission denied".into(),
            }),
            MockReply::Delayed { .. } => Ok(exit(0, &self.echo_translation(prompt), "")),
        }
    }
}

impl Default for MockRunner {
    fn default() -> Self {
        Self::working()
    }
}

fn exit(code: i32, stdout: &str, stderr: &str) -> ProcessResult {
    ProcessResult {
        exit_code: Some(code),
        stdout_text: stdout.to_string(),
        stderr_text: stderr.to_string(),
        timed_out: false,
        duration: Duration::from_millis(1),
        pid: None,
    }
}

#[async_trait]
impl ToolRunner for MockRunner {
    async fn run(&self, invocation: ToolInvocation) -> Result<ProcessResult, RunnerError> {
        if invocation.kind != InvocationKind::Translate {
            return self.probe(invocation.kind);
        }

        self.translate_calls.fetch_add(1, Ordering::SeqCst);
        let prompt = invocation.stdin.unwrap_or_default();
        self.prompts.lock().push(prompt.clone());
        self.translate_args.lock().push(invocation.args.clone());

        let scripted = self.replies.lock().pop_front();
        match scripted {
            Some(reply) => self.answer(reply, &prompt).await,
            None => Ok(exit(0, &self.echo_translation(&prompt), "")),
        }
    }
}
