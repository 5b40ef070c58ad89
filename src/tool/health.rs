/*!
 * Health monitoring of the external tool.
 *
 * Two independent probes are run through the tool runner: a version query
 * (is the tool installed?) and a login status query (is it authenticated?).
 * The combined snapshot is reused for a short TTL so that bursts of requests
 * do not each spawn probe processes.
 */

use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use super::{InvocationKind, ProcessResult, ToolInvocation, ToolRunner};
use crate::app_config::ToolConfig;
use crate::errors::{tail_excerpt, RunnerError};

/// Snapshots younger than this are reused
pub const DEFAULT_HEALTH_TTL: Duration = Duration::from_secs(10);

const PROBE_EXCERPT_CHARS: usize = 200;

/// Whether the external tool is usable right now
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthSnapshot {
    pub ok: bool,
    pub installed: bool,
    #[serde(rename = "loggedIn")]
    pub logged_in: bool,
    pub message: String,
    #[serde(rename = "capturedAt")]
    pub captured_at: DateTime<Utc>,
}

impl HealthSnapshot {
    pub fn new(installed: bool, logged_in: bool, message: String) -> Self {
        Self {
            ok: installed && logged_in,
            installed,
            logged_in,
            message,
            captured_at: Utc::now(),
        }
    }
}

struct CachedSnapshot {
    taken: Instant,
    snapshot: HealthSnapshot,
}

/// Probes the tool and caches the result for a TTL
#[derive(Debug)]
pub struct HealthMonitor {
    runner: Arc<dyn ToolRunner>,
    tool: ToolConfig,
    ttl: Duration,
    cached: Mutex<Option<CachedSnapshot>>,
}

impl std::fmt::Debug for CachedSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedSnapshot")
            .field("age", &self.taken.elapsed())
            .field("ok", &self.snapshot.ok)
            .finish()
    }
}

impl HealthMonitor {
    pub fn new(runner: Arc<dyn ToolRunner>, tool: ToolConfig, ttl: Duration) -> Self {
        Self {
            runner,
            tool,
            ttl,
            cached: Mutex::new(None),
        }
    }

    /// Current snapshot; probes only when the cached one is stale or `force` is set
    ///
    /// The lock is held across the probe so concurrent callers share one refresh.
    pub async fn snapshot(&self, force: bool) -> HealthSnapshot {
        let mut cached = self.cached.lock().await;

        if !force {
            if let Some(entry) = cached.as_ref() {
                if entry.taken.elapsed() < self.ttl {
                    debug!("Reusing health snapshot from {:?} ago", entry.taken.elapsed());
                    return entry.snapshot.clone();
                }
            }
        }

        let snapshot = self.probe().await;
        *cached = Some(CachedSnapshot {
            taken: Instant::now(),
            snapshot: snapshot.clone(),
        });
        snapshot
    }

    /// Run both probes now, bypassing the cache
    pub async fn probe(&self) -> HealthSnapshot {
        let timeout = self.tool.probe_timeout();
        let version = ToolInvocation::new(InvocationKind::Version, &self.tool.program, &self.tool.version_args, timeout);
        let status = ToolInvocation::new(InvocationKind::LoginStatus, &self.tool.program, &self.tool.status_args, timeout);

        let (version_result, status_result) = tokio::join!(self.runner.run(version), self.runner.run(status));
        let snapshot = self.assess(version_result, status_result);

        info!(
            "Health probe: installed={}, logged_in={} ({})",
            snapshot.installed, snapshot.logged_in, snapshot.message
        );
        snapshot
    }

    fn assess(
        &self,
        version: Result<ProcessResult, RunnerError>,
        status: Result<ProcessResult, RunnerError>,
    ) -> HealthSnapshot {
        let program = &self.tool.program;

        let version_line = match version {
            Ok(result) if result.success() => first_line(&result.stdout_text)
                .or_else(|| first_line(&result.stderr_text))
                .unwrap_or_else(|| program.clone()),
            Ok(result) => {
                return HealthSnapshot::new(
                    false,
                    false,
                    format!(
                        "`{} {}` failed ({}): {}",
                        program,
                        self.tool.version_args.join(" "),
                        result.exit_description(),
                        tail_excerpt(&result.stderr_text, PROBE_EXCERPT_CHARS)
                    ),
                );
            }
            Err(RunnerError::NotFound { .. }) => {
                return HealthSnapshot::new(
                    false,
                    false,
                    format!("`{}` was not found on PATH; install it or set tool.program", program),
                );
            }
            Err(e) => {
                return HealthSnapshot::new(false, false, format!("could not run `{}`: {}", program, e));
            }
        };

        match status {
            Ok(result) if result.success() && !reports_logged_out(&result) => {
                HealthSnapshot::new(true, true, format!("ready ({})", version_line))
            }
            Ok(result) if result.timed_out => HealthSnapshot::new(
                true,
                false,
                format!("`{} {}` timed out; check the tool's login state", program, self.tool.status_args.join(" ")),
            ),
            Ok(_) => HealthSnapshot::new(
                true,
                false,
                format!("`{}` is not logged in; run `{} login` and retry", program, program),
            ),
            Err(e) => HealthSnapshot::new(true, false, format!("could not check login state: {}", e)),
        }
    }
}

fn first_line(text: &str) -> Option<String> {
    text.lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(str::to_string)
}

/// Some tools exit 0 but say so in their output
fn reports_logged_out(result: &ProcessResult) -> bool {
    let combined = format!("{}\n{}", result.stdout_text, result.stderr_text).to_lowercase();
    combined.contains("not logged in") || combined.contains("logged out")
}
