use anyhow::{Context, Result};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

use crate::app_config::Config;
use crate::errors::{ErrorDetail, ServiceError};
use crate::tool::{HealthMonitor, HealthSnapshot, ProcessRunner, ToolRunner};
use crate::translation::{BatchOrchestrator, CacheStats, TranslateRequest, TranslateResponse, TranslationCache};

// @module: Application controller wiring the runner, cache, health monitor and orchestrator

/// Main application controller
///
/// Cloning is cheap; clones share the cache, the health snapshot and the
/// invocation limit.
#[derive(Debug, Clone)]
pub struct Controller {
    // @field: App configuration
    config: Config,
    // @field: Health probes, shared with the orchestrator
    health: Arc<HealthMonitor>,
    // @field: Request pipeline
    orchestrator: Arc<BatchOrchestrator>,
}

/// One line of input in serve mode
#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    id: Value,
    op: String,
    #[serde(default)]
    request: Option<TranslateRequest>,
    #[serde(default)]
    force: bool,
}

/// One line of output in serve mode
#[derive(Debug, Serialize)]
struct Reply {
    id: Value,
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ErrorDetail>,
}

impl Reply {
    fn success(id: Value, result: Value) -> Self {
        Self { id, ok: true, result: Some(result), error: None }
    }

    fn failure(id: Value, error: &ServiceError) -> Self {
        Self { id, ok: false, result: None, error: Some(error.to_body().error) }
    }
}

impl Controller {
    // @method: Create a controller that runs the real tool
    pub fn with_config(config: Config) -> Result<Self> {
        let runner = Arc::new(ProcessRunner::new(config.tool.kill_grace()));
        Self::with_runner(config, runner)
    }

    // @method: Create a controller on top of any runner
    pub fn with_runner(config: Config, runner: Arc<dyn ToolRunner>) -> Result<Self> {
        config.validate().context("Configuration validation failed")?;

        let cache = TranslationCache::with_capacity(config.service.cache_capacity);
        let health = Arc::new(HealthMonitor::new(
            runner.clone(),
            config.tool.clone(),
            config.service.health_ttl(),
        ));
        let orchestrator = Arc::new(BatchOrchestrator::new(runner, cache, health.clone(), &config));

        debug!(
            "Controller ready: program={}, cache_capacity={}, max_concurrent_invocations={}",
            config.tool.program, config.service.cache_capacity, config.service.max_concurrent_invocations
        );

        Ok(Self { config, health, orchestrator })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Translate one request
    pub async fn translate(&self, request: TranslateRequest) -> Result<TranslateResponse, ServiceError> {
        self.orchestrator.translate(request).await
    }

    /// Current health snapshot, re-probing when `force` is set
    pub async fn health(&self, force: bool) -> HealthSnapshot {
        self.health.snapshot(force).await
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.orchestrator.cache().stats()
    }

    /// Serve newline-delimited JSON envelopes until `reader` is exhausted
    ///
    /// Every non-blank input line yields exactly one output line. Envelopes are
    /// handled concurrently, so replies may come back out of order; callers
    /// correlate them by `id`. Returns the number of envelopes handled.
    pub async fn serve<R, W>(&self, reader: R, mut writer: W) -> Result<usize>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        let mut lines = reader.lines();

        let read_loop = async move {
            let mut handled = 0;
            while let Some(line) = lines.next_line().await.context("Failed to read request line")? {
                if line.trim().is_empty() {
                    continue;
                }
                handled += 1;

                let controller = self.clone();
                let tx = tx.clone();
                tokio::spawn(async move {
                    let reply = controller.handle_line(&line).await;
                    let _ = tx.send(reply);
                });
            }
            Ok::<usize, anyhow::Error>(handled)
        };

        let write_loop = async {
            while let Some(reply) = rx.recv().await {
                writer.write_all(reply.as_bytes()).await.context("Failed to write reply")?;
                writer.write_all(b"\n").await.context("Failed to write reply")?;
                writer.flush().await.context("Failed to flush reply")?;
            }
            Ok::<(), anyhow::Error>(())
        };

        let (handled, ()) = futures::future::try_join(read_loop, write_loop).await?;
        info!("Serve loop finished after {} envelope(s)", handled);
        Ok(handled)
    }

    /// Handle one serve-mode line and render the reply line
    pub async fn handle_line(&self, line: &str) -> String {
        let reply = match parse_envelope(line) {
            Ok(envelope) => self.handle_envelope(envelope).await,
            Err((id, e)) => {
                warn!("Rejected malformed envelope: {}", e);
                Reply::failure(id, &ServiceError::BadRequest(format!("malformed envelope: {}", e)))
            }
        };

        serde_json::to_string(&reply).unwrap_or_else(|e| {
            format!(
                r#"{{"id":null,"ok":false,"error":{{"kind":"upstream-failure","message":"could not encode reply: {}"}}}}"#,
                e
            )
        })
    }

    async fn handle_envelope(&self, envelope: Envelope) -> Reply {
        let Envelope { id, op, request, force } = envelope;

        let outcome = match op.as_str() {
            "translate" => match request {
                Some(request) => self.translate(request).await.and_then(|response| to_value(&response)),
                None => Err(ServiceError::BadRequest("translate envelope has no request".to_string())),
            },
            "health" => to_value(&self.health(force).await),
            other => Err(ServiceError::BadRequest(format!("unknown op '{}'", other))),
        };

        match outcome {
            Ok(result) => Reply::success(id, result),
            Err(e) => Reply::failure(id, &e),
        }
    }
}

/// Decode one envelope; on failure keep whatever `id` the line carried
fn parse_envelope(line: &str) -> Result<Envelope, (Value, serde_json::Error)> {
    let value: Value = serde_json::from_str(line).map_err(|e| (Value::Null, e))?;
    let id = value.get("id").cloned().unwrap_or(Value::Null);
    serde_json::from_value(value).map_err(|e| (id, e))
}

fn to_value<T: Serialize>(value: &T) -> Result<Value, ServiceError> {
    serde_json::to_value(value).map_err(|e| ServiceError::UpstreamFailure(format!("could not encode result: {}", e)))
}
