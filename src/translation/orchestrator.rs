/*!
 * Batch orchestration of translation requests.
 *
 * Per request: normalize the items, resolve what the cache already knows,
 * check that the tool is usable, then translate the remaining items in
 * chunks of at most `batch_size`, one tool invocation per chunk. Items the
 * tool did not answer for keep their source text and produce a warning.
 */

use log::{debug, error, info, warn};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;

use super::cache::{CacheKey, TranslationCache};
use super::extractor::{extract_results, BatchResult, ExtractionStrategy};
use super::normalizer::{normalize_items, RawItem, TranslationItem};
use super::options::TranslationOptions;
use super::prompts::build_batch_prompt;
use crate::app_config::{Config, ServiceConfig, ToolConfig};
use crate::errors::{tail_excerpt, ServiceError, EXCERPT_MAX_CHARS};
use crate::tool::{HealthMonitor, InvocationKind, ProcessResult, ToolInvocation, ToolRunner};

/// Placeholder in the tool arguments replaced by the request's model
pub const MODEL_PLACEHOLDER: &str = "{model}";

/// Incoming translation request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TranslateRequest {
    pub source_lang: Option<String>,
    pub target_lang: Option<String>,
    pub model: Option<String>,
    pub mode: Option<String>,
    pub tone: Option<String>,
    /// Integers, floats and numeric strings are accepted, then clamped
    #[serde(deserialize_with = "lenient_count")]
    pub batch_size: Option<i64>,
    #[serde(deserialize_with = "lenient_count")]
    pub max_chars_per_item: Option<i64>,
    pub items: Vec<RawItem>,
}

impl TranslateRequest {
    /// Request for `items` into `target_lang`, everything else defaulted
    pub fn new(target_lang: &str, items: Vec<RawItem>) -> Self {
        Self {
            target_lang: Some(target_lang.to_string()),
            items,
            ..Self::default()
        }
    }
}

fn lenient_count<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Some(serde_json::Value::String(s)) => s.trim().parse::<f64>().ok().map(|f| f as i64),
        _ => None,
    })
}

/// Aggregate counters for a response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMeta {
    pub model: String,
    pub total: usize,
    pub cache_hits: usize,
    pub generated: usize,
    pub fallbacks: usize,
    pub duration_ms: u64,
}

/// Successful response: one result per normalized item, in input order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslateResponse {
    pub results: Vec<BatchResult>,
    pub warnings: Vec<String>,
    pub meta: ResponseMeta,
}

/// Drives normalization, caching, tool invocations and extraction
#[derive(Debug)]
pub struct BatchOrchestrator {
    runner: Arc<dyn ToolRunner>,
    cache: TranslationCache,
    health: Arc<HealthMonitor>,
    tool: ToolConfig,
    defaults: ServiceConfig,
    invocation_slots: Arc<Semaphore>,
}

impl BatchOrchestrator {
    pub fn new(
        runner: Arc<dyn ToolRunner>,
        cache: TranslationCache,
        health: Arc<HealthMonitor>,
        config: &Config,
    ) -> Self {
        Self {
            runner,
            cache,
            health,
            tool: config.tool.clone(),
            defaults: config.service.clone(),
            invocation_slots: Arc::new(Semaphore::new(config.service.max_concurrent_invocations.max(1))),
        }
    }

    pub fn cache(&self) -> &TranslationCache {
        &self.cache
    }

    /// Translate one request
    pub async fn translate(&self, request: TranslateRequest) -> Result<TranslateResponse, ServiceError> {
        let started = Instant::now();
        let request_id = short_request_id();

        let options = TranslationOptions::resolve(
            &self.defaults,
            request.source_lang.as_deref(),
            request.target_lang.as_deref(),
            request.model.as_deref(),
            request.mode.as_deref(),
            request.tone.as_deref(),
            request.batch_size,
            request.max_chars_per_item,
        );

        let items = normalize_items(&request.items, options.max_chars_per_item);
        if items.is_empty() {
            return Err(ServiceError::BadRequest(
                "request contains no items with non-empty text".to_string(),
            ));
        }

        info!(
            "[{}] Translating {} item(s) {} -> {} with {} ({}, {})",
            request_id,
            items.len(),
            options.source_lang,
            options.target_lang,
            options.model,
            options.mode.as_str(),
            options.tone.as_str()
        );

        // Partition into cache hits and pending items
        let keys: Vec<CacheKey> = items
            .iter()
            .map(|item| CacheKey::for_item(&options, &item.text))
            .collect();
        let mut resolved: Vec<Option<String>> = vec![None; items.len()];
        let mut pending: Vec<usize> = Vec::new();
        for (index, key) in keys.iter().enumerate() {
            match self.cache.get(key) {
                Some(translation) => resolved[index] = Some(translation),
                None => pending.push(index),
            }
        }
        let cache_hits = items.len() - pending.len();

        let mut warnings = Vec::new();
        let mut generated = 0;
        let mut fallbacks = 0;

        if !pending.is_empty() {
            let health = self.health.snapshot(false).await;
            if !health.ok {
                warn!("[{}] Tool unavailable: {}", request_id, health.message);
                return Err(ServiceError::ServiceUnavailable(health.message));
            }

            let chunk_count = pending.len().div_ceil(options.batch_size);
            for (chunk_index, chunk) in pending.chunks(options.batch_size).enumerate() {
                let chunk_items: Vec<TranslationItem> = chunk.iter().map(|&i| items[i].clone()).collect();
                debug!(
                    "[{}] Chunk {}/{} with {} item(s)",
                    request_id,
                    chunk_index + 1,
                    chunk_count,
                    chunk_items.len()
                );

                let rows = self.run_chunk(&options, &chunk_items).await.map_err(|e| {
                    error!("[{}] Chunk {}/{} failed: {}", request_id, chunk_index + 1, chunk_count, e);
                    e
                })?;

                let by_id: HashMap<&str, &str> = rows
                    .iter()
                    .map(|row| (row.id.as_str(), row.translated_text.as_str()))
                    .collect();

                for &index in chunk {
                    let item = &items[index];
                    match by_id.get(item.id.as_str()) {
                        Some(&translation) => {
                            self.cache.put(keys[index].clone(), translation.to_string());
                            resolved[index] = Some(translation.to_string());
                            generated += 1;
                        }
                        None => {
                            warn!("[{}] No translation returned for item '{}'", request_id, item.id);
                            warnings.push(format!(
                                "No translation returned for item '{}'; kept source text",
                                item.id
                            ));
                            resolved[index] = Some(item.text.clone());
                            fallbacks += 1;
                        }
                    }
                }
            }
        }

        let results: Vec<BatchResult> = items
            .iter()
            .zip(resolved)
            .map(|(item, translation)| {
                BatchResult::new(item.id.clone(), translation.unwrap_or_else(|| item.text.clone()))
            })
            .collect();

        let meta = ResponseMeta {
            model: options.model.clone(),
            total: results.len(),
            cache_hits,
            generated,
            fallbacks,
            duration_ms: started.elapsed().as_millis() as u64,
        };

        info!(
            "[{}] Done in {}ms: {} cached, {} generated, {} fallback(s)",
            request_id, meta.duration_ms, meta.cache_hits, meta.generated, meta.fallbacks
        );

        Ok(TranslateResponse { results, warnings, meta })
    }

    /// One tool invocation plus one extraction pass
    async fn run_chunk(
        &self,
        options: &TranslationOptions,
        chunk: &[TranslationItem],
    ) -> Result<Vec<BatchResult>, ServiceError> {
        let args: Vec<String> = self
            .tool
            .exec_args
            .iter()
            .map(|arg| arg.replace(MODEL_PLACEHOLDER, &options.model))
            .collect();
        let invocation = ToolInvocation::new(InvocationKind::Translate, &self.tool.program, &args, self.tool.timeout())
            .with_stdin(build_batch_prompt(options, chunk));

        let result = {
            let _permit = self
                .invocation_slots
                .acquire()
                .await
                .map_err(|_| ServiceError::UpstreamFailure("tool invocation pool is closed".to_string()))?;
            self.runner.run(invocation).await?
        };

        // Extraction is CPU-bound on large outputs
        let tool = self.tool.clone();
        let chunk = chunk.to_vec();
        tokio::task::spawn_blocking(move || interpret(&tool, result, &chunk))
            .await
            .map_err(|e| ServiceError::UpstreamFailure(format!("extraction task failed: {}", e)))?
    }
}

fn interpret(
    tool: &ToolConfig,
    result: ProcessResult,
    chunk: &[TranslationItem],
) -> Result<Vec<BatchResult>, ServiceError> {
    let program = &tool.program;

    if result.timed_out {
        return Err(ServiceError::UpstreamTimeout(format!(
            "`{}` did not finish within {}s",
            program, tool.timeout_secs
        )));
    }

    let failed = !result.success();
    if failed && result.stdout_text.trim().is_empty() {
        return Err(ServiceError::UpstreamFailure(format!(
            "`{}` failed ({}): {}",
            program,
            result.exit_description(),
            stderr_summary(&result)
        )));
    }

    match extract_results(&result.stdout_text, chunk) {
        // After a failed exit, free text is the tool's error message
        Ok(extraction) if failed && extraction.strategy == ExtractionStrategy::PlainText => {
            Err(ServiceError::UpstreamFailure(format!(
                "`{}` failed ({}) without structured output: {}; stderr: {}",
                program,
                result.exit_description(),
                tail_excerpt(&result.stdout_text, EXCERPT_MAX_CHARS),
                stderr_summary(&result)
            )))
        }
        Ok(extraction) => {
            debug!("Extracted {} row(s) via {:?}", extraction.rows.len(), extraction.strategy);
            Ok(extraction.rows)
        }
        Err(e) if failed => Err(ServiceError::UpstreamFailure(format!(
            "`{}` failed ({}) without usable output: {}; stderr: {}",
            program,
            result.exit_description(),
            e,
            stderr_summary(&result)
        ))),
        Err(e) => Err(ServiceError::ParseFailure(format!(
            "could not read `{}` output: {}",
            program, e
        ))),
    }
}

fn stderr_summary(result: &ProcessResult) -> String {
    let excerpt = tail_excerpt(&result.stderr_text, EXCERPT_MAX_CHARS);
    if excerpt.is_empty() {
        "<no stderr>".to_string()
    } else {
        excerpt
    }
}

fn short_request_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..8].to_string()
}
