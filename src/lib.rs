/*!
 * # fragtrans - batch translation of text fragments
 *
 * A Rust library that translates batches of short text fragments (for
 * example the text nodes of a web page) by driving an authenticated LLM
 * command-line tool as a subprocess.
 *
 * ## Features
 *
 * - Item normalization: id assignment, deduplication, length clipping
 * - Bounded in-memory translation cache keyed by text and options
 * - Robust extraction of JSON results from free-form tool output
 * - Subprocess supervision with timeout and escalating termination
 * - Cached installation / login health probes
 * - One-shot CLI and a newline-delimited JSON serve loop
 *
 * ## Architecture
 *
 * - `app_config`: Configuration management
 * - `tool`: Access to the external tool:
 *   - `tool::process`: Subprocess runner
 *   - `tool::health`: Health monitor
 *   - `tool::mock`: Scripted runner for tests
 * - `translation`: Request pipeline:
 *   - `translation::normalizer`: Raw item normalization
 *   - `translation::cache`: Translation cache
 *   - `translation::extractor`: Output extraction
 *   - `translation::orchestrator`: Batch orchestration
 * - `app_controller`: Wiring and the serve loop
 * - `language_utils`: ISO language code utilities
 * - `errors`: Custom error types for the application
 */

// Global lints configuration
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::redundant_closure_for_method_calls)]

pub mod app_config;
pub mod app_controller;
pub mod errors;
pub mod language_utils;
pub mod tool;
pub mod translation;

pub use app_config::Config;
pub use app_controller::Controller;
pub use errors::{ExtractionError, RunnerError, ServiceError};
pub use tool::{HealthMonitor, HealthSnapshot, ProcessRunner, ToolRunner};
pub use translation::{BatchOrchestrator, TranslateRequest, TranslateResponse, TranslationCache};
