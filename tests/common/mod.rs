/*!
 * Common test utilities for the fragtrans test suite
 */

use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

use fragtrans::app_config::Config;
use fragtrans::tool::{MockReply, MockRunner};
use fragtrans::translation::{RawItem, TranslationItem};
use fragtrans::{Controller, TranslateRequest};

/// Route library logs to the test output; safe to call repeatedly
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Creates a temporary directory for test files
pub fn create_temp_dir() -> Result<TempDir> {
    Ok(TempDir::new()?)
}

/// Creates a test file with the given content in the specified directory
pub fn create_test_file(dir: &Path, filename: &str, content: &str) -> Result<PathBuf> {
    let file_path = dir.join(filename);
    fs::write(&file_path, content)?;
    Ok(file_path)
}

/// Controller over a shared mock runner, so tests can inspect call counts
pub fn mock_controller(runner: MockRunner) -> (Controller, Arc<MockRunner>) {
    mock_controller_with_config(Config::default(), runner)
}

pub fn mock_controller_with_config(config: Config, runner: MockRunner) -> (Controller, Arc<MockRunner>) {
    let runner = Arc::new(runner);
    let controller = Controller::with_runner(config, runner.clone()).unwrap();
    (controller, runner)
}

/// Request for `(id, text)` pairs into `target`
pub fn request(target: &str, items: &[(&str, &str)]) -> TranslateRequest {
    TranslateRequest::new(
        target,
        items.iter().map(|(id, text)| RawItem::new(Some(id), text)).collect(),
    )
}

/// Normalized items, as the extractor sees them
pub fn batch(items: &[(&str, &str)]) -> Vec<TranslationItem> {
    items
        .iter()
        .map(|(id, text)| TranslationItem {
            id: id.to_string(),
            text: text.to_string(),
        })
        .collect()
}

/// Tool stdout answering with the given `(id, translatedText)` rows
pub fn results_json(rows: &[(&str, &str)]) -> MockReply {
    let rows: Vec<serde_json::Value> = rows
        .iter()
        .map(|(id, text)| serde_json::json!({ "id": id, "translatedText": text }))
        .collect();
    MockReply::Stdout(serde_json::json!({ "results": rows }).to_string())
}
