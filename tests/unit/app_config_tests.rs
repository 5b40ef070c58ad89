/*!
 * Tests for configuration loading and validation
 */

use fragtrans::app_config::{Config, LogLevel};

use crate::common;

#[test]
fn test_loadOrCreate_withMissingFile_shouldWriteDefaults() {
    let dir = common::create_temp_dir().unwrap();
    let path = dir.path().join("conf.json");

    let config = Config::load_or_create(&path).unwrap();

    assert!(path.exists());
    assert_eq!(config.tool.program, "codex");
    let reloaded = Config::load_or_create(&path).unwrap();
    assert_eq!(reloaded.service.default_batch_size, config.service.default_batch_size);
}

#[test]
fn test_loadOrCreate_withPartialFile_shouldFillDefaults() {
    let dir = common::create_temp_dir().unwrap();
    let path = common::create_test_file(
        dir.path(),
        "conf.json",
        r#"{"tool":{"program":"my-llm","timeout_secs":30},"log_level":"debug"}"#,
    )
    .unwrap();

    let config = Config::load_or_create(&path).unwrap();

    assert_eq!(config.tool.program, "my-llm");
    assert_eq!(config.tool.timeout_secs, 30);
    assert_eq!(config.tool.kill_grace_secs, 5);
    assert_eq!(config.service.cache_capacity, 3000);
    assert_eq!(config.service.default_target_language, "zh-CN");
    assert_eq!(config.log_level, LogLevel::Debug);
    assert!(config.validate().is_ok());
}

#[test]
fn test_loadOrCreate_withInvalidJson_shouldFail() {
    let dir = common::create_temp_dir().unwrap();
    let path = common::create_test_file(dir.path(), "conf.json", "{ not json").unwrap();

    let err = Config::load_or_create(&path).unwrap_err();
    assert!(format!("{:#}", err).contains("Failed to parse config file"));
}

#[test]
fn test_validate_withUnknownTargetLanguage_shouldFail() {
    let mut config = Config::default();
    config.service.default_target_language = "notalang".to_string();
    assert!(config.validate().is_err());
}

#[test]
fn test_validate_withZeroTimeout_shouldFail() {
    let mut config = Config::default();
    config.tool.timeout_secs = 0;
    assert!(config.validate().is_err());
}

#[test]
fn test_validate_withAutoSource_shouldPass() {
    let mut config = Config::default();
    config.service.default_source_language = "auto".to_string();
    config.service.default_target_language = "pt-BR".to_string();
    assert!(config.validate().is_ok());
}
