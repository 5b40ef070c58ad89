/*!
 * Tests against real subprocesses, driving `sh` as a stand-in tool
 */

#![cfg(unix)]

use std::sync::Arc;
use std::time::Duration;

use fragtrans::app_config::Config;
use fragtrans::tool::{InvocationKind, ProcessRunner, ToolInvocation, ToolRunner};
use fragtrans::Controller;

use crate::common::request;

fn sh(script: &str) -> Vec<String> {
    vec!["-c".to_string(), script.to_string()]
}

/// Config whose "tool" is a set of shell snippets
fn shell_tool_config(translate_script: &str) -> Config {
    let mut config = Config::default();
    config.tool.program = "sh".to_string();
    config.tool.version_args = sh("echo 'fake-tool 0.1'");
    config.tool.status_args = sh("echo 'Logged in'");
    config.tool.exec_args = sh(translate_script);
    config.tool.timeout_secs = 5;
    config.tool.kill_grace_secs = 1;
    config
}

fn controller(config: Config) -> Controller {
    let runner = Arc::new(ProcessRunner::new(config.tool.kill_grace()));
    Controller::with_runner(config, runner).unwrap()
}

#[tokio::test]
async fn test_controller_withShellTool_shouldTranslateEndToEnd() {
    let script = r#"cat > /dev/null; printf '%s\n' 'Here you go:' '{"results":[{"id":"p1","translatedText":"你好，世界"}]}'"#;
    let controller = controller(shell_tool_config(script));

    let response = controller.translate(request("zh-CN", &[("p1", "Hello world")])).await.unwrap();

    assert_eq!(response.results[0].translated_text, "你好，世界");
    assert_eq!(response.meta.generated, 1);
}

#[tokio::test]
async fn test_controller_withModelPlaceholder_shouldSubstituteModel() {
    let script = r#"cat > /dev/null; printf '{"results":[{"id":"a","translatedText":"%s"}]}' '{model}'"#;
    let controller = controller(shell_tool_config(script));
    let mut request = request("fr", &[("a", "x")]);
    request.model = Some("model-under-test".to_string());

    let response = controller.translate(request).await.unwrap();

    assert_eq!(response.results[0].translated_text, "model-under-test");
}

#[tokio::test]
async fn test_controller_withHangingTool_shouldTimeOut() {
    let mut config = shell_tool_config("exec sleep 30");
    config.tool.timeout_secs = 1;
    let controller = controller(config);

    let started = std::time::Instant::now();
    let err = controller.translate(request("fr", &[("a", "x")])).await.unwrap_err();

    assert_eq!(err.kind(), "upstream-timeout");
    assert!(started.elapsed() < Duration::from_secs(10));
}

#[tokio::test]
async fn test_controller_withFailingTool_shouldReportStderr() {
    let controller = controller(shell_tool_config("cat > /dev/null; echo 'quota exceeded' >&2; exit 3"));

    let err = controller.translate(request("fr", &[("a", "x")])).await.unwrap_err();

    assert_eq!(err.kind(), "upstream-failure");
    assert!(err.to_string().contains("quota exceeded"));
}

#[tokio::test]
async fn test_controller_withLoggedOutShellTool_shouldBeUnavailable() {
    let mut config = shell_tool_config("cat");
    config.tool.status_args = sh("echo 'Not logged in' >&2; exit 1");
    let controller = controller(config);

    let err = controller.translate(request("fr", &[("a", "x")])).await.unwrap_err();

    assert_eq!(err.kind(), "service-unavailable");
}

#[tokio::test]
async fn test_controller_withMissingProgram_shouldReportNotInstalled() {
    let mut config = shell_tool_config("cat");
    config.tool.program = "fragtrans-no-such-tool-xyz".to_string();
    let controller = controller(config);

    let snapshot = controller.health(true).await;

    assert!(!snapshot.installed);
    assert!(snapshot.message.contains("not found"));
}

#[tokio::test]
async fn test_processRunner_shouldRunInsideScratchDirectory() {
    let runner = ProcessRunner::default();
    let invocation = ToolInvocation::new(
        InvocationKind::Translate,
        "sh",
        &sh("test \"$(pwd -P)\" = \"$(cd '{workdir}' && pwd -P)\" && echo same"),
        Duration::from_secs(5),
    );

    let result = runner.run(invocation).await.unwrap();

    assert!(result.success(), "stderr: {}", result.stderr_text);
    assert_eq!(result.stdout_text.trim(), "same");
}
