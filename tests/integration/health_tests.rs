/*!
 * Tests for health probing through the controller
 */

use std::time::Duration;

use fragtrans::app_config::Config;
use fragtrans::tool::MockRunner;

use crate::common::{mock_controller, mock_controller_with_config, request};

#[tokio::test]
async fn test_health_withWorkingTool_shouldBeOk() {
    let (controller, runner) = mock_controller(MockRunner::working());

    let snapshot = controller.health(false).await;

    assert!(snapshot.ok);
    assert!(snapshot.installed);
    assert!(snapshot.logged_in);
    assert!(snapshot.message.contains("mock-tool 1.0.0"));
    assert_eq!(runner.probe_calls(), 2);
}

#[tokio::test]
async fn test_health_afterTranslate_shouldReuseSnapshot() {
    let (controller, runner) = mock_controller(MockRunner::working());

    controller.translate(request("fr", &[("a", "one")])).await.unwrap();
    controller.health(false).await;
    controller.translate(request("fr", &[("b", "two")])).await.unwrap();

    assert_eq!(runner.probe_calls(), 2);
}

#[tokio::test]
async fn test_health_withForce_shouldReprobe() {
    let (controller, runner) = mock_controller(MockRunner::working());

    controller.health(false).await;
    controller.health(true).await;

    assert_eq!(runner.probe_calls(), 4);
}

#[tokio::test]
async fn test_health_withZeroTtl_shouldProbeEveryTime() {
    let mut config = Config::default();
    config.service.health_ttl_secs = 0;
    let (controller, runner) = mock_controller_with_config(config, MockRunner::working());

    controller.health(false).await;
    tokio::time::sleep(Duration::from_millis(5)).await;
    controller.health(false).await;

    assert_eq!(runner.probe_calls(), 4);
}

#[tokio::test]
async fn test_health_withMissingTool_shouldExplain() {
    let (controller, _runner) = mock_controller(MockRunner::not_installed());

    let snapshot = controller.health(false).await;

    assert!(!snapshot.ok);
    assert!(!snapshot.installed);
    assert!(!snapshot.logged_in);
    assert!(snapshot.message.contains("codex"));
}

#[test]
fn test_health_fromSyncContext_shouldResolve() {
    let (controller, runner) = mock_controller(MockRunner::logged_out());

    let snapshot = tokio_test::block_on(controller.health(false));

    assert!(!snapshot.ok);
    assert!(snapshot.installed);
    assert_eq!(runner.probe_calls(), 2);
}
