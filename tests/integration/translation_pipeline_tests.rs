/*!
 * End-to-end tests of the request pipeline over a scripted tool
 */

use std::collections::HashSet;

use fragtrans::app_config::Config;
use fragtrans::tool::{MockReply, MockRunner};
use fragtrans::translation::{normalize_items, RawItem};
use fragtrans::TranslateRequest;

use crate::common::{self, mock_controller, request, results_json};

#[tokio::test]
async fn test_translate_withSingleItem_shouldReturnToolTranslation() {
    common::init_logging();
    let (controller, runner) =
        mock_controller(MockRunner::working().with_reply(results_json(&[("p1", "你好，世界")])));

    let response = controller.translate(request("zh-CN", &[("p1", "Hello world")])).await.unwrap();

    assert_eq!(response.results.len(), 1);
    assert_eq!(response.results[0].id, "p1");
    assert_eq!(response.results[0].translated_text, "你好，世界");
    assert!(response.warnings.is_empty());
    assert_eq!(response.meta.generated, 1);
    assert_eq!(response.meta.cache_hits, 0);
    assert_eq!(runner.translate_calls(), 1);
}

#[tokio::test]
async fn test_translate_resubmitted_shouldHitCacheWithoutInvocation() {
    let (controller, runner) =
        mock_controller(MockRunner::working().with_reply(results_json(&[("p1", "你好，世界")])));

    controller.translate(request("zh-CN", &[("p1", "Hello world")])).await.unwrap();
    let second = controller.translate(request("zh-CN", &[("other-id", "Hello world")])).await.unwrap();

    assert_eq!(runner.translate_calls(), 1);
    assert_eq!(second.meta.cache_hits, 1);
    assert_eq!(second.meta.generated, 0);
    assert_eq!(second.results[0].id, "other-id");
    assert_eq!(second.results[0].translated_text, "你好，世界");
    assert_eq!(controller.cache_stats().hits, 1);
}

#[tokio::test]
async fn test_translate_withDifferentTone_shouldMissCache() {
    let (controller, runner) = mock_controller(MockRunner::working());

    controller.translate(request("fr", &[("a", "Hello")])).await.unwrap();
    let mut concise = request("fr", &[("a", "Hello")]);
    concise.tone = Some("concise".to_string());
    controller.translate(concise).await.unwrap();

    assert_eq!(runner.translate_calls(), 2);
}

#[tokio::test]
async fn test_translate_withPartialCache_shouldOnlySendMisses() {
    let (controller, runner) = mock_controller(MockRunner::working());

    controller.translate(request("fr", &[("a", "alpha-source")])).await.unwrap();
    let response = controller
        .translate(request("fr", &[("a", "alpha-source"), ("b", "beta-source")]))
        .await
        .unwrap();

    assert_eq!(runner.translate_calls(), 2);
    let second_prompt = &runner.prompts()[1];
    assert!(second_prompt.contains("beta-source"));
    assert!(!second_prompt.contains("alpha-source"));
    assert_eq!(response.meta.cache_hits, 1);
    assert_eq!(response.meta.generated, 1);
    assert_eq!(response.results[0].translated_text, "[TRANSLATED] alpha-source");
}

#[tokio::test]
async fn test_translate_withLoggedOutTool_shouldBeUnavailableWithoutInvocation() {
    let (controller, runner) = mock_controller(MockRunner::logged_out());

    let err = controller.translate(request("zh-CN", &[("p1", "Hello world")])).await.unwrap_err();

    assert_eq!(err.kind(), "service-unavailable");
    assert!(err.to_string().contains("login"));
    assert_eq!(runner.translate_calls(), 0);
}

#[tokio::test]
async fn test_translate_withMissingTool_shouldBeUnavailable() {
    let (controller, runner) = mock_controller(MockRunner::not_installed());

    let err = controller.translate(request("fr", &[("a", "x")])).await.unwrap_err();

    assert_eq!(err.kind(), "service-unavailable");
    assert!(err.to_string().contains("not found"));
    assert_eq!(runner.translate_calls(), 0);
}

#[tokio::test]
async fn test_translate_withMissingRows_shouldKeepSourceAndWarn() {
    let (controller, _runner) = mock_controller(
        MockRunner::working().with_reply(results_json(&[("a", "un"), ("zzz", "stray row")])),
    );

    let response = controller
        .translate(request("fr", &[("a", "one"), ("b", "two"), ("c", "three")]))
        .await
        .unwrap();

    let texts: Vec<&str> = response.results.iter().map(|r| r.translated_text.as_str()).collect();
    assert_eq!(texts, vec!["un", "two", "three"]);
    assert_eq!(response.meta.fallbacks, 2);
    assert_eq!(
        response.warnings,
        vec![
            "No translation returned for item 'b'; kept source text".to_string(),
            "No translation returned for item 'c'; kept source text".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_translate_fallbacks_shouldNotBeCached() {
    let (controller, runner) =
        mock_controller(MockRunner::working().with_reply(MockReply::Stdout(r#"{"results":[{"id":"a","translatedText":"un"}]}"#.into())));

    controller.translate(request("fr", &[("a", "one"), ("b", "two")])).await.unwrap();
    let second = controller.translate(request("fr", &[("b", "two")])).await.unwrap();

    assert_eq!(runner.translate_calls(), 2);
    assert_eq!(second.results[0].translated_text, "[TRANSLATED] two");
}

#[tokio::test]
async fn test_translate_withOversizedBatchSize_shouldClampToTwenty() {
    let (controller, runner) = mock_controller(MockRunner::working());
    let texts: Vec<String> = (0..25).map(|i| format!("text {}", i)).collect();
    let mut request = TranslateRequest::new("fr", texts.iter().map(|t| RawItem::new(None, t)).collect());
    request.batch_size = Some(500);

    let response = controller.translate(request).await.unwrap();

    assert_eq!(runner.translate_calls(), 2);
    assert_eq!(response.results.len(), 25);
    assert_eq!(response.results[24].id, "item-24");
}

#[tokio::test]
async fn test_translate_withZeroBatchSize_shouldClampToOne() {
    let (controller, runner) = mock_controller(MockRunner::working());
    let mut request = request("fr", &[("a", "one"), ("b", "two"), ("c", "three")]);
    request.batch_size = Some(0);

    controller.translate(request).await.unwrap();

    assert_eq!(runner.translate_calls(), 3);
}

#[tokio::test]
async fn test_translate_results_shouldMatchNormalizedItems() {
    let (controller, _runner) = mock_controller(MockRunner::working());
    let raw = vec![
        RawItem::new(Some("x"), "first"),
        RawItem::new(None, "  "),
        RawItem::new(Some("x"), "duplicate of x"),
        RawItem::new(None, "no id"),
        RawItem::new(Some("item-3"), "claims a generated id"),
        RawItem::new(None, "no id either"),
    ];
    let expected = normalize_items(&raw, Config::default().service.default_max_chars_per_item);

    let response = controller.translate(TranslateRequest::new("de", raw)).await.unwrap();

    assert_eq!(response.results.len(), expected.len());
    let returned: HashSet<&str> = response.results.iter().map(|r| r.id.as_str()).collect();
    let normalized: HashSet<&str> = expected.iter().map(|i| i.id.as_str()).collect();
    assert_eq!(returned, normalized);
    assert_eq!(response.meta.total, expected.len());
}

#[tokio::test]
async fn test_translate_withNoUsableItems_shouldBeBadRequest() {
    let (controller, runner) = mock_controller(MockRunner::working());

    let err = controller.translate(TranslateRequest::new("fr", Vec::new())).await.unwrap_err();

    assert_eq!(err.kind(), "bad-request");
    assert_eq!(runner.probe_calls(), 0);
}

#[tokio::test]
async fn test_translate_withFailingChunk_shouldFailWholeRequest() {
    let (controller, runner) = mock_controller(
        MockRunner::working()
            .with_reply(results_json(&[("a", "un")]))
            .with_reply(MockReply::Timeout),
    );
    let mut request = request("fr", &[("a", "one"), ("b", "two"), ("c", "three")]);
    request.batch_size = Some(1);

    let err = controller.translate(request).await.unwrap_err();

    assert_eq!(err.kind(), "upstream-timeout");
    assert_eq!(runner.translate_calls(), 2);
}

#[tokio::test]
async fn test_translate_concurrentRequests_shouldShareCacheAndSucceed() {
    let mut config = Config::default();
    config.service.max_concurrent_invocations = 2;
    let (controller, runner) = common::mock_controller_with_config(
        config,
        MockRunner::working()
            .with_reply(MockReply::Delayed { delay_ms: 30, reply: Box::new(results_json(&[("a", "un")])) })
            .with_reply(MockReply::Delayed { delay_ms: 30, reply: Box::new(results_json(&[("b", "deux")])) }),
    );

    let (first, second) = futures::future::join(
        controller.translate(request("fr", &[("a", "one")])),
        controller.translate(request("fr", &[("b", "two")])),
    )
    .await;

    assert!(first.is_ok());
    assert!(second.is_ok());
    assert_eq!(runner.translate_calls(), 2);
    assert_eq!(runner.probe_calls(), 2);
}

#[tokio::test]
async fn test_translate_withFailedExitAndErrorText_shouldNotCacheErrorAsTranslation() {
    let (controller, runner) = mock_controller(MockRunner::working().with_reply(MockReply::Exit {
        code: 1,
        stdout: "Error: stream disconnected before completion".into(),
        stderr: "retrying failed".into(),
    }));

    let err = controller.translate(request("fr", &[("p1", "Hello world")])).await.unwrap_err();

    assert_eq!(err.kind(), "upstream-failure");
    assert!(err.to_string().contains("stream disconnected"));

    let retried = controller.translate(request("fr", &[("p1", "Hello world")])).await.unwrap();
    assert_eq!(retried.meta.cache_hits, 0);
    assert_eq!(controller.cache_stats().hits, 0);
    assert_eq!(retried.meta.generated, 1);
    assert_eq!(retried.results[0].translated_text, "[TRANSLATED] Hello world");
    assert_eq!(runner.translate_calls(), 2);
}
