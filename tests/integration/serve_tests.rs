/*!
 * Tests for the newline-delimited JSON serve loop
 */

use std::collections::HashMap;

use serde_json::Value;

use fragtrans::tool::MockRunner;

use crate::common::{init_logging, mock_controller, results_json};

fn replies_by_id(output: &[u8]) -> HashMap<String, Value> {
    String::from_utf8_lossy(output)
        .lines()
        .map(|line| serde_json::from_str::<Value>(line).unwrap())
        .map(|reply| (reply["id"].to_string(), reply))
        .collect()
}

#[tokio::test]
async fn test_serve_withMixedEnvelopes_shouldAnswerEachLine() {
    init_logging();
    let (controller, runner) =
        mock_controller(MockRunner::working().with_reply(results_json(&[("p1", "你好，世界")])));
    let input = concat!(
        r#"{"id":1,"op":"translate","request":{"targetLang":"zh-CN","items":[{"id":"p1","text":"Hello world"}]}}"#,
        "\n",
        "\n",
        r#"{"id":"h","op":"health"}"#,
        "\n",
        r#"{"id":3,"op":"translate","request":{"targetLang":"fr","items":[]}}"#,
        "\n",
    );
    let mut output = Vec::new();

    let handled = controller.serve(input.as_bytes(), &mut output).await.unwrap();

    assert_eq!(handled, 3);
    let replies = replies_by_id(&output);
    assert_eq!(replies.len(), 3);

    let translated = &replies["1"];
    assert_eq!(translated["ok"], true);
    assert_eq!(translated["result"]["results"][0]["translatedText"], "你好，世界");
    assert_eq!(translated["result"]["meta"]["generated"], 1);

    let health = &replies["\"h\""];
    assert_eq!(health["ok"], true);
    assert_eq!(health["result"]["ok"], true);

    let rejected = &replies["3"];
    assert_eq!(rejected["ok"], false);
    assert_eq!(rejected["error"]["kind"], "bad-request");

    assert_eq!(runner.translate_calls(), 1);
}

#[tokio::test]
async fn test_serve_withMalformedLine_shouldKeepServing() {
    let (controller, _runner) = mock_controller(MockRunner::working());
    let input = "this is not json\n{\"id\":2,\"op\":\"health\"}\n";
    let mut output = Vec::new();

    let handled = controller.serve(input.as_bytes(), &mut output).await.unwrap();

    assert_eq!(handled, 2);
    let replies = replies_by_id(&output);
    assert_eq!(replies["null"]["error"]["kind"], "bad-request");
    assert_eq!(replies["2"]["ok"], true);
}

#[tokio::test]
async fn test_serve_withLoggedOutTool_shouldReportUnavailable() {
    let (controller, runner) = mock_controller(MockRunner::logged_out());
    let input = r#"{"id":"t","op":"translate","request":{"items":[{"text":"Hello"}]}}"#;
    let mut output = Vec::new();

    controller.serve(input.as_bytes(), &mut output).await.unwrap();

    let replies = replies_by_id(&output);
    assert_eq!(replies["\"t\""]["error"]["kind"], "service-unavailable");
    assert_eq!(runner.translate_calls(), 0);
}

#[tokio::test]
async fn test_serve_withEmptyInput_shouldReturnZero() {
    let (controller, _runner) = mock_controller(MockRunner::working());
    let mut output = Vec::new();

    let handled = controller.serve(&b""[..], &mut output).await.unwrap();

    assert_eq!(handled, 0);
    assert!(output.is_empty());
}
