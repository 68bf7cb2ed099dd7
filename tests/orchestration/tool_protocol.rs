use parley::TriggerOutcome;
use parley::config::OrchestratorConfig;
use parley::reasoning::{ContentBlock, MessageRole};
use serde_json::json;

use super::chat_harness::{
    FakeGateway, ScriptedReasoning, end_turn, event, fixture, fixture_with, test_config, tool_use,
};

#[tokio::test]
async fn three_tool_rounds_then_final_text() {
    let f = fixture(
        &test_config(),
        vec![
            tool_use(
                "t1",
                json!({"command": "create", "path": "/memories/ana.md", "file_text": "birthday: may 4"}),
            ),
            tool_use("t2", json!({"command": "view", "path": "/memories/ana.md"})),
            tool_use(
                "t3",
                json!({"command": "str_replace", "path": "/memories/ana.md", "old_str": "may 4", "new_str": "May 4"}),
            ),
            end_turn(&["Noted, ", "happy early birthday!"]),
        ],
    );

    let outcome = f
        .runtime
        .handle_event(&event("m1", "@bot my birthday is may 4", true))
        .await;

    assert_eq!(outcome, TriggerOutcome::Replied { chunks: 1 });
    assert_eq!(f.reasoning.calls(), 4);
    assert_eq!(f.gateway.sent()[0].text, "Noted, happy early birthday!");
    assert_eq!(
        f.notes.sandbox().read("/memories/ana.md").as_deref(),
        Some("birthday: May 4")
    );

    let last_request = f.reasoning.requests().pop().unwrap();
    // user, then three (assistant tool_use, user tool_result) pairs
    assert_eq!(last_request.transcript.len(), 7);
    let results = last_request.transcript.last().unwrap();
    assert_eq!(results.role, MessageRole::User);
    assert!(matches!(
        &results.content[0],
        ContentBlock::ToolResult { tool_use_id, is_error: false, .. } if tool_use_id == "t3"
    ));
    f.runtime.shutdown().await;
}

#[tokio::test]
async fn background_cap_ends_silently() {
    let responses = (0..12)
        .map(|i| {
            tool_use(
                &format!("t{i}"),
                json!({"command": "view", "path": "/memories"}),
            )
        })
        .collect();
    let f = fixture(&test_config(), responses);

    let outcome = f
        .runtime
        .handle_event(&event("m1", "what do you remember?", false))
        .await;

    assert_eq!(outcome, TriggerOutcome::NoReply);
    assert_eq!(f.reasoning.calls(), 10);
    assert!(f.gateway.sent().is_empty());
    f.runtime.shutdown().await;
}

#[tokio::test]
async fn tool_failure_is_reported_back_to_the_model() {
    let f = fixture(
        &test_config(),
        vec![
            tool_use("t1", json!({"command": "view", "path": "/etc/passwd"})),
            end_turn(&["I can only look at my own notes."]),
        ],
    );

    let outcome = f
        .runtime
        .handle_event(&event("m1", "@bot read /etc/passwd", true))
        .await;

    assert_eq!(outcome, TriggerOutcome::Replied { chunks: 1 });
    let second = &f.reasoning.requests()[1];
    let results = second.transcript.last().unwrap();
    assert!(matches!(
        &results.content[0],
        ContentBlock::ToolResult { is_error: true, .. }
    ));
    f.runtime.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn transient_failures_are_retried() {
    let reasoning = ScriptedReasoning::default();
    reasoning.push_error("503 service unavailable");
    reasoning.push_error("connection reset by peer");
    reasoning.push_response(end_turn(&["back online"]));
    let f = fixture_with(&test_config(), reasoning, FakeGateway::default());

    let outcome = f.runtime.handle_event(&event("m1", "@bot hi", true)).await;

    assert_eq!(outcome, TriggerOutcome::Replied { chunks: 1 });
    assert_eq!(f.reasoning.calls(), 3);
    assert_eq!(f.gateway.sent()[0].text, "back online");
    f.runtime.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn permanent_failure_is_answered_with_apology() {
    let reasoning = ScriptedReasoning::default();
    reasoning.push_error("401 unauthorized: invalid api key");
    let f = fixture_with(&test_config(), reasoning, FakeGateway::default());

    let outcome = f.runtime.handle_event(&event("m1", "@bot hi", true)).await;

    assert_eq!(outcome, TriggerOutcome::Failed);
    assert_eq!(f.reasoning.calls(), 1);
    let sent = f.gateway.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].text, OrchestratorConfig::default().apology_message);
    assert_eq!(sent[0].reply_to, Some("m1".into()));
    f.runtime.shutdown().await;
}
