use chrono::{Duration, Utc};
use parley::TriggerOutcome;
use parley::reasoning::{Citation, ContentBlock, ReasoningResponse, StopReason};

use super::chat_harness::{
    FakeGateway, ScriptedReasoning, end_turn, event, fixture, fixture_with, message, test_config,
};

#[tokio::test]
async fn long_reply_is_split_and_only_the_first_chunk_threads() {
    let text = "The first paragraph is short.\n\nThe second one is a little longer than that.";
    let f = fixture_with(
        &test_config(),
        ScriptedReasoning::new(vec![end_turn(&[text])]),
        FakeGateway::with_max_length(32),
    );

    let outcome = f.runtime.handle_event(&event("m1", "@bot go on", true)).await;

    let sent = f.gateway.sent();
    assert_eq!(outcome, TriggerOutcome::Replied { chunks: sent.len() });
    assert!(sent.len() >= 2);
    assert!(sent.iter().all(|s| s.text.chars().count() <= 32));
    assert_eq!(sent[0].reply_to, Some("m1".into()));
    assert!(sent[1..].iter().all(|s| s.reply_to.is_none()));

    let rejoined: String = sent.iter().map(|s| s.text.as_str()).collect();
    let squash = |s: &str| s.split_whitespace().collect::<Vec<_>>().join(" ");
    assert_eq!(squash(&rejoined), squash(text));
    f.runtime.shutdown().await;
}

#[tokio::test]
async fn citations_are_listed_once_after_the_text() {
    let cited = |url: &str| ContentBlock::Text {
        text: format!("see {url}. "),
        citations: vec![Citation {
            url: url.into(),
            title: Some("Docs".into()),
        }],
    };
    let response = ReasoningResponse {
        stop_reason: StopReason::EndTurn,
        content: vec![
            cited("https://example.com/a"),
            cited("https://example.com/a"),
            ContentBlock::text("Done."),
        ],
        usage: None,
    };
    let f = fixture(&test_config(), vec![response]);

    f.runtime.handle_event(&event("m1", "@bot source?", true)).await;

    let text = &f.gateway.sent()[0].text;
    assert!(text.starts_with("see https://example.com/a. see https://example.com/a. Done."));
    assert!(text.ends_with("\n\nSources:\n- Docs <https://example.com/a>"));
    f.runtime.shutdown().await;
}

#[tokio::test]
async fn history_is_folded_into_the_transcript() {
    let f = fixture(&test_config(), vec![end_turn(&["sounds fun"])]);
    let now = Utc::now();
    f.store.append(
        &"general".into(),
        message("h1", "u2", "movie night friday?", now - Duration::minutes(3)),
    );
    f.store.append(
        &"general".into(),
        message("h2", "u3", "I'm in", now - Duration::minutes(2)),
    );
    let mention = event("m1", "@bot are you coming?", true);
    f.store.append(
        &"general".into(),
        message("m1", "u1", "@bot are you coming?", now),
    );

    f.runtime.handle_event(&mention).await;

    let transcript = &f.reasoning.requests()[0].transcript;
    // Consecutive user turns merge, and the trigger itself is the final turn
    // rather than a duplicated history entry.
    assert_eq!(transcript.len(), 1);
    let ContentBlock::Text { text, .. } = &transcript[0].content[0] else {
        panic!("expected text");
    };
    assert!(text.contains("u2: movie night friday?"));
    assert!(text.contains("I'm in"));
    assert_eq!(text.matches("are you coming?").count(), 1);
    f.runtime.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn unanswered_reply_counts_as_ignored() {
    let f = fixture(&test_config(), vec![end_turn(&["anyone?"])]);

    f.runtime.handle_event(&event("m1", "@bot ping", true)).await;
    tokio::time::sleep(std::time::Duration::from_secs(301)).await;
    f.runtime.shutdown().await;

    let orchestrator = f.runtime.orchestrator();
    assert_eq!(f.gateway.probes(), 1);
    assert_eq!(orchestrator.rate_limiter().ignored_count(&"general".into()), 1);
    assert_eq!(
        orchestrator.engagement_ledger().stats(&"general".into()).samples,
        1
    );
}
