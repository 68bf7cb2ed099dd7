use chrono::{Duration, Utc};
use parley::ConversationId;
use parley::TriggerOutcome;
use parley::admission::{AdmissionReason, RateLimiter};
use parley::config::RateLimitConfig;

use super::chat_harness::{end_turn, event, fixture, test_config};

#[test]
fn twenty_first_response_in_short_window_is_refused() {
    let limiter = RateLimiter::new(RateLimitConfig::default());
    let conversation = ConversationId::new("general");
    let now = Utc::now();
    for i in 0..20 {
        let at = now - Duration::minutes(4) + Duration::seconds(i * 10);
        assert!(limiter.can_respond_at(&conversation, at).allowed);
        limiter.record_response_at(&conversation, at);
    }

    let admission = limiter.can_respond_at(&conversation, now);
    assert!(!admission.allowed);
    assert_eq!(admission.reason, AdmissionReason::RateLimitShort);

    // The short window slides past the burst.
    let later = now + Duration::minutes(5);
    assert!(limiter.can_respond_at(&conversation, later).allowed);
}

#[test]
fn ignored_threshold_silences_until_engagement() {
    let limiter = RateLimiter::new(RateLimitConfig::default());
    let conversation = ConversationId::new("general");
    for _ in 0..5 {
        limiter.record_ignored(&conversation);
    }

    let admission = limiter.can_respond(&conversation);
    assert!(!admission.allowed);
    assert_eq!(admission.reason, AdmissionReason::IgnoredThreshold);

    limiter.record_engagement(&conversation);
    assert_eq!(limiter.ignored_count(&conversation), 4);
    assert!(limiter.can_respond(&conversation).allowed);
}

#[tokio::test]
async fn silenced_conversation_still_answers_mentions() {
    let f = fixture(&test_config(), vec![end_turn(&["I'm here"])]);
    let limiter = f.runtime.orchestrator().rate_limiter().clone();
    for _ in 0..5 {
        limiter.record_ignored(&"general".into());
    }

    let periodic = f.runtime.handle_event(&event("m1", "anyone around?", false)).await;
    assert_eq!(
        periodic,
        TriggerOutcome::Throttled(AdmissionReason::IgnoredThreshold)
    );

    let mention = f.runtime.handle_event(&event("m2", "@bot you there?", true)).await;
    assert_eq!(mention, TriggerOutcome::Replied { chunks: 1 });
    assert_eq!(f.reasoning.calls(), 1);
    f.runtime.shutdown().await;
}

#[tokio::test]
async fn redelivered_trigger_is_ignored() {
    let f = fixture(&test_config(), vec![end_turn(&["hello"]), end_turn(&["again"])]);
    let mention = event("m1", "@bot hi", true);

    assert_eq!(
        f.runtime.handle_event(&mention).await,
        TriggerOutcome::Replied { chunks: 1 }
    );
    assert_eq!(
        f.runtime.handle_event(&mention).await,
        TriggerOutcome::Duplicate
    );
    assert_eq!(f.gateway.sent().len(), 1);
    f.runtime.shutdown().await;
}
