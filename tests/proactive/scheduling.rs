use chrono::{Duration, Utc};
use parley::proactive::{DeliveryStrategy, FollowupItem, FollowupStatus, FollowupStore, Priority};
use parley::reasoning::ContentBlock;

use super::chat_harness::{Fixture, end_turn, fixture, message, test_config};

fn with_followup(f: &Fixture) -> String {
    let now = Utc::now();
    f.store.append(
        &"general".into(),
        message("h1", "u1", "big interview tomorrow", now - Duration::minutes(30)),
    );
    let item = FollowupItem::new(
        "general".into(),
        "u1".into(),
        "ask how the interview went",
        Priority::High,
        DeliveryStrategy::Standalone,
        now - Duration::minutes(5),
    );
    let id = item.id.clone();
    f.followups.insert(item).unwrap();
    id
}

#[tokio::test]
async fn due_followup_goes_out_through_the_orchestrator() {
    let f = fixture(&test_config(), vec![end_turn(&["How did the interview go?"])]);
    let id = with_followup(&f);

    let report = f.runtime.scheduler().tick_at(Utc::now()).await.unwrap();

    assert_eq!(report.fired, 1);
    assert_eq!(f.followups.get(&id).unwrap().status, FollowupStatus::Completed);
    let sent = f.gateway.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].text, "How did the interview go?");
    assert_eq!(sent[0].reply_to, None);

    let transcript = &f.reasoning.requests()[0].transcript;
    let ContentBlock::Text { text, .. } = transcript.last().unwrap().content.last().unwrap() else {
        panic!("expected a text turn");
    };
    assert!(text.contains("[scheduled task] Follow up with <@u1>: ask how the interview went"));
    f.runtime.shutdown().await;
}

#[tokio::test]
async fn silenced_conversation_keeps_followup_pending() {
    let f = fixture(&test_config(), vec![end_turn(&["unused"])]);
    let id = with_followup(&f);
    let limiter = f.runtime.orchestrator().rate_limiter().clone();
    for _ in 0..5 {
        limiter.record_ignored(&"general".into());
    }

    let now = Utc::now();
    let report = f.runtime.scheduler().tick_at(now).await.unwrap();

    assert_eq!(report.fired, 0);
    assert_eq!(f.followups.get(&id).unwrap().status, FollowupStatus::Pending);
    assert_eq!(f.reasoning.calls(), 0);
    assert!(f.gateway.sent().is_empty());
    assert_eq!(
        f.runtime.scheduler().budget().used_at(&"general".into(), now),
        (0, 0)
    );
    f.runtime.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn started_runtime_ticks_immediately() {
    let f = fixture(&test_config(), vec![end_turn(&["Good luck today!"])]);
    let id = with_followup(&f);

    f.runtime.start();
    tokio::time::sleep(std::time::Duration::from_secs(1)).await;
    f.runtime.shutdown().await;

    assert_eq!(f.followups.get(&id).unwrap().status, FollowupStatus::Completed);
    assert_eq!(f.gateway.sent().len(), 1);
}

#[tokio::test]
async fn disabled_scheduler_does_not_start() {
    let mut config = test_config();
    config.proactive.enabled = false;
    let f = fixture(&config, vec![end_turn(&["unused"])]);
    let id = with_followup(&f);

    f.runtime.start();
    tokio::task::yield_now().await;
    f.runtime.shutdown().await;

    assert_eq!(f.followups.get(&id).unwrap().status, FollowupStatus::Pending);
    assert_eq!(f.reasoning.calls(), 0);
}
