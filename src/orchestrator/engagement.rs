use crate::admission::RateLimiter;
use crate::channels::ChatGateway;
use crate::conversation::{AuthorId, ConversationId, SentId, TriggerId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// Outcome of one delayed engagement probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngagementRecord {
    pub trigger: Option<TriggerId>,
    pub conversation: ConversationId,
    pub sent: SentId,
    pub sent_at: DateTime<Utc>,
    pub engaged: bool,
}

/// Optional persistence hook for probe outcomes.
pub trait EngagementSink: Send + Sync {
    fn record<'a>(
        &'a self,
        record: &'a EngagementRecord,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngagementStats {
    pub samples: usize,
    pub engaged: usize,
}

impl EngagementStats {
    pub fn success_rate(&self) -> Option<f64> {
        if self.samples == 0 {
            return None;
        }
        #[allow(clippy::cast_precision_loss)]
        let rate = self.engaged as f64 / self.samples as f64;
        Some(rate)
    }
}

const LEDGER_HISTORY: usize = 100;

/// Recent probe outcomes per conversation, newest last.
#[derive(Debug, Default)]
pub struct EngagementLedger {
    records: Mutex<HashMap<ConversationId, VecDeque<EngagementRecord>>>,
}

impl EngagementLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ConversationId, VecDeque<EngagementRecord>>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn push(&self, record: EngagementRecord) {
        let mut records = self.lock();
        let history = records.entry(record.conversation.clone()).or_default();
        if history.len() == LEDGER_HISTORY {
            history.pop_front();
        }
        history.push_back(record);
    }

    pub fn stats(&self, conversation: &ConversationId) -> EngagementStats {
        self.lock()
            .get(conversation)
            .map_or_else(EngagementStats::default, |history| EngagementStats {
                samples: history.len(),
                engaged: history.iter().filter(|record| record.engaged).count(),
            })
    }

    pub fn records(&self, conversation: &ConversationId) -> Vec<EngagementRecord> {
        self.lock()
            .get(conversation)
            .map(|history| history.iter().cloned().collect())
            .unwrap_or_default()
    }
}

/// A sent message waiting to be probed.
#[derive(Debug, Clone)]
pub struct ProbeTarget {
    pub conversation: ConversationId,
    pub sent: SentId,
    pub trigger: Option<TriggerId>,
    pub author: Option<AuthorId>,
    pub sent_at: DateTime<Utc>,
}

/// Spawns delayed, cancellable checks of whether a reply drew engagement.
#[derive(Clone)]
pub struct EngagementProbe {
    gateway: Arc<dyn ChatGateway>,
    rate_limiter: Arc<RateLimiter>,
    ledger: Arc<EngagementLedger>,
    sink: Option<Arc<dyn EngagementSink>>,
    delay: Duration,
    tracker: TaskTracker,
    cancel: CancellationToken,
}

impl EngagementProbe {
    pub fn new(
        gateway: Arc<dyn ChatGateway>,
        rate_limiter: Arc<RateLimiter>,
        ledger: Arc<EngagementLedger>,
        delay: Duration,
    ) -> Self {
        Self {
            gateway,
            rate_limiter,
            ledger,
            sink: None,
            delay,
            tracker: TaskTracker::new(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn EngagementSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn with_tasks(mut self, tracker: TaskTracker, cancel: CancellationToken) -> Self {
        self.tracker = tracker;
        self.cancel = cancel;
        self
    }

    pub fn tracker(&self) -> &TaskTracker {
        &self.tracker
    }

    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    pub fn spawn(&self, target: ProbeTarget) {
        if self.cancel.is_cancelled() {
            tracing::debug!(conversation = %target.conversation, "Shutting down, probe not scheduled");
            return;
        }
        let probe = self.clone();
        self.tracker.spawn(async move {
            tokio::select! {
                () = probe.cancel.cancelled() => {
                    tracing::debug!(conversation = %target.conversation, "Engagement probe cancelled");
                }
                () = tokio::time::sleep(probe.delay) => {
                    probe.observe(target).await;
                }
            }
        });
    }

    async fn observe(&self, target: ProbeTarget) {
        let engaged = match self
            .gateway
            .observe_engagement(
                &target.conversation,
                &target.sent,
                target.author.as_ref(),
                target.sent_at,
            )
            .await
        {
            Ok(engaged) => engaged,
            Err(error) => {
                tracing::warn!(
                    conversation = %target.conversation,
                    sent = %target.sent,
                    "Engagement probe failed, no signal recorded: {error:#}"
                );
                return;
            }
        };

        if engaged {
            self.rate_limiter.record_engagement(&target.conversation);
        } else {
            self.rate_limiter.record_ignored(&target.conversation);
        }
        tracing::debug!(
            conversation = %target.conversation,
            sent = %target.sent,
            engaged,
            "Engagement probe finished"
        );

        let record = EngagementRecord {
            trigger: target.trigger,
            conversation: target.conversation,
            sent: target.sent,
            sent_at: target.sent_at,
            engaged,
        };
        if let Some(sink) = &self.sink
            && let Err(error) = sink.record(&record).await
        {
            tracing::warn!(conversation = %record.conversation, "Engagement sink failed: {error:#}");
        }
        self.ledger.push(record);
    }

    /// Cancel pending probes and wait for every tracked task to finish.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        self.tracker.close();
        self.tracker.wait().await;
    }
}
