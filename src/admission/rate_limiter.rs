use crate::config::RateLimitConfig;
use crate::conversation::ConversationId;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, PoisonError};

/// Why an admission check came out the way it did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AdmissionReason {
    None,
    RateLimitShort,
    RateLimitLong,
    IgnoredThreshold,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Admission {
    pub allowed: bool,
    pub reason: AdmissionReason,
}

impl Admission {
    pub const fn allow() -> Self {
        Self {
            allowed: true,
            reason: AdmissionReason::None,
        }
    }

    pub const fn deny(reason: AdmissionReason) -> Self {
        Self {
            allowed: false,
            reason,
        }
    }
}

#[derive(Debug, Clone, Default)]
struct RateLimitState {
    short_window: VecDeque<DateTime<Utc>>,
    long_window: VecDeque<DateTime<Utc>>,
    ignored_count: u32,
}

impl RateLimitState {
    fn prune(&mut self, now: DateTime<Utc>, short: Duration, long: Duration) {
        prune_window(&mut self.short_window, now - short);
        prune_window(&mut self.long_window, now - long);
    }
}

fn prune_window(window: &mut VecDeque<DateTime<Utc>>, cutoff: DateTime<Utc>) {
    while window.front().is_some_and(|t| *t <= cutoff) {
        window.pop_front();
    }
}

/// Serializable copy of limiter state for an outer persistence layer.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RateLimitSnapshot {
    pub conversations: Vec<ConversationRateState>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConversationRateState {
    pub conversation: ConversationId,
    pub short_window: Vec<DateTime<Utc>>,
    pub long_window: Vec<DateTime<Utc>>,
    pub ignored_count: u32,
}

/// Sliding-window admission control with ignore-based adaptive silencing.
///
/// State is process-local and resets on restart. Use [`snapshot`](Self::snapshot)
/// and [`restore`](Self::restore) to carry it across restarts.
#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitConfig,
    states: Mutex<HashMap<ConversationId, RateLimitState>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            states: Mutex::new(HashMap::new()),
        }
    }

    fn short_window(&self) -> Duration {
        Duration::minutes(i64::from(self.config.short_window_minutes))
    }

    fn long_window(&self) -> Duration {
        Duration::minutes(i64::from(self.config.long_window_minutes))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<ConversationId, RateLimitState>> {
        self.states.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn can_respond(&self, conversation: &ConversationId) -> Admission {
        self.can_respond_at(conversation, Utc::now())
    }

    pub fn can_respond_at(&self, conversation: &ConversationId, now: DateTime<Utc>) -> Admission {
        let (short, long) = (self.short_window(), self.long_window());
        let mut states = self.lock();
        let Some(state) = states.get_mut(conversation) else {
            return Admission::allow();
        };
        state.prune(now, short, long);

        if state.short_window.len() >= self.config.short_window_max {
            return Admission::deny(AdmissionReason::RateLimitShort);
        }
        if state.long_window.len() >= self.config.long_window_max {
            return Admission::deny(AdmissionReason::RateLimitLong);
        }
        if state.ignored_count >= self.config.ignore_threshold {
            return Admission::deny(AdmissionReason::IgnoredThreshold);
        }
        Admission::allow()
    }

    pub fn record_response(&self, conversation: &ConversationId) {
        self.record_response_at(conversation, Utc::now());
    }

    pub fn record_response_at(&self, conversation: &ConversationId, now: DateTime<Utc>) {
        let (short, long) = (self.short_window(), self.long_window());
        let mut states = self.lock();
        let state = states.entry(conversation.clone()).or_default();
        state.prune(now, short, long);
        state.short_window.push_back(now);
        state.long_window.push_back(now);
    }

    /// A sent reply drew no reaction or follow-up before the probe timed out.
    pub fn record_ignored(&self, conversation: &ConversationId) {
        let threshold = self.config.ignore_threshold;
        let mut states = self.lock();
        let state = states.entry(conversation.clone()).or_default();
        if state.ignored_count >= threshold {
            return;
        }
        state.ignored_count += 1;
        if state.ignored_count == threshold {
            tracing::info!(
                conversation = %conversation,
                ignored = state.ignored_count,
                "Conversation silenced after repeated ignored replies"
            );
        } else {
            tracing::debug!(
                conversation = %conversation,
                ignored = state.ignored_count,
                "Reply went unanswered"
            );
        }
    }

    pub fn record_engagement(&self, conversation: &ConversationId) {
        let threshold = self.config.ignore_threshold;
        let mut states = self.lock();
        let Some(state) = states.get_mut(conversation) else {
            return;
        };
        if state.ignored_count == 0 {
            return;
        }
        let was_silenced = state.ignored_count >= threshold;
        state.ignored_count -= 1;
        if was_silenced {
            tracing::info!(
                conversation = %conversation,
                ignored = state.ignored_count,
                "Engagement observed, conversation no longer silenced"
            );
        }
    }

    /// Manual override: forget everything known about `conversation`.
    pub fn reset(&self, conversation: &ConversationId) {
        if self.lock().remove(conversation).is_some() {
            tracing::info!(conversation = %conversation, "Rate limit state reset");
        }
    }

    pub fn ignored_count(&self, conversation: &ConversationId) -> u32 {
        self.lock()
            .get(conversation)
            .map_or(0, |state| state.ignored_count)
    }

    pub fn snapshot(&self) -> RateLimitSnapshot {
        let states = self.lock();
        let mut conversations: Vec<ConversationRateState> = states
            .iter()
            .map(|(id, state)| ConversationRateState {
                conversation: id.clone(),
                short_window: state.short_window.iter().copied().collect(),
                long_window: state.long_window.iter().copied().collect(),
                ignored_count: state.ignored_count,
            })
            .collect();
        conversations.sort_by(|a, b| a.conversation.cmp(&b.conversation));
        RateLimitSnapshot { conversations }
    }

    /// Replace current state with `snapshot`. Ignore counts are clamped to the threshold.
    pub fn restore(&self, snapshot: RateLimitSnapshot) {
        let threshold = self.config.ignore_threshold;
        let mut states = self.lock();
        states.clear();
        for entry in snapshot.conversations {
            let mut short_window: Vec<_> = entry.short_window;
            let mut long_window: Vec<_> = entry.long_window;
            short_window.sort();
            long_window.sort();
            states.insert(
                entry.conversation,
                RateLimitState {
                    short_window: short_window.into(),
                    long_window: long_window.into(),
                    ignored_count: entry.ignored_count.min(threshold),
                },
            );
        }
    }
}
