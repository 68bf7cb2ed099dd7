use super::action::{DeliveryStrategy, Priority};
use crate::conversation::{AuthorId, ConversationId};
use crate::error::ProactiveError;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FollowupStatus {
    Pending,
    Completed,
    Expired,
    Archived,
}

/// Something the agent promised, or decided, to bring up later.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FollowupItem {
    pub id: String,
    pub conversation: ConversationId,
    pub target: AuthorId,
    pub reason: String,
    pub priority: Priority,
    pub delivery: DeliveryStrategy,
    pub due_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    /// Set when the item reaches `completed`.
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    pub status: FollowupStatus,
}

impl FollowupItem {
    pub fn new(
        conversation: ConversationId,
        target: AuthorId,
        reason: impl Into<String>,
        priority: Priority,
        delivery: DeliveryStrategy,
        due_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            conversation,
            target,
            reason: reason.into(),
            priority,
            delivery,
            due_at,
            created_at: Utc::now(),
            completed_at: None,
            status: FollowupStatus::Pending,
        }
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status == FollowupStatus::Pending && self.due_at <= now
    }
}

/// Counts from one maintenance pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub expired: usize,
    pub archived: usize,
}

impl SweepReport {
    pub fn is_empty(&self) -> bool {
        self.expired == 0 && self.archived == 0
    }
}

/// Storage for follow-up items.
pub trait FollowupStore: Send + Sync {
    fn insert(&self, item: FollowupItem) -> Result<(), ProactiveError>;

    fn pending(&self, conversation: &ConversationId) -> Result<Vec<FollowupItem>, ProactiveError>;

    fn set_status(
        &self,
        id: &str,
        status: FollowupStatus,
        at: DateTime<Utc>,
    ) -> Result<(), ProactiveError>;

    /// Expire stale pending items and archive old completed ones.
    fn sweep(&self, max_age: Duration, now: DateTime<Utc>) -> Result<SweepReport, ProactiveError>;
}

#[derive(Debug, Default)]
pub struct InMemoryFollowupStore {
    items: Mutex<BTreeMap<String, FollowupItem>>,
}

impl InMemoryFollowupStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, FollowupItem>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self, id: &str) -> Option<FollowupItem> {
        self.lock().get(id).cloned()
    }
}

impl FollowupStore for InMemoryFollowupStore {
    fn insert(&self, item: FollowupItem) -> Result<(), ProactiveError> {
        self.lock().insert(item.id.clone(), item);
        Ok(())
    }

    fn pending(&self, conversation: &ConversationId) -> Result<Vec<FollowupItem>, ProactiveError> {
        let mut pending: Vec<FollowupItem> = self
            .lock()
            .values()
            .filter(|item| {
                item.status == FollowupStatus::Pending && &item.conversation == conversation
            })
            .cloned()
            .collect();
        pending.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.due_at.cmp(&b.due_at)));
        Ok(pending)
    }

    fn set_status(
        &self,
        id: &str,
        status: FollowupStatus,
        at: DateTime<Utc>,
    ) -> Result<(), ProactiveError> {
        let mut items = self.lock();
        let item = items
            .get_mut(id)
            .ok_or_else(|| ProactiveError::Store(format!("unknown follow-up {id}")))?;
        item.status = status;
        if status == FollowupStatus::Completed {
            item.completed_at = Some(at);
        }
        Ok(())
    }

    fn sweep(&self, max_age: Duration, now: DateTime<Utc>) -> Result<SweepReport, ProactiveError> {
        let Some(cutoff) = now.checked_sub_signed(max_age) else {
            return Ok(SweepReport::default());
        };
        let mut report = SweepReport::default();
        for item in self.lock().values_mut() {
            match item.status {
                FollowupStatus::Pending if item.created_at < cutoff => {
                    item.status = FollowupStatus::Expired;
                    report.expired += 1;
                }
                FollowupStatus::Completed
                    if item.completed_at.unwrap_or(item.created_at) < cutoff =>
                {
                    item.status = FollowupStatus::Archived;
                    report.archived += 1;
                }
                _ => {}
            }
        }
        Ok(report)
    }
}
