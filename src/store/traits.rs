use crate::conversation::{AuthorId, ConversationId, TriggerId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredMessage {
    pub id: TriggerId,
    pub author: AuthorId,
    pub author_name: String,
    pub content: String,
    pub sent_at: DateTime<Utc>,
}

/// Read-only view of persisted chat history.
pub trait MessageStore: Send + Sync {
    /// Up to `limit` most recent messages, oldest first, skipping any id in
    /// `exclude`.
    fn read_recent<'a>(
        &'a self,
        conversation: &'a ConversationId,
        limit: usize,
        exclude: &'a [TriggerId],
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Vec<StoredMessage>>> + Send + 'a>>;

    /// Every conversation the store has seen activity in.
    fn conversations(
        &self,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Vec<ConversationId>>> + Send + '_>>;

    fn last_activity<'a>(
        &'a self,
        conversation: &'a ConversationId,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Option<DateTime<Utc>>>> + Send + 'a>>;

    fn last_activity_by<'a>(
        &'a self,
        conversation: &'a ConversationId,
        author: &'a AuthorId,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Option<DateTime<Utc>>>> + Send + 'a>>;
}
