use super::traits::{MessageStore, StoredMessage};
use crate::conversation::{AuthorId, ConversationId, TriggerId};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Message store kept in process memory. Messages are appended in arrival
/// order per conversation.
#[derive(Debug, Default)]
pub struct InMemoryMessageStore {
    conversations: Mutex<HashMap<ConversationId, Vec<StoredMessage>>>,
}

impl InMemoryMessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ConversationId, Vec<StoredMessage>>> {
        self.conversations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn append(&self, conversation: &ConversationId, message: StoredMessage) {
        self.lock()
            .entry(conversation.clone())
            .or_default()
            .push(message);
    }

    fn recent(
        &self,
        conversation: &ConversationId,
        limit: usize,
        exclude: &[TriggerId],
    ) -> Vec<StoredMessage> {
        let guard = self.lock();
        let Some(messages) = guard.get(conversation) else {
            return Vec::new();
        };
        let mut recent: Vec<StoredMessage> = messages
            .iter()
            .rev()
            .filter(|message| !exclude.contains(&message.id))
            .take(limit)
            .cloned()
            .collect();
        recent.reverse();
        recent
    }

    fn latest(
        &self,
        conversation: &ConversationId,
        author: Option<&AuthorId>,
    ) -> Option<DateTime<Utc>> {
        self.lock().get(conversation).and_then(|messages| {
            messages
                .iter()
                .filter(|message| author.is_none_or(|author| &message.author == author))
                .map(|message| message.sent_at)
                .max()
        })
    }
}

impl MessageStore for InMemoryMessageStore {
    fn read_recent<'a>(
        &'a self,
        conversation: &'a ConversationId,
        limit: usize,
        exclude: &'a [TriggerId],
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Vec<StoredMessage>>> + Send + 'a>> {
        Box::pin(async move { Ok(self.recent(conversation, limit, exclude)) })
    }

    fn conversations(
        &self,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Vec<ConversationId>>> + Send + '_>> {
        Box::pin(async move {
            let mut ids: Vec<ConversationId> = self.lock().keys().cloned().collect();
            ids.sort();
            Ok(ids)
        })
    }

    fn last_activity<'a>(
        &'a self,
        conversation: &'a ConversationId,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Option<DateTime<Utc>>>> + Send + 'a>> {
        Box::pin(async move { Ok(self.latest(conversation, None)) })
    }

    fn last_activity_by<'a>(
        &'a self,
        conversation: &'a ConversationId,
        author: &'a AuthorId,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Option<DateTime<Utc>>>> + Send + 'a>> {
        Box::pin(async move { Ok(self.latest(conversation, Some(author))) })
    }
}
