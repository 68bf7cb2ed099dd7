use crate::conversation::{AuthorId, ConversationId, SentId, TriggerId};
use chrono::{DateTime, Utc};
use std::future::Future;
use std::pin::Pin;

/// Default transport limit when a platform does not advertise one.
pub const DEFAULT_MAX_MESSAGE_LENGTH: usize = 2000;

/// Chat platform gateway. Implement for any messaging platform.
pub trait ChatGateway: Send + Sync {
    /// Human-readable platform name
    fn name(&self) -> &str;

    fn max_message_length(&self) -> usize {
        DEFAULT_MAX_MESSAGE_LENGTH
    }

    /// Send one message. `reply_to` threads it under an inbound message.
    fn send<'a>(
        &'a self,
        conversation: &'a ConversationId,
        text: &'a str,
        reply_to: Option<&'a TriggerId>,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<SentId>> + Send + 'a>>;

    fn send_typing<'a>(
        &'a self,
        _conversation: &'a ConversationId,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>> {
        Box::pin(async { Ok(()) })
    }

    /// Whether `sent` drew a reaction, or a later message from `author`
    /// (any participant when `None`), since `since`.
    fn observe_engagement<'a>(
        &'a self,
        conversation: &'a ConversationId,
        sent: &'a SentId,
        author: Option<&'a AuthorId>,
        since: DateTime<Utc>,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<bool>> + Send + 'a>>;
}
