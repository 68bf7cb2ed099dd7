use crate::channels::{ChatGateway, split_for_transport};
use crate::conversation::{ConversationId, SentId, TriggerId};
use crate::error::TransportError;

/// What landed on the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub sent: Vec<SentId>,
    pub attempted: usize,
}

impl Delivery {
    pub fn first(&self) -> Option<&SentId> {
        self.sent.first()
    }

    pub fn is_partial(&self) -> bool {
        self.sent.len() < self.attempted
    }
}

/// Send `text` in transport-sized chunks.
///
/// The first chunk threads under `reply_to` and falls back to a standalone
/// send if that fails. Later failures are skipped. Only total silence is an
/// error.
pub async fn deliver(
    gateway: &dyn ChatGateway,
    conversation: &ConversationId,
    text: &str,
    reply_to: Option<&TriggerId>,
) -> Result<Delivery, TransportError> {
    let chunks: Vec<String> = split_for_transport(text, gateway.max_message_length())
        .into_iter()
        .filter(|chunk| !chunk.trim().is_empty())
        .collect();

    let mut sent = Vec::with_capacity(chunks.len());
    let mut last_failure = None;
    for (index, chunk) in chunks.iter().enumerate() {
        let threaded = if index == 0 { reply_to } else { None };
        match send_chunk(gateway, conversation, chunk, threaded).await {
            Ok(id) => sent.push(id),
            Err(error) if threaded.is_some() => {
                tracing::warn!(
                    conversation = %conversation,
                    "Reply send failed, retrying standalone: {error}"
                );
                match send_chunk(gateway, conversation, chunk, None).await {
                    Ok(id) => sent.push(id),
                    Err(error) => {
                        tracing::warn!(
                            conversation = %conversation,
                            chunk = index,
                            "Standalone fallback failed: {error}"
                        );
                        last_failure = Some(error);
                    }
                }
            }
            Err(error) => {
                tracing::warn!(
                    conversation = %conversation,
                    chunk = index,
                    "Chunk send failed, continuing: {error}"
                );
                last_failure = Some(error);
            }
        }
    }

    if sent.is_empty() {
        return Err(TransportError::NothingDelivered {
            conversation: conversation.to_string(),
            attempted: chunks.len(),
            last: last_failure.map(Box::new),
        });
    }

    let delivery = Delivery {
        sent,
        attempted: chunks.len(),
    };
    if delivery.is_partial() {
        tracing::warn!(
            conversation = %conversation,
            delivered = delivery.sent.len(),
            attempted = delivery.attempted,
            "Partial delivery"
        );
    }
    Ok(delivery)
}

async fn send_chunk(
    gateway: &dyn ChatGateway,
    conversation: &ConversationId,
    chunk: &str,
    reply_to: Option<&TriggerId>,
) -> Result<SentId, TransportError> {
    gateway
        .send(conversation, chunk, reply_to)
        .await
        .map_err(|error| TransportError::Send {
            conversation: conversation.to_string(),
            message: format!("{error:#}"),
        })
}
