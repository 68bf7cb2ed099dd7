use crate::conversation::{AuthorId, ConversationId, TriggerId};
use crate::error::OrchestratorError;
use crate::reasoning::{ContentBlock, Message, MessageRole};
use crate::store::{MessageStore, StoredMessage};

fn to_turn(message: &StoredMessage, agent: &AuthorId) -> Message {
    if &message.author == agent {
        Message::assistant(message.content.clone())
    } else {
        Message::user(format!("{}: {}", message.author_name, message.content))
    }
}

/// Fold consecutive same-role turns together and drop leading assistant
/// turns, so the transcript alternates and opens with the user.
fn push_turn(transcript: &mut Vec<Message>, turn: Message) {
    if transcript.is_empty() && turn.role == MessageRole::Assistant {
        return;
    }
    match transcript.last_mut() {
        Some(last) if last.role == turn.role => {
            for block in turn.content {
                if let ContentBlock::Text { text: next, .. } = &block
                    && let Some(ContentBlock::Text { text, .. }) = last.content.last_mut()
                {
                    text.push('\n');
                    text.push_str(next);
                    continue;
                }
                last.content.push(block);
            }
        }
        _ => transcript.push(turn),
    }
}

/// Recent history followed by `final_turn` as the closing user turn.
pub async fn assemble(
    store: &dyn MessageStore,
    conversation: &ConversationId,
    agent: &AuthorId,
    limit: usize,
    exclude: &[TriggerId],
    final_turn: String,
) -> Result<Vec<Message>, OrchestratorError> {
    let history = store
        .read_recent(conversation, limit, exclude)
        .await
        .map_err(|e| OrchestratorError::Store(format!("{e:#}")))?;

    let mut transcript = Vec::with_capacity(history.len() + 1);
    for message in &history {
        push_turn(&mut transcript, to_turn(message, agent));
    }
    push_turn(&mut transcript, Message::user(final_turn));

    tracing::debug!(
        conversation = %conversation,
        history = history.len(),
        turns = transcript.len(),
        "Assembled context"
    );
    Ok(transcript)
}
