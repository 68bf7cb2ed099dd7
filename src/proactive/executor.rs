use crate::admission::Admission;
use crate::conversation::ConversationId;
use crate::error::ParleyError;
use crate::orchestrator::{AutonomousOutcome, ResponseOrchestrator};
use std::future::Future;
use std::pin::Pin;

/// Runs an autonomous instruction against a conversation.
///
/// The scheduler only sees this seam, so tests can drive it without a
/// reasoning service.
pub trait ActionExecutor: Send + Sync {
    /// Whether the conversation would accept an autonomous message now.
    fn admission(&self, conversation: &ConversationId) -> Admission;

    fn run_autonomous<'a>(
        &'a self,
        conversation: &'a ConversationId,
        instruction: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<AutonomousOutcome, ParleyError>> + Send + 'a>>;
}

impl ActionExecutor for ResponseOrchestrator {
    fn admission(&self, conversation: &ConversationId) -> Admission {
        self.rate_limiter().can_respond(conversation)
    }

    fn run_autonomous<'a>(
        &'a self,
        conversation: &'a ConversationId,
        instruction: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<AutonomousOutcome, ParleyError>> + Send + 'a>> {
        Box::pin(ResponseOrchestrator::run_autonomous(
            self,
            conversation,
            instruction,
        ))
    }
}
