pub mod claims;
pub mod context;
pub mod delivery;
pub mod engagement;
pub mod tool_loop;

#[cfg(test)]
pub(crate) mod test_support;

pub use claims::ClaimSet;
pub use delivery::{Delivery, deliver};
pub use engagement::{
    EngagementLedger, EngagementProbe, EngagementRecord, EngagementSink, EngagementStats,
    ProbeTarget,
};
pub use tool_loop::{
    LoopBudget, LoopStopReason, ToolCallRecord, ToolLoop, ToolLoopParams, ToolLoopResult,
    ToolLoopState, compose_reply,
};

use crate::admission::{AdmissionReason, RateLimiter};
use crate::channels::{ChatGateway, InboundEvent};
use crate::config::OrchestratorConfig;
use crate::conversation::{AuthorId, ConversationId, TriggerId};
use crate::error::ParleyError;
use crate::reasoning::ReasoningService;
use crate::resilience::{CircuitBreaker, RetryExecutor};
use crate::store::MessageStore;
use crate::tools::ToolRegistry;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum TriggerKind {
    /// The agent was addressed directly.
    Mention,
    /// Found by a periodic scan of the conversation.
    Periodic,
}

impl TriggerKind {
    pub fn classify(event: &InboundEvent, agent: &AuthorId) -> Self {
        if event.mentions(agent) {
            Self::Mention
        } else {
            Self::Periodic
        }
    }

    /// Urgent triggers skip admission control.
    pub fn is_urgent(self) -> bool {
        matches!(self, Self::Mention)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerOutcome {
    Replied { chunks: usize },
    /// The loop finished without anything to send.
    NoReply,
    Duplicate,
    Throttled(AdmissionReason),
    CoolingDown { until: DateTime<Utc> },
    /// Orchestration failed; an apology was attempted.
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AutonomousOutcome {
    Sent(Delivery),
    NoReply,
    Throttled(AdmissionReason),
}

/// Collaborators the orchestrator is built from.
pub struct OrchestratorDeps {
    pub agent: AuthorId,
    pub reasoning: Arc<dyn ReasoningService>,
    pub gateway: Arc<dyn ChatGateway>,
    pub store: Arc<dyn MessageStore>,
    pub tools: Arc<ToolRegistry>,
    pub rate_limiter: Arc<RateLimiter>,
    pub retry: Arc<RetryExecutor>,
    pub breaker: Arc<CircuitBreaker>,
}

pub struct ResponseOrchestrator {
    agent: AuthorId,
    gateway: Arc<dyn ChatGateway>,
    store: Arc<dyn MessageStore>,
    rate_limiter: Arc<RateLimiter>,
    config: OrchestratorConfig,
    tool_loop: ToolLoop,
    claims: Mutex<ClaimSet>,
    cooldowns: Mutex<HashMap<ConversationId, DateTime<Utc>>>,
    // One generation in flight process-wide. Partitioning per conversation
    // would raise throughput at the cost of divergent history views.
    generation_gate: tokio::sync::Mutex<()>,
    ledger: Arc<EngagementLedger>,
    probe: EngagementProbe,
}

impl ResponseOrchestrator {
    pub fn new(deps: OrchestratorDeps, config: OrchestratorConfig) -> Self {
        let ledger = Arc::new(EngagementLedger::new());
        let probe = EngagementProbe::new(
            deps.gateway.clone(),
            deps.rate_limiter.clone(),
            ledger.clone(),
            config.engagement_probe_delay(),
        );
        let tool_loop = ToolLoop::new(
            deps.reasoning,
            deps.tools,
            deps.retry,
            deps.breaker,
            ToolLoopParams {
                call_timeout: config.call_timeout(),
                max_tokens: config.max_tokens,
                thinking_budget: config.thinking_budget,
                fallback_message: config.fallback_message.clone(),
            },
        );
        Self {
            agent: deps.agent,
            gateway: deps.gateway,
            store: deps.store,
            rate_limiter: deps.rate_limiter,
            claims: Mutex::new(ClaimSet::new(config.claim_capacity)),
            cooldowns: Mutex::new(HashMap::new()),
            generation_gate: tokio::sync::Mutex::new(()),
            tool_loop,
            ledger,
            probe,
            config,
        }
    }

    pub fn with_engagement_sink(mut self, sink: Arc<dyn EngagementSink>) -> Self {
        self.probe = self.probe.with_sink(sink);
        self
    }

    /// Track probe tasks on an externally owned tracker and token.
    pub fn with_tasks(mut self, tracker: TaskTracker, cancel: CancellationToken) -> Self {
        self.probe = self.probe.with_tasks(tracker, cancel);
        self
    }

    pub fn agent(&self) -> &AuthorId {
        &self.agent
    }

    pub fn rate_limiter(&self) -> &Arc<RateLimiter> {
        &self.rate_limiter
    }

    pub fn engagement_ledger(&self) -> &Arc<EngagementLedger> {
        &self.ledger
    }

    pub fn store(&self) -> &Arc<dyn MessageStore> {
        &self.store
    }

    pub fn probes_in_flight(&self) -> usize {
        self.probe.in_flight()
    }

    pub fn cooldown_until(&self, conversation: &ConversationId) -> Option<DateTime<Utc>> {
        self.cooldowns
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(conversation)
            .copied()
    }

    fn try_claim(&self, trigger: &TriggerId) -> bool {
        self.claims
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .try_claim(trigger)
    }

    /// Handle one inbound trigger. Never returns an error: failures are
    /// logged and answered with an apology.
    pub async fn handle_trigger(&self, event: &InboundEvent, kind: TriggerKind) -> TriggerOutcome {
        let conversation = &event.conversation;

        // Claim and admission both happen before the first await.
        if !self.try_claim(&event.trigger_id) {
            tracing::debug!(trigger = %event.trigger_id, "Duplicate trigger dropped");
            return TriggerOutcome::Duplicate;
        }

        if kind == TriggerKind::Periodic
            && let Some(until) = self.cooldown_until(conversation)
            && until > Utc::now()
        {
            tracing::debug!(conversation = %conversation, %until, "Conversation cooling down");
            return TriggerOutcome::CoolingDown { until };
        }

        if !kind.is_urgent() {
            let admission = self.rate_limiter.can_respond(conversation);
            if !admission.allowed {
                tracing::info!(
                    conversation = %conversation,
                    reason = %admission.reason,
                    "Trigger throttled"
                );
                return TriggerOutcome::Throttled(admission.reason);
            }
        }

        match self.respond(event, kind).await {
            Ok(outcome) => outcome,
            Err(error) => {
                tracing::warn!(
                    conversation = %conversation,
                    trigger = %event.trigger_id,
                    kind = %kind,
                    "Trigger failed: {error:#}"
                );
                self.apologize(event).await;
                TriggerOutcome::Failed
            }
        }
    }

    async fn respond(
        &self,
        event: &InboundEvent,
        kind: TriggerKind,
    ) -> Result<TriggerOutcome, ParleyError> {
        let conversation = &event.conversation;
        self.indicate_typing(conversation).await;

        let budget = match kind {
            TriggerKind::Mention => LoopBudget::Unbounded,
            TriggerKind::Periodic => LoopBudget::Capped(self.config.background_iteration_cap),
        };
        let result = self
            .generate(
                conversation,
                std::slice::from_ref(&event.trigger_id),
                event.render(),
                budget,
            )
            .await?;
        if !result.has_reply() {
            return Ok(TriggerOutcome::NoReply);
        }

        let delivery = deliver(
            self.gateway.as_ref(),
            conversation,
            &result.final_text,
            Some(&event.trigger_id),
        )
        .await?;
        self.after_send(
            conversation,
            &delivery,
            Some(event.trigger_id.clone()),
            Some(event.author.clone()),
        );
        tracing::info!(
            conversation = %conversation,
            trigger = %event.trigger_id,
            chunks = delivery.sent.len(),
            iterations = result.iterations,
            "Reply sent"
        );
        Ok(TriggerOutcome::Replied {
            chunks: delivery.sent.len(),
        })
    }

    /// Run the capped loop on a scheduler instruction and send the result
    /// as standalone messages.
    pub async fn run_autonomous(
        &self,
        conversation: &ConversationId,
        instruction: &str,
    ) -> Result<AutonomousOutcome, ParleyError> {
        let admission = self.rate_limiter.can_respond(conversation);
        if !admission.allowed {
            return Ok(AutonomousOutcome::Throttled(admission.reason));
        }

        let result = self
            .generate(
                conversation,
                &[],
                format!("[scheduled task] {instruction}"),
                LoopBudget::Capped(self.config.background_iteration_cap),
            )
            .await?;
        if !result.has_reply() {
            return Ok(AutonomousOutcome::NoReply);
        }

        let delivery = deliver(self.gateway.as_ref(), conversation, &result.final_text, None).await?;
        self.after_send(conversation, &delivery, None, None);
        tracing::info!(
            conversation = %conversation,
            chunks = delivery.sent.len(),
            "Autonomous message sent"
        );
        Ok(AutonomousOutcome::Sent(delivery))
    }

    async fn generate(
        &self,
        conversation: &ConversationId,
        exclude: &[TriggerId],
        final_turn: String,
        budget: LoopBudget,
    ) -> Result<ToolLoopResult, ParleyError> {
        let _gate = self.generation_gate.lock().await;
        let transcript = context::assemble(
            self.store.as_ref(),
            conversation,
            &self.agent,
            self.config.context_limit,
            exclude,
            final_turn,
        )
        .await?;
        let result = self
            .tool_loop
            .run(&self.config.system_prompt, transcript, budget)
            .await?;
        Ok(result)
    }

    fn after_send(
        &self,
        conversation: &ConversationId,
        delivery: &Delivery,
        trigger: Option<TriggerId>,
        author: Option<AuthorId>,
    ) {
        let now = Utc::now();
        self.rate_limiter.record_response_at(conversation, now);

        let until = i64::try_from(self.config.cooldown_seconds)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .and_then(|cooldown| now.checked_add_signed(cooldown))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        self.cooldowns
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(conversation.clone(), until);

        if let Some(sent) = delivery.first() {
            self.probe.spawn(ProbeTarget {
                conversation: conversation.clone(),
                sent: sent.clone(),
                trigger,
                author,
                sent_at: now,
            });
        }
    }

    async fn indicate_typing(&self, conversation: &ConversationId) {
        if let Err(error) = self.gateway.send_typing(conversation).await {
            tracing::debug!(conversation = %conversation, "Typing indicator failed: {error:#}");
        }
    }

    async fn apologize(&self, event: &InboundEvent) {
        if let Err(error) = deliver(
            self.gateway.as_ref(),
            &event.conversation,
            &self.config.apology_message,
            Some(&event.trigger_id),
        )
        .await
        {
            tracing::warn!(conversation = %event.conversation, "Apology could not be delivered: {error}");
        }
    }

    /// Cancel pending engagement probes and wait for them to finish.
    pub async fn shutdown(&self) {
        self.probe.shutdown().await;
    }
}
