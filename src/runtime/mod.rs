pub mod supervisor;

pub use supervisor::{RestartPolicy, spawn_supervised};

use crate::admission::RateLimiter;
use crate::channels::{ChatGateway, InboundEvent};
use crate::config::ParleyConfig;
use crate::conversation::AuthorId;
use crate::orchestrator::{
    EngagementSink, OrchestratorDeps, ResponseOrchestrator, TriggerKind, TriggerOutcome,
};
use crate::proactive::{FollowupStore, ProactiveScheduler, SchedulerDeps};
use crate::reasoning::ReasoningService;
use crate::resilience::{CircuitBreaker, RetryExecutor};
use crate::store::MessageStore;
use crate::tools::ToolRegistry;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// External collaborators the runtime is assembled from.
pub struct RuntimeDeps {
    pub agent: AuthorId,
    pub reasoning: Arc<dyn ReasoningService>,
    pub gateway: Arc<dyn ChatGateway>,
    pub store: Arc<dyn MessageStore>,
    pub tools: ToolRegistry,
    pub followups: Arc<dyn FollowupStore>,
    pub engagement_sink: Option<Arc<dyn EngagementSink>>,
}

/// Owns every long-lived component and the tasks they spawn.
pub struct Runtime {
    orchestrator: Arc<ResponseOrchestrator>,
    scheduler: Arc<ProactiveScheduler>,
    proactive_enabled: bool,
    restart_policy: RestartPolicy,
    tracker: TaskTracker,
    cancel: CancellationToken,
}

impl Runtime {
    pub fn new(config: &ParleyConfig, deps: RuntimeDeps) -> Self {
        let cancel = CancellationToken::new();
        let store = deps.store;

        let mut orchestrator = ResponseOrchestrator::new(
            OrchestratorDeps {
                agent: deps.agent,
                reasoning: deps.reasoning,
                gateway: deps.gateway,
                store: store.clone(),
                tools: Arc::new(deps.tools),
                rate_limiter: Arc::new(RateLimiter::new(config.rate_limit.clone())),
                retry: Arc::new(RetryExecutor::new(config.retry.clone())),
                breaker: Arc::new(CircuitBreaker::new(
                    "reasoning",
                    config.circuit_breaker.clone(),
                )),
            },
            config.orchestrator.clone(),
        )
        .with_tasks(TaskTracker::new(), cancel.child_token());
        if let Some(sink) = deps.engagement_sink {
            orchestrator = orchestrator.with_engagement_sink(sink);
        }
        let orchestrator = Arc::new(orchestrator);

        let scheduler = Arc::new(ProactiveScheduler::new(
            SchedulerDeps {
                store,
                followups: deps.followups,
                executor: orchestrator.clone(),
                ledger: orchestrator.engagement_ledger().clone(),
            },
            &config.proactive,
        ));

        Self {
            orchestrator,
            scheduler,
            proactive_enabled: config.proactive.enabled,
            restart_policy: RestartPolicy::default(),
            tracker: TaskTracker::new(),
            cancel,
        }
    }

    pub fn with_restart_policy(mut self, policy: RestartPolicy) -> Self {
        self.restart_policy = policy;
        self
    }

    pub fn orchestrator(&self) -> &Arc<ResponseOrchestrator> {
        &self.orchestrator
    }

    pub fn scheduler(&self) -> &Arc<ProactiveScheduler> {
        &self.scheduler
    }

    pub fn is_shutting_down(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Start background components.
    pub fn start(&self) {
        if !self.proactive_enabled {
            tracing::info!("Proactive scheduler disabled");
            return;
        }
        let scheduler = self.scheduler.clone();
        let cancel = self.cancel.clone();
        spawn_supervised(
            &self.tracker,
            self.cancel.clone(),
            "proactive_scheduler",
            self.restart_policy,
            move || {
                let scheduler = scheduler.clone();
                let cancel = cancel.clone();
                async move { scheduler.run(cancel).await }
            },
        );
    }

    /// Classify and handle one inbound event in place.
    pub async fn handle_event(&self, event: &InboundEvent) -> TriggerOutcome {
        let kind = TriggerKind::classify(event, self.orchestrator.agent());
        self.orchestrator.handle_trigger(event, kind).await
    }

    /// Handle an inbound event on a tracked task. Returns `false` once
    /// shutdown has begun.
    pub fn dispatch(&self, event: InboundEvent) -> bool {
        if self.cancel.is_cancelled() {
            tracing::debug!(trigger = %event.trigger_id, "Shutting down, event dropped");
            return false;
        }
        let orchestrator = self.orchestrator.clone();
        self.tracker.spawn(async move {
            let kind = TriggerKind::classify(&event, orchestrator.agent());
            let outcome = orchestrator.handle_trigger(&event, kind).await;
            tracing::debug!(trigger = %event.trigger_id, ?outcome, "Event handled");
        });
        true
    }

    /// Stop the scheduler and pending probes, then wait for in-flight
    /// triggers to finish.
    pub async fn shutdown(&self) {
        tracing::info!("Runtime shutting down");
        self.cancel.cancel();
        self.tracker.close();
        self.tracker.wait().await;
        self.orchestrator.shutdown().await;
        tracing::info!("Runtime stopped");
    }
}
