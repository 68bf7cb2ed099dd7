use super::action::{ActionKind, DeliveryStrategy, Priority, ProactiveAction};
use super::budget::DailyBudget;
use super::eligibility::EligibilityRules;
use super::executor::ActionExecutor;
use super::followups::{FollowupItem, FollowupStatus, FollowupStore, SweepReport};
use crate::config::ProactiveConfig;
use crate::conversation::ConversationId;
use crate::error::{ParleyError, ProactiveError};
use crate::orchestrator::{AutonomousOutcome, EngagementLedger};
use crate::store::MessageStore;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;


const MIN_INTERVAL_SECS: u64 = 5;

const PROACTIVE_INSTRUCTION: &str = "The conversation has been quiet for a while. If you have \
    something genuinely useful or interesting to add, start a short, friendly message. \
    Otherwise reply with nothing.";

/// What one tick did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub fired: usize,
    pub skipped: usize,
    pub budget_exhausted: usize,
    pub failed: usize,
    pub sweep: Option<SweepReport>,
}

pub struct SchedulerDeps {
    pub store: Arc<dyn MessageStore>,
    pub followups: Arc<dyn FollowupStore>,
    pub executor: Arc<dyn ActionExecutor>,
    pub ledger: Arc<EngagementLedger>,
}

/// Periodically decides whether the agent should speak unprompted.
pub struct ProactiveScheduler {
    store: Arc<dyn MessageStore>,
    followups: Arc<dyn FollowupStore>,
    executor: Arc<dyn ActionExecutor>,
    ledger: Arc<EngagementLedger>,
    rules: EligibilityRules,
    budget: DailyBudget,
    min_followup_priority: Priority,
    max_item_age: Duration,
    interval: std::time::Duration,
    last_maintenance: Mutex<Option<NaiveDate>>,
}

impl ProactiveScheduler {
    pub fn new(deps: SchedulerDeps, config: &ProactiveConfig) -> Self {
        Self {
            store: deps.store,
            followups: deps.followups,
            executor: deps.executor,
            ledger: deps.ledger,
            rules: EligibilityRules::from_config(config),
            budget: DailyBudget::new(config.global_daily_cap, config.per_conversation_daily_cap),
            min_followup_priority: config.min_followup_priority,
            max_item_age: Duration::days(i64::from(config.max_item_age_days)),
            interval: std::time::Duration::from_secs(config.interval_secs.max(MIN_INTERVAL_SECS)),
            last_maintenance: Mutex::new(None),
        }
    }

    pub fn budget(&self) -> &DailyBudget {
        &self.budget
    }

    /// Tick until `cancel` fires. A failed tick is logged and the loop
    /// carries on at the next interval.
    pub async fn run(&self, cancel: CancellationToken) -> anyhow::Result<()> {
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tracing::info!(
            interval_secs = self.interval.as_secs(),
            "Proactive scheduler started"
        );

        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    tracing::info!("Proactive scheduler stopped");
                    return Ok(());
                }
                _ = interval.tick() => {}
            }

            match self.tick_at(Utc::now()).await {
                Ok(report) => tracing::debug!(
                    fired = report.fired,
                    skipped = report.skipped,
                    budget_exhausted = report.budget_exhausted,
                    failed = report.failed,
                    "Proactive tick finished"
                ),
                Err(error) => tracing::warn!("Proactive tick failed: {error}"),
            }
        }
    }

    pub async fn tick_at(&self, now: DateTime<Utc>) -> Result<TickReport, ParleyError> {
        let mut report = TickReport {
            sweep: self.maintain_at(now)?,
            ..TickReport::default()
        };

        for conversation in self.store.conversations().await? {
            if let Err(error) = self.visit(&conversation, now, &mut report).await {
                report.failed += 1;
                tracing::warn!(
                    conversation = %conversation,
                    "Proactive pass over conversation failed: {error}"
                );
            }
        }
        Ok(report)
    }

    /// Sweep follow-ups on the first tick of each UTC day.
    fn maintain_at(&self, now: DateTime<Utc>) -> Result<Option<SweepReport>, ProactiveError> {
        let today = now.date_naive();
        let mut last = self
            .last_maintenance
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if *last == Some(today) {
            return Ok(None);
        }

        let sweep = self.followups.sweep(self.max_item_age, now)?;
        *last = Some(today);
        if !sweep.is_empty() {
            tracing::info!(
                kind = %ActionKind::Maintenance,
                expired = sweep.expired,
                archived = sweep.archived,
                "Follow-up maintenance"
            );
        }
        Ok(Some(sweep))
    }

    async fn visit(
        &self,
        conversation: &ConversationId,
        now: DateTime<Utc>,
        report: &mut TickReport,
    ) -> Result<(), ParleyError> {
        let last_activity = self.store.last_activity(conversation).await?;
        let active = self.rules.is_active(last_activity, now);
        let mut fired_followup = false;

        for item in self.followups.pending(conversation)? {
            if !item.is_due(now) || item.priority < self.min_followup_priority {
                continue;
            }
            let last_seen = self
                .store
                .last_activity_by(conversation, &item.target)
                .await?;
            if !self.rules.participant_recent(last_seen, now) {
                tracing::debug!(
                    conversation = %conversation,
                    followup = %item.id,
                    target = %item.target,
                    "Follow-up target not recently active"
                );
                report.skipped += 1;
                continue;
            }

            let action = followup_action(&item)?;
            if self.execute(&action, active, now, report).await {
                fired_followup = true;
            }
        }

        if fired_followup {
            return Ok(());
        }

        let stats = self.ledger.stats(conversation);
        if self.rules.proactive_eligible(last_activity, stats, now) {
            let action = ProactiveAction::new(
                ActionKind::Proactive,
                Priority::Low,
                DeliveryStrategy::Standalone,
                conversation.clone(),
                PROACTIVE_INSTRUCTION,
            )?;
            self.execute(&action, active, now, report).await;
        }
        Ok(())
    }

    /// Returns `true` when a message went out.
    async fn execute(
        &self,
        action: &ProactiveAction,
        conversation_active: bool,
        now: DateTime<Utc>,
        report: &mut TickReport,
    ) -> bool {
        let conversation = action.conversation();
        if !action.delivery().fires(conversation_active) {
            report.skipped += 1;
            return false;
        }

        let admission = self.executor.admission(conversation);
        if !admission.allowed {
            tracing::debug!(
                conversation = %conversation,
                kind = %action.kind(),
                reason = %admission.reason,
                "Proactive action throttled"
            );
            report.skipped += 1;
            return false;
        }

        // Consumed on attempt: a failed send is not refunded.
        if let Err(error) = self.budget.try_consume_at(conversation, now) {
            tracing::debug!(conversation = %conversation, kind = %action.kind(), "{error}");
            report.budget_exhausted += 1;
            return false;
        }

        match self
            .executor
            .run_autonomous(conversation, action.instruction())
            .await
        {
            Ok(AutonomousOutcome::Sent(delivery)) => {
                tracing::info!(
                    conversation = %conversation,
                    kind = %action.kind(),
                    priority = %action.priority(),
                    chunks = delivery.sent.len(),
                    "Proactive action fired"
                );
                if let Some(id) = action.followup_id()
                    && let Err(error) = self.followups.set_status(id, FollowupStatus::Completed, now)
                {
                    tracing::warn!(followup = %id, "Could not complete follow-up: {error}");
                }
                report.fired += 1;
                true
            }
            Ok(AutonomousOutcome::Throttled(reason)) => {
                // Admission changed between the check and the run; nothing
                // was attempted.
                self.budget.refund_at(conversation, now);
                tracing::debug!(
                    conversation = %conversation,
                    kind = %action.kind(),
                    reason = %reason,
                    "Proactive action throttled"
                );
                report.skipped += 1;
                false
            }
            Ok(outcome) => {
                tracing::debug!(
                    conversation = %conversation,
                    kind = %action.kind(),
                    ?outcome,
                    "Proactive action produced no message"
                );
                report.skipped += 1;
                false
            }
            Err(error) => {
                tracing::warn!(
                    conversation = %conversation,
                    kind = %action.kind(),
                    "Proactive action failed: {error}"
                );
                report.failed += 1;
                false
            }
        }
    }
}

fn followup_action(item: &FollowupItem) -> Result<ProactiveAction, ProactiveError> {
    let instruction = format!("Follow up with <@{}>: {}", item.target, item.reason);
    Ok(ProactiveAction::new(
        ActionKind::Followup,
        item.priority,
        item.delivery,
        item.conversation.clone(),
        instruction,
    )?
    .for_followup(item.id.clone(), item.target.clone()))
}
