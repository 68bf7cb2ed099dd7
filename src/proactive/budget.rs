use crate::conversation::ConversationId;
use crate::error::ProactiveError;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

#[derive(Debug)]
struct BudgetState {
    day: NaiveDate,
    global_used: u32,
    per_conversation: HashMap<ConversationId, u32>,
}

impl BudgetState {
    /// Counters belong to one UTC calendar day.
    fn rollover_if_needed(&mut self, today: NaiveDate) {
        if self.day != today {
            tracing::debug!(from = %self.day, to = %today, "Proactive budget reset");
            self.day = today;
            self.global_used = 0;
            self.per_conversation.clear();
        }
    }
}

/// Global and per-conversation daily caps on autonomous actions.
///
/// Process-local: a restart mid-day starts from zero.
#[derive(Debug)]
pub struct DailyBudget {
    global_max: u32,
    per_conversation_max: u32,
    state: Mutex<BudgetState>,
}

impl DailyBudget {
    pub fn new(global_max: u32, per_conversation_max: u32) -> Self {
        Self::starting_at(global_max, per_conversation_max, Utc::now())
    }

    pub fn starting_at(global_max: u32, per_conversation_max: u32, now: DateTime<Utc>) -> Self {
        Self {
            global_max,
            per_conversation_max,
            state: Mutex::new(BudgetState {
                day: now.date_naive(),
                global_used: 0,
                per_conversation: HashMap::new(),
            }),
        }
    }

    /// Consume one unit for `conversation`, or report which cap is spent.
    pub fn try_consume_at(
        &self,
        conversation: &ConversationId,
        now: DateTime<Utc>,
    ) -> Result<(), ProactiveError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.rollover_if_needed(now.date_naive());

        if state.global_used >= self.global_max {
            return Err(ProactiveError::BudgetExhausted {
                scope: "global".into(),
            });
        }
        let used = state
            .per_conversation
            .get(conversation)
            .copied()
            .unwrap_or(0);
        if used >= self.per_conversation_max {
            return Err(ProactiveError::BudgetExhausted {
                scope: conversation.to_string(),
            });
        }

        state.global_used += 1;
        state
            .per_conversation
            .insert(conversation.clone(), used + 1);
        Ok(())
    }

    /// Give back a unit consumed earlier the same day. A refund after the
    /// rollover has nothing to return.
    pub fn refund_at(&self, conversation: &ConversationId, now: DateTime<Utc>) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.rollover_if_needed(now.date_naive());
        if let Some(used) = state.per_conversation.get_mut(conversation)
            && *used > 0
        {
            *used -= 1;
            state.global_used = state.global_used.saturating_sub(1);
        }
    }

    pub fn used_at(&self, conversation: &ConversationId, now: DateTime<Utc>) -> (u32, u32) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.rollover_if_needed(now.date_naive());
        let per_conversation = state
            .per_conversation
            .get(conversation)
            .copied()
            .unwrap_or(0);
        (state.global_used, per_conversation)
    }
}
