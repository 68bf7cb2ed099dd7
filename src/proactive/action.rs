use crate::conversation::{AuthorId, ConversationId};
use crate::error::ProactiveError;
use serde::{Deserialize, Serialize};

/// Declared low to high so the derived ordering ranks `High` greatest.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, strum::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ActionKind {
    Followup,
    Proactive,
    Maintenance,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum DeliveryStrategy {
    /// Fires only while the conversation is idle.
    Standalone,
    /// Fires only while the conversation is active.
    Woven,
    /// Never fires automatically.
    Deferred,
}

impl DeliveryStrategy {
    pub fn fires(self, conversation_active: bool) -> bool {
        match self {
            Self::Standalone => !conversation_active,
            Self::Woven => conversation_active,
            Self::Deferred => false,
        }
    }
}

/// A validated unit of autonomous work. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProactiveAction {
    kind: ActionKind,
    priority: Priority,
    delivery: DeliveryStrategy,
    conversation: ConversationId,
    target: Option<AuthorId>,
    followup_id: Option<String>,
    instruction: String,
}

impl ProactiveAction {
    pub fn new(
        kind: ActionKind,
        priority: Priority,
        delivery: DeliveryStrategy,
        conversation: ConversationId,
        instruction: impl Into<String>,
    ) -> Result<Self, ProactiveError> {
        validate(kind, priority, delivery)?;
        Ok(Self {
            kind,
            priority,
            delivery,
            conversation,
            target: None,
            followup_id: None,
            instruction: instruction.into(),
        })
    }

    pub fn for_followup(mut self, followup_id: impl Into<String>, target: AuthorId) -> Self {
        self.followup_id = Some(followup_id.into());
        self.target = Some(target);
        self
    }

    pub fn kind(&self) -> ActionKind {
        self.kind
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn delivery(&self) -> DeliveryStrategy {
        self.delivery
    }

    pub fn conversation(&self) -> &ConversationId {
        &self.conversation
    }

    pub fn target(&self) -> Option<&AuthorId> {
        self.target.as_ref()
    }

    pub fn followup_id(&self) -> Option<&str> {
        self.followup_id.as_deref()
    }

    pub fn instruction(&self) -> &str {
        &self.instruction
    }
}

fn validate(
    kind: ActionKind,
    priority: Priority,
    delivery: DeliveryStrategy,
) -> Result<(), ProactiveError> {
    match kind {
        ActionKind::Maintenance if priority != Priority::Low => Err(ProactiveError::InvalidAction(
            format!("maintenance must be low priority, got {priority}"),
        )),
        ActionKind::Maintenance if delivery != DeliveryStrategy::Deferred => {
            Err(ProactiveError::InvalidAction(format!(
                "maintenance must be deferred, got {delivery}"
            )))
        }
        ActionKind::Proactive if priority == Priority::High => Err(ProactiveError::InvalidAction(
            "proactive engagement cannot be high priority".into(),
        )),
        _ => Ok(()),
    }
}
