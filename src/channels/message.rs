use crate::conversation::{AuthorId, ConversationId, TriggerId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub filename: String,
    pub url: String,
    #[serde(default)]
    pub mime_type: Option<String>,
}

/// A message received from the chat platform.
///
/// `trigger_id` is the platform message id and doubles as the dedup key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundEvent {
    pub trigger_id: TriggerId,
    pub conversation: ConversationId,
    pub author: AuthorId,
    pub author_name: String,
    pub content: String,
    #[serde(default)]
    pub mentions: Vec<AuthorId>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    pub received_at: DateTime<Utc>,
}

impl InboundEvent {
    pub fn mentions(&self, participant: &AuthorId) -> bool {
        self.mentions.iter().any(|mention| mention == participant)
    }

    /// Content as presented to the reasoning service, attachments listed
    /// after the text.
    pub fn render(&self) -> String {
        let mut rendered = format!("{}: {}", self.author_name, self.content);
        for attachment in &self.attachments {
            rendered.push_str("\n[attachment: ");
            rendered.push_str(&attachment.filename);
            if let Some(mime) = &attachment.mime_type {
                rendered.push_str(" (");
                rendered.push_str(mime);
                rendered.push(')');
            }
            rendered.push(' ');
            rendered.push_str(&attachment.url);
            rendered.push(']');
        }
        rendered
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event() -> InboundEvent {
        InboundEvent {
            trigger_id: "m1".into(),
            conversation: "general".into(),
            author: "u1".into(),
            author_name: "ana".into(),
            content: "look at this".into(),
            mentions: vec!["bot".into()],
            attachments: vec![Attachment {
                filename: "cat.png".into(),
                url: "https://cdn.example.com/cat.png".into(),
                mime_type: Some("image/png".into()),
            }],
            received_at: Utc::now(),
        }
    }

    #[test]
    fn detects_mentions() {
        let event = event();
        assert!(event.mentions(&"bot".into()));
        assert!(!event.mentions(&"u2".into()));
    }

    #[test]
    fn render_includes_author_and_attachments() {
        assert_eq!(
            event().render(),
            "ana: look at this\n[attachment: cat.png (image/png) https://cdn.example.com/cat.png]"
        );
    }
}
