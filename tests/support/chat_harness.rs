#![allow(dead_code)]

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use parley::channels::{ChatGateway, InboundEvent};
use parley::config::ParleyConfig;
use parley::proactive::InMemoryFollowupStore;
use parley::reasoning::{
    ContentBlock, ReasoningRequest, ReasoningResponse, ReasoningService, StopReason,
};
use parley::store::{InMemoryMessageStore, StoredMessage};
use parley::tools::{DocumentTool, MemorySandbox, ToolRegistry};
use parley::{AuthorId, ConversationId, Runtime, RuntimeDeps, SentId, TriggerId};

pub const AGENT: &str = "parley-bot";

/// Replays queued responses; an empty queue is a permanent failure.
#[derive(Default)]
pub struct ScriptedReasoning {
    script: Mutex<VecDeque<anyhow::Result<ReasoningResponse>>>,
    requests: Mutex<Vec<ReasoningRequest>>,
    calls: AtomicUsize,
}

impl ScriptedReasoning {
    pub fn new(responses: Vec<ReasoningResponse>) -> Self {
        Self {
            script: Mutex::new(responses.into_iter().map(Ok).collect()),
            ..Self::default()
        }
    }

    pub fn push_response(&self, response: ReasoningResponse) {
        self.script.lock().unwrap().push_back(Ok(response));
    }

    pub fn push_error(&self, message: &str) {
        self.script
            .lock()
            .unwrap()
            .push_back(Err(anyhow::anyhow!(message.to_string())));
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<ReasoningRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl ReasoningService for ScriptedReasoning {
    fn name(&self) -> &str {
        "scripted"
    }

    fn complete<'a>(
        &'a self,
        request: &'a ReasoningRequest,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<ReasoningResponse>> + Send + 'a>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        let next = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(anyhow::anyhow!("401 unauthorized")));
        Box::pin(async move { next })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sent {
    pub conversation: ConversationId,
    pub text: String,
    pub reply_to: Option<TriggerId>,
}

#[derive(Default)]
pub struct FakeGateway {
    sent: Mutex<Vec<Sent>>,
    engaged: AtomicBool,
    probes: AtomicUsize,
    max_len: Option<usize>,
}

impl FakeGateway {
    pub fn with_max_length(max_len: usize) -> Self {
        Self {
            max_len: Some(max_len),
            ..Self::default()
        }
    }

    pub fn set_engaged(&self, engaged: bool) {
        self.engaged.store(engaged, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    pub fn probes(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }
}

impl ChatGateway for FakeGateway {
    fn name(&self) -> &str {
        "fake"
    }

    fn max_message_length(&self) -> usize {
        self.max_len.unwrap_or(parley::channels::DEFAULT_MAX_MESSAGE_LENGTH)
    }

    fn send<'a>(
        &'a self,
        conversation: &'a ConversationId,
        text: &'a str,
        reply_to: Option<&'a TriggerId>,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<SentId>> + Send + 'a>> {
        let mut sent = self.sent.lock().unwrap();
        sent.push(Sent {
            conversation: conversation.clone(),
            text: text.to_string(),
            reply_to: reply_to.cloned(),
        });
        let id = SentId::new(format!("out-{}", sent.len()));
        Box::pin(async move { Ok(id) })
    }

    fn observe_engagement<'a>(
        &'a self,
        _conversation: &'a ConversationId,
        _sent: &'a SentId,
        _author: Option<&'a AuthorId>,
        _since: DateTime<Utc>,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<bool>> + Send + 'a>> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        let engaged = self.engaged.load(Ordering::SeqCst);
        Box::pin(async move { Ok(engaged) })
    }
}

pub struct Fixture {
    pub reasoning: Arc<ScriptedReasoning>,
    pub gateway: Arc<FakeGateway>,
    pub store: Arc<InMemoryMessageStore>,
    pub followups: Arc<InMemoryFollowupStore>,
    pub notes: Arc<DocumentTool<MemorySandbox>>,
    pub runtime: Runtime,
}

pub fn test_config() -> ParleyConfig {
    let mut config = ParleyConfig::default();
    config.retry.jitter = 0.0;
    config.retry.initial_delay_ms = 10;
    config.retry.max_delay_ms = 10;
    config
}

pub fn fixture(config: &ParleyConfig, responses: Vec<ReasoningResponse>) -> Fixture {
    fixture_with(config, ScriptedReasoning::new(responses), FakeGateway::default())
}

pub fn fixture_with(
    config: &ParleyConfig,
    reasoning: ScriptedReasoning,
    gateway: FakeGateway,
) -> Fixture {
    let reasoning = Arc::new(reasoning);
    let gateway = Arc::new(gateway);
    let store = Arc::new(InMemoryMessageStore::new());
    let followups = Arc::new(InMemoryFollowupStore::new());
    let notes = Arc::new(DocumentTool::new(MemorySandbox::new()));
    let mut tools = ToolRegistry::new();
    tools.register_local(notes.clone());

    let runtime = Runtime::new(
        config,
        RuntimeDeps {
            agent: AGENT.into(),
            reasoning: reasoning.clone(),
            gateway: gateway.clone(),
            store: store.clone(),
            tools,
            followups: followups.clone(),
            engagement_sink: None,
        },
    );
    Fixture {
        reasoning,
        gateway,
        store,
        followups,
        notes,
        runtime,
    }
}

pub fn event(trigger: &str, content: &str, mention: bool) -> InboundEvent {
    InboundEvent {
        trigger_id: trigger.into(),
        conversation: "general".into(),
        author: "u1".into(),
        author_name: "ana".into(),
        content: content.into(),
        mentions: if mention { vec![AGENT.into()] } else { Vec::new() },
        attachments: Vec::new(),
        received_at: Utc::now(),
    }
}

pub fn message(id: &str, author: &str, content: &str, sent_at: DateTime<Utc>) -> StoredMessage {
    StoredMessage {
        id: id.into(),
        author: author.into(),
        author_name: author.to_string(),
        content: content.into(),
        sent_at,
    }
}

pub fn tool_use(id: &str, input: serde_json::Value) -> ReasoningResponse {
    ReasoningResponse {
        stop_reason: StopReason::ToolUse,
        content: vec![ContentBlock::ToolUse {
            id: id.into(),
            name: "memory".into(),
            input,
        }],
        usage: None,
    }
}

pub fn end_turn(parts: &[&str]) -> ReasoningResponse {
    ReasoningResponse {
        stop_reason: StopReason::EndTurn,
        content: parts.iter().map(|part| ContentBlock::text(*part)).collect(),
        usage: None,
    }
}
