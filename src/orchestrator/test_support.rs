use crate::channels::ChatGateway;
use crate::config::{CircuitBreakerConfig, RetryConfig};
use crate::conversation::{AuthorId, ConversationId, SentId, TriggerId};
use crate::reasoning::{
    ContentBlock, ReasoningRequest, ReasoningResponse, ReasoningService, StopReason,
};
use crate::resilience::{CircuitBreaker, RetryExecutor, Sleeper};
use chrono::{DateTime, Utc};
use std::collections::{HashSet, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

pub(crate) struct NoopSleeper;

impl Sleeper for NoopSleeper {
    fn sleep<'a>(&'a self, _duration: Duration) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
        Box::pin(async {})
    }
}

pub(crate) fn retry_executor() -> Arc<RetryExecutor> {
    Arc::new(
        RetryExecutor::new(RetryConfig {
            max_attempts: 3,
            jitter: 0.0,
            ..RetryConfig::default()
        })
        .with_sleeper(Arc::new(NoopSleeper)),
    )
}

pub(crate) fn breaker() -> Arc<CircuitBreaker> {
    Arc::new(CircuitBreaker::new(
        "reasoning",
        CircuitBreakerConfig::default(),
    ))
}

pub(crate) fn tool_use(id: &str, name: &str, input: serde_json::Value) -> ReasoningResponse {
    ReasoningResponse {
        stop_reason: StopReason::ToolUse,
        content: vec![ContentBlock::ToolUse {
            id: id.to_string(),
            name: name.to_string(),
            input,
        }],
        usage: None,
    }
}

pub(crate) enum Step {
    Respond(ReasoningResponse),
    Fail(anyhow::Error),
    Stall(Duration, ReasoningResponse),
}

/// Reasoning service replaying a fixed script of steps.
pub(crate) struct ScriptedReasoning {
    steps: Mutex<VecDeque<Step>>,
    requests: Mutex<Vec<ReasoningRequest>>,
    calls: AtomicUsize,
}

impl ScriptedReasoning {
    pub(crate) fn new(steps: Vec<Step>) -> Self {
        Self {
            steps: Mutex::new(steps.into()),
            requests: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn replying(responses: Vec<ReasoningResponse>) -> Self {
        Self::new(responses.into_iter().map(Step::Respond).collect())
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn requests(&self) -> Vec<ReasoningRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
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
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.requests
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(request.clone());
            let step = self
                .steps
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .pop_front();
            match step {
                Some(Step::Respond(response)) => Ok(response),
                Some(Step::Fail(error)) => Err(error),
                Some(Step::Stall(delay, response)) => {
                    tokio::time::sleep(delay).await;
                    Ok(response)
                }
                None => Err(anyhow::anyhow!("script exhausted: permission denied")),
            }
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SentRecord {
    pub conversation: ConversationId,
    pub text: String,
    pub reply_to: Option<TriggerId>,
}

/// Gateway that records sends and can be told to fail specific ones.
#[derive(Default)]
pub(crate) struct RecordingGateway {
    sent: Mutex<Vec<SentRecord>>,
    attempts: AtomicUsize,
    fail_attempts: Mutex<HashSet<usize>>,
    fail_replies: Mutex<bool>,
    engaged: Mutex<bool>,
    probes: AtomicUsize,
    typing: AtomicUsize,
    max_length: Option<usize>,
}

impl RecordingGateway {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_max_length(max_length: usize) -> Self {
        Self {
            max_length: Some(max_length),
            ..Self::default()
        }
    }

    /// Fail the send attempts with these 0-based indices.
    pub(crate) fn fail_attempts(&self, attempts: &[usize]) {
        self.fail_attempts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(attempts.iter().copied());
    }

    pub(crate) fn fail_replies(&self) {
        *self
            .fail_replies
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = true;
    }

    pub(crate) fn set_engaged(&self, engaged: bool) {
        *self.engaged.lock().unwrap_or_else(PoisonError::into_inner) = engaged;
    }

    pub(crate) fn sent(&self) -> Vec<SentRecord> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub(crate) fn probes(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }

    pub(crate) fn typing(&self) -> usize {
        self.typing.load(Ordering::SeqCst)
    }
}

impl ChatGateway for RecordingGateway {
    fn name(&self) -> &str {
        "recording"
    }

    fn max_message_length(&self) -> usize {
        self.max_length
            .unwrap_or(crate::channels::DEFAULT_MAX_MESSAGE_LENGTH)
    }

    fn send<'a>(
        &'a self,
        conversation: &'a ConversationId,
        text: &'a str,
        reply_to: Option<&'a TriggerId>,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<SentId>> + Send + 'a>> {
        Box::pin(async move {
            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
            let fail_attempt = self
                .fail_attempts
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .contains(&attempt);
            let fail_reply = reply_to.is_some()
                && *self
                    .fail_replies
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner);
            if fail_attempt || fail_reply {
                anyhow::bail!("send attempt {attempt} rejected");
            }
            let mut sent = self.sent.lock().unwrap_or_else(PoisonError::into_inner);
            sent.push(SentRecord {
                conversation: conversation.clone(),
                text: text.to_string(),
                reply_to: reply_to.cloned(),
            });
            Ok(SentId::new(format!("sent-{}", sent.len())))
        })
    }

    fn send_typing<'a>(
        &'a self,
        _conversation: &'a ConversationId,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>> {
        Box::pin(async move {
            self.typing.fetch_add(1, Ordering::SeqCst);
            anyhow::bail!("typing indicator unsupported")
        })
    }

    fn observe_engagement<'a>(
        &'a self,
        _conversation: &'a ConversationId,
        _sent: &'a SentId,
        _author: Option<&'a AuthorId>,
        _since: DateTime<Utc>,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<bool>> + Send + 'a>> {
        Box::pin(async move {
            self.probes.fetch_add(1, Ordering::SeqCst);
            Ok(*self.engaged.lock().unwrap_or_else(PoisonError::into_inner))
        })
    }
}
