use crate::error::ReasoningError;
use crate::reasoning::{
    Citation, ContentBlock, Message, ReasoningRequest, ReasoningResponse, ReasoningService,
    StopReason, Usage,
};
use crate::resilience::{CircuitBreaker, RetryExecutor};
use crate::tools::{ToolRegistry, ToolResult, ToolSpec};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

/// Iteration allowance for one loop run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopBudget {
    /// Mention path: runs until the reasoning service stops asking for tools.
    Unbounded,
    /// Background path: at most this many tool rounds.
    Capped(u32),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallRecord {
    pub tool_name: String,
    pub args: serde_json::Value,
    pub result: ToolResult,
    pub iteration: u32,
}

/// Per-run state, discarded once the loop terminates.
#[derive(Debug, Default)]
pub struct ToolLoopState {
    pub transcript: Vec<Message>,
    pub iteration: u32,
    pub thinking_text: String,
    pub final_text: String,
    pub tool_calls: Vec<ToolCallRecord>,
    pub usage: Usage,
}

impl ToolLoopState {
    fn new(transcript: Vec<Message>) -> Self {
        Self {
            transcript,
            ..Self::default()
        }
    }

    fn absorb(&mut self, response: &ReasoningResponse) {
        for thinking in response.thinking_segments() {
            if !self.thinking_text.is_empty() {
                self.thinking_text.push('\n');
            }
            self.thinking_text.push_str(thinking);
        }
        if let Some(usage) = response.usage {
            self.usage.input_tokens = self.usage.input_tokens.saturating_add(usage.input_tokens);
            self.usage.output_tokens = self
                .usage
                .output_tokens
                .saturating_add(usage.output_tokens);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopStopReason {
    Completed,
    UnexpectedStop(String),
    MaxIterations,
}

#[derive(Debug)]
pub struct ToolLoopResult {
    /// Text to deliver. Empty when nothing should be sent.
    pub final_text: String,
    pub thinking_text: String,
    pub tool_calls: Vec<ToolCallRecord>,
    pub iterations: u32,
    pub usage: Usage,
    pub stop_reason: LoopStopReason,
}

impl ToolLoopResult {
    fn from_state(state: ToolLoopState, stop_reason: LoopStopReason) -> Self {
        Self {
            final_text: state.final_text,
            thinking_text: state.thinking_text,
            tool_calls: state.tool_calls,
            iterations: state.iteration,
            usage: state.usage,
            stop_reason,
        }
    }

    pub fn has_reply(&self) -> bool {
        !self.final_text.trim().is_empty()
    }
}

/// Concatenate every text block, then list distinct citation URLs.
pub fn compose_reply(response: &ReasoningResponse) -> String {
    let mut reply: String = response.text_segments().collect();

    let mut seen = HashSet::new();
    let citations: Vec<&Citation> = response
        .citations()
        .filter(|citation| seen.insert(citation.url.as_str()))
        .collect();
    if !citations.is_empty() {
        reply.push_str("\n\nSources:");
        for citation in citations {
            match &citation.title {
                Some(title) => reply.push_str(&format!("\n- {title} <{}>", citation.url)),
                None => reply.push_str(&format!("\n- <{}>", citation.url)),
            }
        }
    }
    reply
}

pub struct ToolLoop {
    reasoning: Arc<dyn ReasoningService>,
    registry: Arc<ToolRegistry>,
    retry: Arc<RetryExecutor>,
    breaker: Arc<CircuitBreaker>,
    call_timeout: Duration,
    max_tokens: u32,
    thinking_budget: u32,
    fallback_message: String,
}

pub struct ToolLoopParams {
    pub call_timeout: Duration,
    pub max_tokens: u32,
    pub thinking_budget: u32,
    pub fallback_message: String,
}

impl ToolLoop {
    pub fn new(
        reasoning: Arc<dyn ReasoningService>,
        registry: Arc<ToolRegistry>,
        retry: Arc<RetryExecutor>,
        breaker: Arc<CircuitBreaker>,
        params: ToolLoopParams,
    ) -> Self {
        Self {
            reasoning,
            registry,
            retry,
            breaker,
            call_timeout: params.call_timeout,
            max_tokens: params.max_tokens,
            thinking_budget: params.thinking_budget,
            fallback_message: params.fallback_message,
        }
    }

    /// Drive the reasoning service until it ends its turn, stops for an
    /// unexpected reason, or exhausts `budget`.
    ///
    /// Reasoning-call failures (after retries) are returned as errors; tool
    /// failures are folded into the transcript.
    pub async fn run(
        &self,
        system_prompt: &str,
        transcript: Vec<Message>,
        budget: LoopBudget,
    ) -> anyhow::Result<ToolLoopResult> {
        let tool_specs: Vec<ToolSpec> = self.registry.specs();
        let mut state = ToolLoopState::new(transcript);

        loop {
            if let LoopBudget::Capped(cap) = budget
                && state.iteration >= cap
            {
                tracing::warn!(
                    iterations = state.iteration,
                    cap,
                    "Background tool loop hit its iteration cap; dropping reply"
                );
                return Ok(ToolLoopResult::from_state(
                    state,
                    LoopStopReason::MaxIterations,
                ));
            }

            let request = ReasoningRequest {
                system_prompt: system_prompt.to_string(),
                transcript: state.transcript.clone(),
                tools: tool_specs.clone(),
                max_tokens: self.max_tokens,
                thinking_budget: self.thinking_budget,
            };
            let response = self.call(&request).await?;
            state.absorb(&response);

            match &response.stop_reason {
                StopReason::ToolUse if response.tool_use_blocks().next().is_some() => {
                    state.iteration = state.iteration.saturating_add(1);
                    state.transcript.push(response.to_assistant_message());
                    let results = self.execute_tool_uses(&response, &mut state).await;
                    state.transcript.push(Message::tool_results(results));
                }
                StopReason::EndTurn => {
                    state.final_text = compose_reply(&response);
                    if !state.thinking_text.is_empty() {
                        tracing::debug!(thinking = %state.thinking_text, "Reasoning trace");
                    }
                    tracing::debug!(
                        iterations = state.iteration,
                        tokens = state.usage.total(),
                        "Tool loop completed"
                    );
                    return Ok(ToolLoopResult::from_state(state, LoopStopReason::Completed));
                }
                other => {
                    tracing::warn!(
                        stop_reason = %other,
                        iteration = state.iteration,
                        "Unexpected stop reason, sending fallback"
                    );
                    let reason = other.to_string();
                    state.final_text.clone_from(&self.fallback_message);
                    return Ok(ToolLoopResult::from_state(
                        state,
                        LoopStopReason::UnexpectedStop(reason),
                    ));
                }
            }
        }
    }

    async fn call(&self, request: &ReasoningRequest) -> anyhow::Result<ReasoningResponse> {
        let timeout = self.call_timeout;
        self.retry
            .retry_with_circuit_breaker(&self.breaker, || async move {
                tokio::time::timeout(timeout, self.reasoning.complete(request))
                    .await
                    .map_err(|_| ReasoningError::Timeout {
                        secs: timeout.as_secs(),
                    })?
            })
            .await
    }

    async fn execute_tool_uses(
        &self,
        response: &ReasoningResponse,
        state: &mut ToolLoopState,
    ) -> Vec<ContentBlock> {
        let mut results = Vec::new();
        for (id, name, input) in response.tool_use_blocks() {
            tracing::debug!(tool = name, iteration = state.iteration, "Executing tool");
            let result = self.registry.execute(name, input.clone()).await;
            state.tool_calls.push(ToolCallRecord {
                tool_name: name.to_string(),
                args: input.clone(),
                result: result.clone(),
                iteration: state.iteration,
            });
            results.push(result.into_block(id));
        }
        results
    }
}
