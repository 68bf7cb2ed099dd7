use super::response::{Message, ReasoningResponse};
use crate::tools::ToolSpec;
use std::future::Future;
use std::pin::Pin;

#[derive(Debug, Clone)]
pub struct ReasoningRequest {
    pub system_prompt: String,
    pub transcript: Vec<Message>,
    pub tools: Vec<ToolSpec>,
    pub max_tokens: u32,
    pub thinking_budget: u32,
}

/// External reasoning model. Only ever called through the resilience layer.
pub trait ReasoningService: Send + Sync {
    fn name(&self) -> &str;

    fn complete<'a>(
        &'a self,
        request: &'a ReasoningRequest,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<ReasoningResponse>> + Send + 'a>>;
}
