use super::traits::{LocalTool, RemoteTool};
use super::types::{ToolResult, ToolSpec};
use crate::error::ToolError;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// How a registered tool is executed. Resolved once at registration.
#[derive(Clone)]
pub enum ToolHandler {
    Local(Arc<dyn LocalTool>),
    Remote(Arc<dyn RemoteTool>),
}

impl ToolHandler {
    pub fn spec(&self) -> ToolSpec {
        match self {
            Self::Local(tool) => tool.spec(),
            Self::Remote(tool) => tool.spec(),
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self, Self::Local(_))
    }
}

/// Capability table mapping tool names to handlers.
#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: HashMap<String, ToolHandler>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a local tool. Replaces any existing tool with the same name.
    pub fn register_local(&mut self, tool: Arc<dyn LocalTool>) {
        self.tools
            .insert(tool.name().to_string(), ToolHandler::Local(tool));
    }

    /// Register a remote tool. Replaces any existing tool with the same name.
    pub fn register_remote(&mut self, tool: Arc<dyn RemoteTool>) {
        self.tools
            .insert(tool.name().to_string(), ToolHandler::Remote(tool));
    }

    pub fn get(&self, name: &str) -> Option<&ToolHandler> {
        self.tools.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Return sorted list of registered tool names.
    pub fn tool_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Specs for all registered tools, ordered by name.
    pub fn specs(&self) -> Vec<ToolSpec> {
        let mut specs: Vec<ToolSpec> = self.tools.values().map(ToolHandler::spec).collect();
        specs.sort_by(|a, b| a.name.cmp(&b.name));
        specs
    }

    /// Execute a tool by name. Failures come back as an unsuccessful
    /// [`ToolResult`] rather than an error.
    pub async fn execute(&self, name: &str, args: Value) -> ToolResult {
        let outcome = match self.tools.get(name) {
            None => Err(ToolError::NotFound {
                name: name.to_string(),
            }),
            Some(ToolHandler::Local(tool)) => tool.execute(args),
            Some(ToolHandler::Remote(tool)) => tool.execute(args).await,
        };

        match outcome {
            Ok(result) => result,
            Err(error) => {
                tracing::warn!(tool = name, error = %error, "Tool execution failed");
                ToolResult::failed(error.to_string())
            }
        }
    }
}
