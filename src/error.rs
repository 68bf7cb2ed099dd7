use thiserror::Error;

// ─── Top-level error hierarchy ───────────────────────────────────────────────

/// Structured error hierarchy for `parley`.
///
/// Each subsystem defines its own error variant. Library callers can match on
/// these to decide recovery strategy; collaborator implementations continue to
/// use `anyhow::Result` for ad-hoc context chains.
#[derive(Debug, Error)]
pub enum ParleyError {
    // ── Config ───────────────────────────────────────────────────────────
    #[error("config: {0}")]
    Config(#[from] ConfigError),

    // ── Reasoning service ───────────────────────────────────────────────
    #[error("reasoning: {0}")]
    Reasoning(#[from] ReasoningError),

    // ── Retry / circuit breaker ─────────────────────────────────────────
    #[error("resilience: {0}")]
    Resilience(#[from] ResilienceError),

    // ── Tools ───────────────────────────────────────────────────────────
    #[error("tool: {0}")]
    Tool(#[from] ToolError),

    // ── Chat platform gateway ───────────────────────────────────────────
    #[error("transport: {0}")]
    Transport(#[from] TransportError),

    // ── Orchestration ───────────────────────────────────────────────────
    #[error("orchestrator: {0}")]
    Orchestrator(#[from] OrchestratorError),

    // ── Proactive scheduling ────────────────────────────────────────────
    #[error("proactive: {0}")]
    Proactive(#[from] ProactiveError),

    // ── Generic fallthrough (wraps anyhow for interop) ──────────────────
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ─── Config errors ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load config: {0}")]
    Load(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

// ─── External call classification ────────────────────────────────────────────

/// An external-call failure that already knows whether retrying can help.
///
/// Collaborators return this (wrapped in `anyhow::Error`) to bypass the
/// substring classifier in [`crate::resilience::retry::classify_error`].
#[derive(Debug, Error)]
pub enum ExternalError {
    #[error("transient external failure: {0}")]
    Transient(String),

    #[error("permanent external failure: {0}")]
    Permanent(String),
}

// ─── Reasoning service errors ────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ReasoningError {
    #[error("request failed: {message}")]
    Request { message: String },

    #[error("rate-limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("authentication failed")]
    Auth,

    #[error("call timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("malformed response: {0}")]
    Malformed(String),
}

// ─── Resilience errors ───────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ResilienceError {
    #[error("circuit {name} is open")]
    CircuitOpen { name: String },
}

// ─── Tool errors ────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("tool {name} not found")]
    NotFound { name: String },

    #[error("tool {name} received invalid input: {message}")]
    InvalidInput { name: String, message: String },

    #[error("tool {name} execution failed: {message}")]
    Execution { name: String, message: String },

    #[error("sandbox: {0}")]
    Sandbox(String),
}

// ─── Transport errors ───────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("send to {conversation} failed: {message}")]
    Send {
        conversation: String,
        message: String,
    },

    #[error("nothing delivered to {conversation} ({attempted} chunks attempted)")]
    NothingDelivered {
        conversation: String,
        attempted: usize,
        /// The last send failure, if any chunk was tried.
        #[source]
        last: Option<Box<TransportError>>,
    },
}

// ─── Orchestrator errors ────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("message store: {0}")]
    Store(String),
}

// ─── Proactive scheduling errors ────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ProactiveError {
    #[error("invalid action: {0}")]
    InvalidAction(String),

    #[error("daily budget exhausted ({scope})")]
    BudgetExhausted { scope: String },

    #[error("follow-up store: {0}")]
    Store(String),
}

// ─── Convenience re-exports ─────────────────────────────────────────────────

/// Shorthand result type for the crate.
pub type Result<T> = std::result::Result<T, ParleyError>;
