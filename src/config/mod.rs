mod loader;
pub mod schema;

pub use schema::{
    CircuitBreakerConfig, ObservabilityConfig, OrchestratorConfig, ParleyConfig, ProactiveConfig,
    RateLimitConfig, RetryConfig,
};
