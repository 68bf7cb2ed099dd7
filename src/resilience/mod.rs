pub mod circuit_breaker;
pub mod retry;

pub use circuit_breaker::{CircuitBreaker, CircuitState};
pub use retry::{
    ErrorClass, RetryExecutor, Sleeper, TokioSleeper, backoff_delay, classify_error,
    classify_message, retry_with_backoff,
};
