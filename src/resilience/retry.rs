use crate::config::RetryConfig;
use crate::error::{ExternalError, ReasoningError, ResilienceError};
use rand::Rng;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use super::circuit_breaker::CircuitBreaker;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Retryable,
    NonRetryable,
}

const TRANSIENT_MARKERS: &[&str] = &[
    "timeout",
    "timed out",
    "connection",
    "rate limit",
    "rate-limit",
    "rate_limit",
    "too many requests",
    "overloaded",
    "service unavailable",
    "bad gateway",
];

const PERMANENT_MARKERS: &[&str] = &[
    "unauthorized",
    "forbidden",
    "not found",
    "invalid api key",
    "invalid_api_key",
    "invalid credentials",
    "authentication failed",
    "permission denied",
];

/// Decide whether `err` is worth another attempt.
///
/// Explicitly tagged errors win. Everything else is classified by message:
/// transient markers, then permanent markers, then retryable by default.
pub fn classify_error(err: &anyhow::Error) -> ErrorClass {
    if let Some(external) = err.downcast_ref::<ExternalError>() {
        return match external {
            ExternalError::Transient(_) => ErrorClass::Retryable,
            ExternalError::Permanent(_) => ErrorClass::NonRetryable,
        };
    }
    if let Some(reasoning) = err.downcast_ref::<ReasoningError>() {
        return match reasoning {
            ReasoningError::Request { message } => classify_message(message),
            ReasoningError::RateLimited { .. } | ReasoningError::Timeout { .. } => {
                ErrorClass::Retryable
            }
            ReasoningError::Auth | ReasoningError::Malformed(_) => ErrorClass::NonRetryable,
        };
    }
    if err.downcast_ref::<ResilienceError>().is_some() {
        return ErrorClass::NonRetryable;
    }
    if err.downcast_ref::<tokio::time::error::Elapsed>().is_some() {
        return ErrorClass::Retryable;
    }
    classify_message(&format!("{err:#}"))
}

pub fn classify_message(message: &str) -> ErrorClass {
    let lower = message.to_ascii_lowercase();
    let codes: Vec<u16> = lower
        .split(|c: char| !c.is_ascii_digit())
        .filter(|word| word.len() == 3)
        .filter_map(|word| word.parse::<u16>().ok())
        .collect();

    let transient_code = codes
        .iter()
        .any(|code| (500..600).contains(code) || *code == 429 || *code == 408);
    if transient_code || TRANSIENT_MARKERS.iter().any(|m| lower.contains(m)) {
        return ErrorClass::Retryable;
    }

    let permanent_code = codes.iter().any(|code| matches!(code, 401 | 403 | 404));
    if permanent_code || PERMANENT_MARKERS.iter().any(|m| lower.contains(m)) {
        return ErrorClass::NonRetryable;
    }

    // Unrecognized errors are retried until the attempt budget runs out.
    ErrorClass::Retryable
}

/// Suspension seam for backoff delays.
pub trait Sleeper: Send + Sync {
    fn sleep<'a>(&'a self, duration: Duration) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

impl Sleeper for TokioSleeper {
    fn sleep<'a>(&'a self, duration: Duration) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
        Box::pin(tokio::time::sleep(duration))
    }
}

/// Delay before retry number `retry` (0-based), before jitter.
pub fn backoff_delay(config: &RetryConfig, retry: u32) -> Duration {
    let initial = config.initial_delay().as_secs_f64();
    let max = config.max_delay().as_secs_f64();
    let exponent = i32::try_from(retry).unwrap_or(i32::MAX);
    let raw = initial * config.exponential_base.max(1.0).powi(exponent);
    if raw.is_finite() {
        Duration::from_secs_f64(raw.min(max))
    } else {
        config.max_delay()
    }
}

fn apply_jitter(config: &RetryConfig, delay: Duration) -> Duration {
    if config.jitter <= 0.0 || delay.is_zero() {
        return delay;
    }
    let spread = config.jitter.min(1.0);
    let factor = 1.0 + rand::rng().random_range(-spread..=spread);
    let jittered = delay.as_secs_f64() * factor;
    Duration::from_secs_f64(jittered.clamp(0.0, config.max_delay().as_secs_f64()))
}

/// Retry wrapper for any fallible external call.
pub struct RetryExecutor {
    config: RetryConfig,
    sleeper: Arc<dyn Sleeper>,
}

impl RetryExecutor {
    pub fn new(config: RetryConfig) -> Self {
        Self {
            config,
            sleeper: Arc::new(TokioSleeper),
        }
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Run `operation` until it succeeds, fails non-retryably, or attempts run out.
    ///
    /// Returns the last error unchanged so callers can still downcast it.
    pub async fn retry_with_backoff<T, F, Fut>(
        &self,
        label: &str,
        mut operation: F,
    ) -> anyhow::Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        let max_attempts = self.config.max_attempts.max(1);
        let mut previous_delay = Duration::ZERO;

        for attempt in 1..=max_attempts {
            match operation().await {
                Ok(value) => {
                    if attempt > 1 {
                        tracing::info!(operation = label, attempt, "Recovered after retries");
                    }
                    return Ok(value);
                }
                Err(error) => {
                    if classify_error(&error) == ErrorClass::NonRetryable {
                        tracing::warn!(
                            operation = label,
                            attempt,
                            "Non-retryable error, giving up: {error:#}"
                        );
                        return Err(error);
                    }
                    if attempt == max_attempts {
                        tracing::warn!(
                            operation = label,
                            attempts = max_attempts,
                            "Retries exhausted: {error:#}"
                        );
                        return Err(error);
                    }

                    let delay = apply_jitter(&self.config, backoff_delay(&self.config, attempt - 1))
                        .max(previous_delay);
                    previous_delay = delay;
                    tracing::warn!(
                        operation = label,
                        attempt,
                        max_attempts,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        "Call failed, retrying: {error:#}"
                    );
                    self.sleeper.sleep(delay).await;
                }
            }
        }

        unreachable!("retry loop always returns within max_attempts")
    }

    /// Gate the whole retry sequence on `breaker` and record its outcome there.
    pub async fn retry_with_circuit_breaker<T, F, Fut>(
        &self,
        breaker: &CircuitBreaker,
        operation: F,
    ) -> anyhow::Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        if !breaker.can_proceed() {
            return Err(ResilienceError::CircuitOpen {
                name: breaker.name().to_string(),
            }
            .into());
        }

        let guard = breaker.guard_trial();
        let result = self.retry_with_backoff(breaker.name(), operation).await;
        match &result {
            Ok(_) => breaker.record_success(),
            Err(_) => breaker.record_failure(),
        }
        guard.settle();
        result
    }
}

/// Free-function form of [`RetryExecutor::retry_with_backoff`] using tokio sleeps.
pub async fn retry_with_backoff<T, F, Fut>(operation: F, config: &RetryConfig) -> anyhow::Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = anyhow::Result<T>>,
{
    RetryExecutor::new(config.clone())
        .retry_with_backoff("operation", operation)
        .await
}
