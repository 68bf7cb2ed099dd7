use crate::proactive::action::Priority;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParleyConfig {
    /// Path the config was loaded from - computed, not serialized
    #[serde(skip)]
    pub config_path: PathBuf,

    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub circuit_breaker: CircuitBreakerConfig,

    #[serde(default)]
    pub orchestrator: OrchestratorConfig,

    #[serde(default)]
    pub proactive: ProactiveConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,
}

// ── Rate limiting ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_short_window_minutes")]
    pub short_window_minutes: u32,
    #[serde(default = "default_short_window_max")]
    pub short_window_max: usize,
    #[serde(default = "default_long_window_minutes")]
    pub long_window_minutes: u32,
    #[serde(default = "default_long_window_max")]
    pub long_window_max: usize,
    #[serde(default = "default_ignore_threshold")]
    pub ignore_threshold: u32,
}

fn default_short_window_minutes() -> u32 {
    5
}

fn default_short_window_max() -> usize {
    20
}

fn default_long_window_minutes() -> u32 {
    60
}

fn default_long_window_max() -> usize {
    200
}

fn default_ignore_threshold() -> u32 {
    5
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            short_window_minutes: default_short_window_minutes(),
            short_window_max: default_short_window_max(),
            long_window_minutes: default_long_window_minutes(),
            long_window_max: default_long_window_max(),
            ignore_threshold: default_ignore_threshold(),
        }
    }
}

// ── Retry ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "default_exponential_base")]
    pub exponential_base: f64,
    /// Proportional jitter in `[0, 1]`; `0` disables it.
    #[serde(default = "default_jitter")]
    pub jitter: f64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay_ms() -> u64 {
    1_000
}

fn default_max_delay_ms() -> u64 {
    30_000
}

fn default_exponential_base() -> f64 {
    2.0
}

fn default_jitter() -> f64 {
    0.1
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            exponential_base: default_exponential_base(),
            jitter: default_jitter(),
        }
    }
}

impl RetryConfig {
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }
}

// ── Circuit breaker ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    #[serde(default = "default_success_threshold")]
    pub success_threshold: u32,
    #[serde(default = "default_breaker_timeout_seconds")]
    pub timeout_seconds: u64,
}

fn default_failure_threshold() -> u32 {
    5
}

fn default_success_threshold() -> u32 {
    2
}

fn default_breaker_timeout_seconds() -> u64 {
    60
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            success_threshold: default_success_threshold(),
            timeout_seconds: default_breaker_timeout_seconds(),
        }
    }
}

// ── Orchestrator ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    #[serde(default = "default_claim_capacity")]
    pub claim_capacity: usize,
    #[serde(default = "default_context_limit")]
    pub context_limit: usize,
    #[serde(default = "default_background_iteration_cap")]
    pub background_iteration_cap: u32,
    #[serde(default = "default_engagement_probe_delay_secs")]
    pub engagement_probe_delay_secs: u64,
    #[serde(default = "default_cooldown_seconds")]
    pub cooldown_seconds: u64,
    #[serde(default = "default_call_timeout_secs")]
    pub call_timeout_secs: u64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_thinking_budget")]
    pub thinking_budget: u32,
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
    #[serde(default = "default_fallback_message")]
    pub fallback_message: String,
    #[serde(default = "default_apology_message")]
    pub apology_message: String,
}

fn default_claim_capacity() -> usize {
    1_000
}

fn default_context_limit() -> usize {
    50
}

fn default_background_iteration_cap() -> u32 {
    10
}

fn default_engagement_probe_delay_secs() -> u64 {
    300
}

fn default_cooldown_seconds() -> u64 {
    120
}

fn default_call_timeout_secs() -> u64 {
    120
}

fn default_max_tokens() -> u32 {
    4_096
}

fn default_thinking_budget() -> u32 {
    2_048
}

fn default_system_prompt() -> String {
    "You are a helpful participant in a group chat. Keep replies concise.".into()
}

fn default_fallback_message() -> String {
    "I lost my train of thought there. Could you ask me again?".into()
}

fn default_apology_message() -> String {
    "Sorry, something went wrong while I was putting that reply together.".into()
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            claim_capacity: default_claim_capacity(),
            context_limit: default_context_limit(),
            background_iteration_cap: default_background_iteration_cap(),
            engagement_probe_delay_secs: default_engagement_probe_delay_secs(),
            cooldown_seconds: default_cooldown_seconds(),
            call_timeout_secs: default_call_timeout_secs(),
            max_tokens: default_max_tokens(),
            thinking_budget: default_thinking_budget(),
            system_prompt: default_system_prompt(),
            fallback_message: default_fallback_message(),
            apology_message: default_apology_message(),
        }
    }
}

impl OrchestratorConfig {
    pub fn engagement_probe_delay(&self) -> Duration {
        Duration::from_secs(self.engagement_probe_delay_secs)
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs.max(1))
    }
}

// ── Proactive scheduler ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProactiveConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_min_idle_minutes")]
    pub min_idle_minutes: u32,
    #[serde(default = "default_max_idle_minutes")]
    pub max_idle_minutes: u32,
    /// Local hour (0-23) at which quiet hours begin.
    #[serde(default = "default_quiet_hours_start")]
    pub quiet_hours_start: u32,
    /// Local hour (0-23) at which quiet hours end. May be less than the start.
    #[serde(default = "default_quiet_hours_end")]
    pub quiet_hours_end: u32,
    #[serde(default)]
    pub utc_offset_hours: i32,
    #[serde(default = "default_min_success_rate")]
    pub min_success_rate: f64,
    #[serde(default = "default_min_success_samples")]
    pub min_success_samples: usize,
    #[serde(default = "default_global_daily_cap")]
    pub global_daily_cap: u32,
    #[serde(default = "default_per_conversation_daily_cap")]
    pub per_conversation_daily_cap: u32,
    #[serde(default = "default_min_followup_priority")]
    pub min_followup_priority: Priority,
    #[serde(default = "default_participant_active_hours")]
    pub participant_active_hours: u32,
    #[serde(default = "default_active_window_minutes")]
    pub active_window_minutes: u32,
    #[serde(default = "default_max_item_age_days")]
    pub max_item_age_days: u32,
}

fn default_true() -> bool {
    true
}

fn default_interval_secs() -> u64 {
    3_600
}

fn default_min_idle_minutes() -> u32 {
    60
}

fn default_max_idle_minutes() -> u32 {
    1_440
}

fn default_quiet_hours_start() -> u32 {
    22
}

fn default_quiet_hours_end() -> u32 {
    8
}

fn default_min_success_rate() -> f64 {
    0.3
}

fn default_min_success_samples() -> usize {
    3
}

fn default_global_daily_cap() -> u32 {
    10
}

fn default_per_conversation_daily_cap() -> u32 {
    2
}

fn default_min_followup_priority() -> Priority {
    Priority::Medium
}

fn default_participant_active_hours() -> u32 {
    24
}

fn default_active_window_minutes() -> u32 {
    10
}

fn default_max_item_age_days() -> u32 {
    7
}

impl Default for ProactiveConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            interval_secs: default_interval_secs(),
            min_idle_minutes: default_min_idle_minutes(),
            max_idle_minutes: default_max_idle_minutes(),
            quiet_hours_start: default_quiet_hours_start(),
            quiet_hours_end: default_quiet_hours_end(),
            utc_offset_hours: 0,
            min_success_rate: default_min_success_rate(),
            min_success_samples: default_min_success_samples(),
            global_daily_cap: default_global_daily_cap(),
            per_conversation_daily_cap: default_per_conversation_daily_cap(),
            min_followup_priority: default_min_followup_priority(),
            participant_active_hours: default_participant_active_hours(),
            active_window_minutes: default_active_window_minutes(),
            max_item_age_days: default_max_item_age_days(),
        }
    }
}

// ── Observability ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}
