use super::ParleyConfig;
use crate::error::ConfigError;
use anyhow::{Context, Result};
use directories::UserDirs;
use std::fs;
use std::path::Path;

impl ParleyConfig {
    /// Load `~/.parley/config.toml`, falling back to defaults when it does not exist.
    pub fn load_or_default() -> Result<Self> {
        let home = UserDirs::new()
            .map(|u| u.home_dir().to_path_buf())
            .context("Could not find home directory")?;
        let config_path = home.join(".parley").join("config.toml");

        let mut config = if config_path.exists() {
            Self::load_from(&config_path)?
        } else {
            tracing::info!(path = %config_path.display(), "No config file found, using defaults");
            Self {
                config_path,
                ..Self::default()
            }
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .map_err(ConfigError::Io)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let mut config: ParleyConfig = toml::from_str(&contents)
            .map_err(|e| ConfigError::Load(e.to_string()))
            .context("Failed to parse config file")?;
        config.config_path = path.to_path_buf();
        config.validate()?;
        Ok(config)
    }

    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    pub(crate) fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(level) = lookup("PARLEY_LOG_LEVEL")
            && !level.is_empty()
        {
            self.observability.log_level = level;
        }

        if let Some(enabled) = lookup("PARLEY_PROACTIVE_ENABLED")
            && let Ok(enabled) = enabled.parse::<bool>()
        {
            self.proactive.enabled = enabled;
        }

        if let Some(attempts) = lookup("PARLEY_MAX_ATTEMPTS")
            && let Ok(attempts) = attempts.parse::<u32>()
            && attempts > 0
        {
            self.retry.max_attempts = attempts;
        }
    }

    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        let rl = &self.rate_limit;
        if rl.short_window_minutes == 0 || rl.long_window_minutes == 0 {
            return Err(invalid("rate_limit windows must be at least one minute"));
        }
        if rl.short_window_minutes > rl.long_window_minutes {
            return Err(invalid(
                "rate_limit.short_window_minutes must not exceed long_window_minutes",
            ));
        }
        if rl.short_window_max == 0 || rl.long_window_max == 0 {
            return Err(invalid(
                "rate_limit.short_window_max and long_window_max must be positive",
            ));
        }
        if rl.ignore_threshold == 0 {
            return Err(invalid("rate_limit.ignore_threshold must be positive"));
        }

        let retry = &self.retry;
        if retry.max_attempts == 0 {
            return Err(invalid("retry.max_attempts must be at least 1"));
        }
        if retry.exponential_base < 1.0 {
            return Err(invalid("retry.exponential_base must be >= 1.0"));
        }
        if !(0.0..=1.0).contains(&retry.jitter) {
            return Err(invalid("retry.jitter must be within [0, 1]"));
        }
        if retry.initial_delay_ms > retry.max_delay_ms {
            return Err(invalid("retry.initial_delay_ms must not exceed max_delay_ms"));
        }

        let cb = &self.circuit_breaker;
        if cb.failure_threshold == 0 || cb.success_threshold == 0 {
            return Err(invalid("circuit_breaker thresholds must be positive"));
        }

        let orch = &self.orchestrator;
        if orch.claim_capacity == 0 {
            return Err(invalid("orchestrator.claim_capacity must be positive"));
        }
        if orch.background_iteration_cap == 0 {
            return Err(invalid(
                "orchestrator.background_iteration_cap must be positive",
            ));
        }

        let pro = &self.proactive;
        if pro.min_idle_minutes > pro.max_idle_minutes {
            return Err(invalid(
                "proactive.min_idle_minutes must not exceed max_idle_minutes",
            ));
        }
        if pro.quiet_hours_start > 23 || pro.quiet_hours_end > 23 {
            return Err(invalid("proactive quiet hours must be within 0..=23"));
        }
        if !(-12..=14).contains(&pro.utc_offset_hours) {
            return Err(invalid("proactive.utc_offset_hours must be within -12..=14"));
        }
        if !(0.0..=1.0).contains(&pro.min_success_rate) {
            return Err(invalid("proactive.min_success_rate must be within [0, 1]"));
        }
        if pro.interval_secs == 0 {
            return Err(invalid("proactive.interval_secs must be positive"));
        }

        Ok(())
    }

    pub fn save(&self) -> Result<()> {
        let toml_str = toml::to_string_pretty(self).context("Failed to serialize config")?;
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }
        fs::write(&self.config_path, toml_str).context("Failed to write config file")?;
        Ok(())
    }
}

fn invalid(message: &str) -> ConfigError {
    ConfigError::Validation(message.to_string())
}
