use crate::config::ProactiveConfig;
use crate::orchestrator::EngagementStats;
use chrono::{DateTime, Duration, FixedOffset, Offset, Timelike, Utc};

/// Local-time window in which the agent stays quiet. `start > end` wraps
/// past midnight; `start == end` disables quiet hours.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuietHours {
    start: u32,
    end: u32,
    offset: FixedOffset,
}

impl QuietHours {
    pub fn new(start: u32, end: u32, utc_offset_hours: i32) -> Self {
        let offset = utc_offset_hours
            .checked_mul(3_600)
            .and_then(FixedOffset::east_opt)
            .unwrap_or(Utc.fix());
        Self {
            start: start % 24,
            end: end % 24,
            offset,
        }
    }

    pub fn contains(&self, now: DateTime<Utc>) -> bool {
        let hour = now.with_timezone(&self.offset).hour();
        match self.start.cmp(&self.end) {
            std::cmp::Ordering::Equal => false,
            std::cmp::Ordering::Less => (self.start..self.end).contains(&hour),
            std::cmp::Ordering::Greater => hour >= self.start || hour < self.end,
        }
    }
}

/// Thresholds the scheduler checks before acting on a conversation.
#[derive(Debug, Clone)]
pub struct EligibilityRules {
    pub quiet_hours: QuietHours,
    pub min_idle: Duration,
    pub max_idle: Duration,
    pub active_window: Duration,
    pub participant_window: Duration,
    pub min_success_rate: f64,
    pub min_success_samples: usize,
}

impl EligibilityRules {
    pub fn from_config(config: &ProactiveConfig) -> Self {
        Self {
            quiet_hours: QuietHours::new(
                config.quiet_hours_start,
                config.quiet_hours_end,
                config.utc_offset_hours,
            ),
            min_idle: Duration::minutes(i64::from(config.min_idle_minutes)),
            max_idle: Duration::minutes(i64::from(config.max_idle_minutes)),
            active_window: Duration::minutes(i64::from(config.active_window_minutes)),
            participant_window: Duration::hours(i64::from(config.participant_active_hours)),
            min_success_rate: config.min_success_rate,
            min_success_samples: config.min_success_samples,
        }
    }

    /// Someone spoke within the active window.
    pub fn is_active(&self, last_activity: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        last_activity.is_some_and(|at| now - at <= self.active_window)
    }

    /// Idle long enough to re-engage, but not so long the conversation is dead.
    /// A conversation with no activity at all is never in the band.
    pub fn idle_in_band(&self, last_activity: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        last_activity.is_some_and(|at| {
            let idle = now - at;
            idle >= self.min_idle && idle <= self.max_idle
        })
    }

    pub fn participant_recent(
        &self,
        last_seen: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> bool {
        last_seen.is_some_and(|at| now - at <= self.participant_window)
    }

    /// Too few samples counts as eligible.
    pub fn success_rate_ok(&self, stats: EngagementStats) -> bool {
        if stats.samples < self.min_success_samples {
            return true;
        }
        stats
            .success_rate()
            .is_none_or(|rate| rate >= self.min_success_rate)
    }

    pub fn proactive_eligible(
        &self,
        last_activity: Option<DateTime<Utc>>,
        stats: EngagementStats,
        now: DateTime<Utc>,
    ) -> bool {
        self.idle_in_band(last_activity, now)
            && !self.quiet_hours.contains(now)
            && self.success_rate_ok(stats)
    }
}
