//! Booking rules: lead time, horizon, daily hours and duration bounds.
//!
//! The policy is stateless apart from its immutable configuration and
//! takes "now" as an argument, so every rule is testable without a clock.

use chrono::{Duration, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Upper bounds accepted for configured limits.
pub const MAX_LEAD_MINUTES: i64 = 60 * 24 * 365;
pub const MAX_HORIZON_DAYS: i64 = 3650;
pub const MAX_DURATION_MINUTES: u32 = 24 * 60;

/// Tunable limits for the booking rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    pub min_lead_minutes: i64,
    pub max_horizon_days: i64,
    /// First allowed start time of day (inclusive).
    pub day_start: NaiveTime,
    /// Last allowed start time of day (inclusive).
    pub day_end: NaiveTime,
    pub min_duration_minutes: u32,
    pub max_duration_minutes: u32,
    pub default_duration_minutes: u32,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        PolicyConfig {
            min_lead_minutes: 60,
            max_horizon_days: 90,
            day_start: NaiveTime::from_hms_opt(8, 0, 0).unwrap_or(NaiveTime::MIN),
            day_end: NaiveTime::from_hms_opt(20, 0, 0).unwrap_or(NaiveTime::MIN),
            min_duration_minutes: 15,
            max_duration_minutes: 180,
            default_duration_minutes: 30,
        }
    }
}

impl PolicyConfig {
    /// Check the limits are mutually consistent.
    pub fn check(&self) -> Result<(), String> {
        if !(0..=MAX_LEAD_MINUTES).contains(&self.min_lead_minutes) {
            return Err(format!(
                "Minimum lead time must be between 0 and {} minutes",
                MAX_LEAD_MINUTES
            ));
        }
        if !(1..=MAX_HORIZON_DAYS).contains(&self.max_horizon_days) {
            return Err(format!(
                "Booking horizon must be between 1 and {} days",
                MAX_HORIZON_DAYS
            ));
        }
        if self.day_start >= self.day_end {
            return Err("Daily window must start before it ends".to_string());
        }
        if self.min_duration_minutes == 0
            || self.min_duration_minutes > self.max_duration_minutes
            || self.max_duration_minutes > MAX_DURATION_MINUTES
        {
            return Err(format!(
                "Invalid duration bounds: {}..={}",
                self.min_duration_minutes, self.max_duration_minutes
            ));
        }
        if !(self.min_duration_minutes..=self.max_duration_minutes)
            .contains(&self.default_duration_minutes)
        {
            return Err(format!(
                "Default duration {} is outside {}..={}",
                self.default_duration_minutes, self.min_duration_minutes, self.max_duration_minutes
            ));
        }
        Ok(())
    }
}

/// A booking rule that a proposed time or duration breaks.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PolicyViolation {
    #[error("Cannot book an appointment in the past ({start})")]
    PastDate { start: NaiveDateTime },

    #[error("At least {minimum_minutes} minutes of notice are required")]
    InsufficientLeadTime { minimum_minutes: i64 },

    #[error("Appointments cannot be booked more than {max_days} days ahead")]
    HorizonExceeded { max_days: i64 },

    #[error("Appointments must start between {opens} and {closes}")]
    OutsideWorkingHours { opens: NaiveTime, closes: NaiveTime },

    #[error("Duration must be between {min} and {max} minutes, got {minutes}")]
    InvalidDuration { minutes: u32, min: u32, max: u32 },
}

#[derive(Debug, Clone)]
pub struct SchedulingPolicy {
    config: PolicyConfig,
}

impl Default for SchedulingPolicy {
    fn default() -> Self {
        SchedulingPolicy::new(PolicyConfig::default())
    }
}

impl SchedulingPolicy {
    pub fn new(config: PolicyConfig) -> Self {
        SchedulingPolicy { config }
    }

    pub fn config(&self) -> &PolicyConfig {
        &self.config
    }

    /// Validate a proposed start against `now`. The first broken rule wins.
    pub fn validate(
        &self,
        start: NaiveDateTime,
        now: NaiveDateTime,
    ) -> Result<(), PolicyViolation> {
        if start < now {
            return Err(PolicyViolation::PastDate { start });
        }

        // Limits past the representable range: no start satisfies the lead
        // time, and every start is inside the horizon.
        let earliest = Duration::try_minutes(self.config.min_lead_minutes)
            .and_then(|lead| now.checked_add_signed(lead));
        if earliest.map_or(true, |earliest| start < earliest) {
            return Err(PolicyViolation::InsufficientLeadTime {
                minimum_minutes: self.config.min_lead_minutes,
            });
        }

        let latest = Duration::try_days(self.config.max_horizon_days)
            .and_then(|horizon| now.checked_add_signed(horizon));
        if latest.is_some_and(|latest| start > latest) {
            return Err(PolicyViolation::HorizonExceeded {
                max_days: self.config.max_horizon_days,
            });
        }

        if !self.within_working_hours(start.time()) {
            return Err(PolicyViolation::OutsideWorkingHours {
                opens: self.config.day_start,
                closes: self.config.day_end,
            });
        }

        Ok(())
    }

    pub fn validate_duration(&self, minutes: u32) -> Result<(), PolicyViolation> {
        let (min, max) = (
            self.config.min_duration_minutes,
            self.config.max_duration_minutes,
        );
        if minutes < min || minutes > max {
            return Err(PolicyViolation::InvalidDuration { minutes, min, max });
        }
        Ok(())
    }

    /// Requested duration, or the configured default.
    pub fn resolve_duration(&self, requested: Option<u32>) -> u32 {
        requested.unwrap_or(self.config.default_duration_minutes)
    }

    pub fn within_working_hours(&self, time: NaiveTime) -> bool {
        time >= self.config.day_start && time <= self.config.day_end
    }

    pub fn accepts(&self, start: NaiveDateTime, now: NaiveDateTime) -> bool {
        self.validate(start, now).is_ok()
    }
}
