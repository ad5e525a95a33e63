//! Goal domain model.
//!
//! # Responsibility
//! - Define the canonical goal record shared by list/detail/streak use-cases.
//! - Validate goal fields before persistence and after read-back.
//!
//! # Invariants
//! - `id` is stable and never reused for another goal.
//! - `progress` stays within `[0.0, 1.0]`.
//! - `streak.best >= streak.current`.
//! - Reminder and frequency times use 24-hour `HH:mm`.

use crate::model::milestone::Milestone;
use crate::model::streak::StreakRecord;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

static CLOCK_TIME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([01]\d|2[0-3]):[0-5]\d$").expect("valid clock time regex"));

/// Stable identifier for every goal.
pub type GoalId = Uuid;

/// Goal category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalType {
    /// Recurring goal tracked by streaks.
    Habit,
    /// Single objective, optionally with a deadline.
    OneTime,
}

impl GoalType {
    /// Storage/wire label.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Habit => "habit",
            Self::OneTime => "one_time",
        }
    }

    /// Parses a storage/wire label. Accepts `one-time` as an alias.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "habit" => Some(Self::Habit),
            "one_time" | "one-time" => Some(Self::OneTime),
            _ => None,
        }
    }
}

/// Recurrence cadence for habit goals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrequencyType {
    Daily,
    Weekly,
    Monthly,
}

/// Recurrence settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frequency {
    #[serde(rename = "type")]
    pub kind: FrequencyType,
    /// Weekdays for weekly goals, `0` = Sunday .. `6` = Saturday.
    #[serde(default)]
    pub days: Vec<u8>,
    /// Reminder time in `HH:mm`.
    #[serde(default)]
    pub time: Option<String>,
}

/// Delivery channel for reminders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationChannel {
    Push,
    Email,
    Both,
}

/// Reminder settings attached to a goal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reminder {
    pub enabled: bool,
    /// Times of day in `HH:mm`.
    #[serde(default)]
    pub times: Vec<String>,
    #[serde(rename = "type")]
    pub channel: NotificationChannel,
}

impl Default for Reminder {
    fn default() -> Self {
        Self {
            enabled: false,
            times: Vec::new(),
            channel: NotificationChannel::Push,
        }
    }
}

/// Validation errors for goal write/read paths.
#[derive(Debug, Clone, PartialEq)]
pub enum GoalValidationError {
    EmptyUserId,
    EmptyTitle,
    ProgressOutOfRange(f64),
    StreakBestBelowCurrent { current: u32, best: u32 },
    InvalidFrequencyDay(u8),
    InvalidClockTime(String),
    EmptyMilestoneText(Uuid),
}

impl Display for GoalValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyUserId => write!(f, "user_id must not be blank"),
            Self::EmptyTitle => write!(f, "title must not be blank"),
            Self::ProgressOutOfRange(value) => {
                write!(f, "progress must be within [0, 1], got {value}")
            }
            Self::StreakBestBelowCurrent { current, best } => write!(
                f,
                "streak best ({best}) must not be lower than current ({current})"
            ),
            Self::InvalidFrequencyDay(day) => {
                write!(f, "frequency day must be within 0..=6, got {day}")
            }
            Self::InvalidClockTime(value) => {
                write!(f, "time must use 24-hour HH:mm, got `{value}`")
            }
            Self::EmptyMilestoneText(id) => write!(f, "milestone text must not be blank: {id}"),
        }
    }
}

impl Error for GoalValidationError {}

/// Canonical goal record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Goal {
    pub id: GoalId,
    /// Opaque owner scope supplied by the caller.
    pub user_id: String,
    pub title: String,
    pub description: Option<String>,
    /// Serialized as `type` to match external schema naming.
    #[serde(rename = "type")]
    pub kind: GoalType,
    pub icon: String,
    /// Deadline for one-time goals.
    pub deadline: Option<DateTime<Utc>>,
    pub frequency: Option<Frequency>,
    /// Completion ratio in `[0.0, 1.0]`.
    pub progress: f64,
    pub streak: StreakRecord,
    pub reminders: Reminder,
    pub category: Option<String>,
    pub milestones: Vec<Milestone>,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

impl Goal {
    /// Creates a goal with a generated id and a fresh streak started at `now`.
    ///
    /// # Invariants
    /// - `progress` starts at `0.0`, `completed` at `false`.
    /// - `streak` starts as `0/0` with `last_completed = now`.
    pub fn new(
        user_id: impl Into<String>,
        kind: GoalType,
        title: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            title: title.into(),
            description: None,
            kind,
            icon: String::new(),
            deadline: None,
            frequency: None,
            progress: 0.0,
            streak: StreakRecord::started_at(now),
            reminders: Reminder::default(),
            category: None,
            milestones: Vec::new(),
            completed: false,
            created_at: now,
            last_updated: now,
        }
    }

    /// Validates field-level invariants.
    ///
    /// # Errors
    /// Returns the first violated invariant.
    pub fn validate(&self) -> Result<(), GoalValidationError> {
        if self.user_id.trim().is_empty() {
            return Err(GoalValidationError::EmptyUserId);
        }
        if self.title.trim().is_empty() {
            return Err(GoalValidationError::EmptyTitle);
        }
        if !(0.0..=1.0).contains(&self.progress) {
            return Err(GoalValidationError::ProgressOutOfRange(self.progress));
        }
        if !self.streak.is_consistent() {
            return Err(GoalValidationError::StreakBestBelowCurrent {
                current: self.streak.current,
                best: self.streak.best,
            });
        }
        if let Some(frequency) = &self.frequency {
            if let Some(day) = frequency.days.iter().find(|day| **day > 6) {
                return Err(GoalValidationError::InvalidFrequencyDay(*day));
            }
            if let Some(time) = &frequency.time {
                validate_clock_time(time)?;
            }
        }
        for time in &self.reminders.times {
            validate_clock_time(time)?;
        }
        for milestone in &self.milestones {
            milestone.validate()?;
        }
        Ok(())
    }
}

/// Checks a 24-hour `HH:mm` clock time.
pub fn validate_clock_time(value: &str) -> Result<(), GoalValidationError> {
    if CLOCK_TIME_RE.is_match(value) {
        Ok(())
    } else {
        Err(GoalValidationError::InvalidClockTime(value.to_string()))
    }
}
