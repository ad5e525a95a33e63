//! Product analytics events.
//!
//! # Responsibility
//! - Name the goal lifecycle events the app reports.
//! - Emit them as structured log lines through the core logger.
//!
//! # Invariants
//! - Properties carry metadata only (ids, counts, flags); callers must not
//!   pass goal titles or other free text.
//! - Emitting an event never fails.

use crate::logging::sanitize_message;
use log::{error, info};
use std::error::Error;
use std::fmt::{Display, Formatter};

const MAX_PROPERTY_CHARS: usize = 64;

/// Goal lifecycle events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalyticsEvent {
    GoalCreated,
    GoalCompleted,
    GoalUpdated,
    GoalDeleted,
    StreakAchieved,
    GoalsLoaded,
}

impl AnalyticsEvent {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::GoalCreated => "goal_created",
            Self::GoalCompleted => "goal_completed",
            Self::GoalUpdated => "goal_updated",
            Self::GoalDeleted => "goal_deleted",
            Self::StreakAchieved => "streak_achieved",
            Self::GoalsLoaded => "goals_loaded",
        }
    }
}

/// Scalar analytics property value.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Text(String),
    Number(f64),
    Flag(bool),
}

impl Display for PropertyValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text(value) => {
                let sanitized = sanitize_message(value, MAX_PROPERTY_CHARS);
                write!(f, "{}", sanitized.replace(' ', "_"))
            }
            Self::Number(value) => write!(f, "{value}"),
            Self::Flag(value) => write!(f, "{value}"),
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<u32> for PropertyValue {
    fn from(value: u32) -> Self {
        Self::Number(f64::from(value))
    }
}

impl From<usize> for PropertyValue {
    fn from(value: usize) -> Self {
        Self::Number(value as f64)
    }
}

impl From<f64> for PropertyValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        Self::Flag(value)
    }
}

/// Formats properties as ` key=value` pairs in the given order.
pub fn format_properties(properties: &[(&str, PropertyValue)]) -> String {
    properties
        .iter()
        .map(|(key, value)| format!(" {key}={value}"))
        .collect()
}

/// Emits one analytics event.
pub fn log_event(event: AnalyticsEvent, properties: &[(&str, PropertyValue)]) {
    info!(
        "event=analytics module=analytics status=ok name={}{}",
        event.as_str(),
        format_properties(properties)
    );
}

/// Reports an error with a short context label.
pub fn log_error(context: &str, err: &dyn Error) {
    error!(
        "event=analytics_error module=analytics status=error context={} error={}",
        sanitize_message(context, MAX_PROPERTY_CHARS).replace(' ', "_"),
        sanitize_message(&err.to_string(), 160)
    );
}
