//! Milestone domain model.
//!
//! A milestone is a sub-task of one goal with its own completion flag and a
//! free-text activity log.

use crate::model::goal::GoalValidationError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type MilestoneId = Uuid;
pub type MilestoneUpdateId = Uuid;

/// One activity log line of a milestone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MilestoneUpdate {
    pub id: MilestoneUpdateId,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

impl MilestoneUpdate {
    pub fn new(text: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            text: text.into(),
            timestamp,
        }
    }
}

/// Goal sub-task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Milestone {
    pub id: MilestoneId,
    pub text: String,
    pub completed: bool,
    /// Activity log in insertion order.
    #[serde(default)]
    pub updates: Vec<MilestoneUpdate>,
}

impl Milestone {
    /// Creates an open milestone with an empty activity log.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            text: text.into(),
            completed: false,
            updates: Vec::new(),
        }
    }

    pub fn validate(&self) -> Result<(), GoalValidationError> {
        if self.text.trim().is_empty() {
            return Err(GoalValidationError::EmptyMilestoneText(self.id));
        }
        Ok(())
    }
}
