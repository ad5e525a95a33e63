//! Notification record model.
//!
//! Records mirror what was handed to the platform notification API so the
//! app can list and acknowledge them later. Delivery itself is external.

use crate::model::goal::GoalId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type NotificationId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Reminder,
    Streak,
    PartnerNudge,
}

impl NotificationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Reminder => "reminder",
            Self::Streak => "streak",
            Self::PartnerNudge => "partner_nudge",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "reminder" => Some(Self::Reminder),
            "streak" => Some(Self::Streak),
            "partner_nudge" => Some(Self::PartnerNudge),
            _ => None,
        }
    }
}

/// Persisted notification record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub user_id: String,
    pub goal_id: GoalId,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
    pub scheduled_for: DateTime<Utc>,
    pub delivered: bool,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    /// Creates an undelivered record with a generated id.
    pub fn new(
        user_id: impl Into<String>,
        goal_id: GoalId,
        kind: NotificationKind,
        title: impl Into<String>,
        body: impl Into<String>,
        scheduled_for: DateTime<Utc>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            goal_id,
            kind,
            title: title.into(),
            body: body.into(),
            scheduled_for,
            delivered: false,
            created_at,
        }
    }
}
