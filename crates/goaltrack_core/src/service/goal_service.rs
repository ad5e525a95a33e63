//! Goal use-case service.
//!
//! # Responsibility
//! - Create, edit, complete, delete and list goals for one user scope.
//! - Run the streak tracker through the repository's transactional write path.
//! - Report goal lifecycle analytics.
//!
//! # Invariants
//! - New goals start with progress `0`, an open completion flag and a `0/0`
//!   streak whose `last_completed` is the creation instant.
//! - Every streak update appends exactly one history entry.
//! - Service APIs never bypass repository validation/persistence contracts.

use crate::analytics::{log_event, AnalyticsEvent, PropertyValue};
use crate::model::goal::{Frequency, Goal, GoalId, GoalType, GoalValidationError, Reminder};
use crate::model::milestone::Milestone;
use crate::model::streak::{update_streak, StreakHistoryEntry, StreakRecord, StreakUpdate};
use crate::repo::goal_repo::{GoalListQuery, GoalRepository, RepoError};
use crate::repo::support::to_storage_precision;
use chrono::{DateTime, TimeZone, Utc};
use log::info;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Service error for goal use-cases.
#[derive(Debug)]
pub enum GoalServiceError {
    /// Input violates goal invariants.
    InvalidInput(GoalValidationError),
    /// Target goal does not exist for this user.
    GoalNotFound(GoalId),
    /// Persistence-layer failure.
    Repo(RepoError),
    /// Internal consistency mismatch between write and read-back.
    InconsistentState(&'static str),
}

impl Display for GoalServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidInput(err) => write!(f, "invalid goal: {err}"),
            Self::GoalNotFound(id) => write!(f, "goal not found: {id}"),
            Self::Repo(err) => write!(f, "{err}"),
            Self::InconsistentState(details) => write!(f, "inconsistent goal state: {details}"),
        }
    }
}

impl Error for GoalServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidInput(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for GoalServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound { entity: "goal", id } => Self::GoalNotFound(id),
            RepoError::Validation(err) => Self::InvalidInput(err),
            other => Self::Repo(other),
        }
    }
}

impl From<GoalValidationError> for GoalServiceError {
    fn from(value: GoalValidationError) -> Self {
        Self::InvalidInput(value)
    }
}

pub type GoalServiceResult<T> = Result<T, GoalServiceError>;

/// Request model for goal creation.
#[derive(Debug, Clone, PartialEq)]
pub struct NewGoal {
    pub title: String,
    pub kind: GoalType,
    pub description: Option<String>,
    pub icon: String,
    pub deadline: Option<DateTime<Utc>>,
    pub frequency: Option<Frequency>,
    pub reminders: Reminder,
    pub category: Option<String>,
    /// Initial milestone texts, in display order.
    pub milestones: Vec<String>,
}

impl NewGoal {
    /// Minimal request with defaults for every optional field.
    pub fn new(title: impl Into<String>, kind: GoalType) -> Self {
        Self {
            title: title.into(),
            kind,
            description: None,
            icon: String::new(),
            deadline: None,
            frequency: None,
            reminders: Reminder::default(),
            category: None,
            milestones: Vec::new(),
        }
    }
}

/// Partial goal edit. `None` leaves a field untouched; nested `Option`s
/// distinguish "clear" (`Some(None)`) from "keep".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GoalPatch {
    pub title: Option<String>,
    pub kind: Option<GoalType>,
    pub description: Option<Option<String>>,
    pub icon: Option<String>,
    pub deadline: Option<Option<DateTime<Utc>>>,
    pub frequency: Option<Option<Frequency>>,
    pub reminders: Option<Reminder>,
    pub category: Option<Option<String>>,
    pub progress: Option<f64>,
}

impl GoalPatch {
    fn apply(self, goal: &mut Goal) {
        if let Some(title) = self.title {
            goal.title = title.trim().to_string();
        }
        if let Some(kind) = self.kind {
            goal.kind = kind;
        }
        if let Some(description) = self.description {
            goal.description = description;
        }
        if let Some(icon) = self.icon {
            goal.icon = icon;
        }
        if let Some(deadline) = self.deadline {
            goal.deadline = deadline;
        }
        if let Some(frequency) = self.frequency {
            goal.frequency = frequency;
        }
        if let Some(reminders) = self.reminders {
            goal.reminders = reminders;
        }
        if let Some(category) = self.category {
            goal.category = category;
        }
        if let Some(progress) = self.progress {
            goal.progress = progress;
        }
    }
}

/// Goal service facade over repository implementations.
pub struct GoalService<R: GoalRepository> {
    repo: R,
}

impl<R: GoalRepository> GoalService<R> {
    /// Creates a service using the provided repository implementation.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Creates one goal for `user_id` at instant `now`.
    pub fn create_goal(
        &self,
        user_id: &str,
        request: NewGoal,
        now: DateTime<Utc>,
    ) -> GoalServiceResult<Goal> {
        let mut goal = Goal::new(user_id, request.kind, request.title.trim(), now);
        goal.description = request.description;
        goal.icon = request.icon;
        goal.deadline = request.deadline;
        goal.frequency = request.frequency;
        goal.reminders = request.reminders;
        goal.category = request.category;
        goal.milestones = request
            .milestones
            .into_iter()
            .map(|text| Milestone::new(text.trim()))
            .collect();

        let goal_id = self.repo.create_goal(&goal)?;
        let created = self.read_back(user_id, goal_id, "created goal not found in read-back")?;
        log_event(
            AnalyticsEvent::GoalCreated,
            &[
                ("goal_id", PropertyValue::from(goal_id.to_string())),
                ("type", PropertyValue::from(created.kind.as_str())),
                ("milestones", PropertyValue::from(created.milestones.len())),
            ],
        );
        Ok(created)
    }

    /// Gets one goal by stable ID.
    pub fn get_goal(&self, user_id: &str, goal_id: GoalId) -> GoalServiceResult<Option<Goal>> {
        Ok(self.repo.get_goal(user_id, goal_id)?)
    }

    /// Applies a partial edit and refreshes `last_updated`.
    pub fn update_goal(
        &self,
        user_id: &str,
        goal_id: GoalId,
        patch: GoalPatch,
        now: DateTime<Utc>,
    ) -> GoalServiceResult<Goal> {
        let mut goal = self.require_goal(user_id, goal_id)?;
        patch.apply(&mut goal);
        goal.last_updated = now;
        self.repo.update_goal(&goal)?;

        log_event(
            AnalyticsEvent::GoalUpdated,
            &[("goal_id", PropertyValue::from(goal_id.to_string()))],
        );
        self.read_back(user_id, goal_id, "updated goal not found in read-back")
    }

    /// Marks a goal complete with full progress.
    pub fn complete_goal(
        &self,
        user_id: &str,
        goal_id: GoalId,
        now: DateTime<Utc>,
    ) -> GoalServiceResult<Goal> {
        let mut goal = self.require_goal(user_id, goal_id)?;
        goal.completed = true;
        goal.progress = 1.0;
        goal.last_updated = now;
        self.repo.update_goal(&goal)?;

        log_event(
            AnalyticsEvent::GoalCompleted,
            &[
                ("goal_id", PropertyValue::from(goal_id.to_string())),
                ("type", PropertyValue::from(goal.kind.as_str())),
            ],
        );
        self.read_back(user_id, goal_id, "completed goal not found in read-back")
    }

    /// Deletes a goal with its milestones and streak history.
    pub fn delete_goal(&self, user_id: &str, goal_id: GoalId) -> GoalServiceResult<()> {
        self.repo.delete_goal(user_id, goal_id)?;
        log_event(
            AnalyticsEvent::GoalDeleted,
            &[("goal_id", PropertyValue::from(goal_id.to_string()))],
        );
        Ok(())
    }

    /// Lists goals using filter and pagination options.
    pub fn list_goals(&self, query: &GoalListQuery) -> GoalServiceResult<Vec<Goal>> {
        Ok(self.repo.list_goals(query)?)
    }

    /// Records a completion (or un-completion) of `goal_id` for `now`'s date.
    ///
    /// Calendar dates are taken in `now`'s time zone. The returned update
    /// carries both the persisted record and the appended history entry.
    pub fn update_streak<Tz: TimeZone>(
        &self,
        user_id: &str,
        goal_id: GoalId,
        completed: bool,
        now: &DateTime<Tz>,
    ) -> GoalServiceResult<StreakUpdate> {
        let now = to_storage_precision(now.clone());
        let apply = |record: &StreakRecord| update_streak(record, completed, &now);
        let update = self.repo.transact_streak(user_id, goal_id, &apply)?;

        info!(
            "event=streak_update module=service status=ok goal_id={} completed={} current={} best={} changed={}",
            goal_id,
            completed,
            update.record.current,
            update.record.best,
            update.counters_changed()
        );
        if update.best_improved() {
            log_event(
                AnalyticsEvent::StreakAchieved,
                &[
                    ("goal_id", PropertyValue::from(goal_id.to_string())),
                    ("best", PropertyValue::from(update.record.best)),
                ],
            );
        }
        Ok(update)
    }

    /// Lists streak history newest first.
    pub fn streak_history(
        &self,
        user_id: &str,
        goal_id: GoalId,
        limit: Option<u32>,
    ) -> GoalServiceResult<Vec<StreakHistoryEntry>> {
        Ok(self.repo.list_streak_history(user_id, goal_id, limit)?)
    }

    fn require_goal(&self, user_id: &str, goal_id: GoalId) -> GoalServiceResult<Goal> {
        self.repo
            .get_goal(user_id, goal_id)?
            .ok_or(GoalServiceError::GoalNotFound(goal_id))
    }

    fn read_back(
        &self,
        user_id: &str,
        goal_id: GoalId,
        details: &'static str,
    ) -> GoalServiceResult<Goal> {
        self.repo
            .get_goal(user_id, goal_id)?
            .ok_or(GoalServiceError::InconsistentState(details))
    }
}

#[cfg(test)]
mod tests {
    use super::{GoalPatch, GoalServiceError};
    use crate::model::goal::{Goal, GoalType};
    use crate::repo::goal_repo::RepoError;
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    #[test]
    fn patch_trims_title_and_clears_optional_fields() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap();
        let mut goal = Goal::new("u", GoalType::OneTime, "Ship", now);
        goal.description = Some("old".to_string());
        goal.deadline = Some(now);

        GoalPatch {
            title: Some("  Ship v2  ".to_string()),
            description: Some(None),
            deadline: Some(None),
            ..GoalPatch::default()
        }
        .apply(&mut goal);

        assert_eq!(goal.title, "Ship v2");
        assert!(goal.description.is_none());
        assert!(goal.deadline.is_none());
        assert_eq!(goal.kind, GoalType::OneTime);
    }

    #[test]
    fn goal_not_found_repo_error_maps_to_service_variant() {
        let id = Uuid::new_v4();
        let mapped = GoalServiceError::from(RepoError::NotFound { entity: "goal", id });
        assert!(matches!(mapped, GoalServiceError::GoalNotFound(found) if found == id));

        let other = GoalServiceError::from(RepoError::NotFound {
            entity: "milestone",
            id,
        });
        assert!(matches!(other, GoalServiceError::Repo(_)));
    }
}
