//! Milestone use-case service.
//!
//! # Responsibility
//! - Add, toggle, rename and delete milestones of one goal.
//! - Append and remove milestone activity log entries.
//!
//! # Invariants
//! - Milestone and update text is trimmed and must not be blank.
//! - Every successful mutation refreshes the owning goal's `last_updated`.
//! - The goal must belong to the calling user.

use crate::model::goal::GoalId;
use crate::model::milestone::{Milestone, MilestoneId, MilestoneUpdate, MilestoneUpdateId};
use crate::repo::goal_repo::RepoError;
use crate::repo::milestone_repo::MilestoneRepository;
use crate::repo::support::to_storage_precision;
use chrono::{DateTime, Utc};
use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Debug)]
pub enum MilestoneServiceError {
    /// Text is blank after trim.
    BlankText,
    GoalNotFound(GoalId),
    MilestoneNotFound(MilestoneId),
    UpdateNotFound(MilestoneUpdateId),
    Repo(RepoError),
}

impl Display for MilestoneServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankText => write!(f, "milestone text must not be blank"),
            Self::GoalNotFound(id) => write!(f, "goal not found: {id}"),
            Self::MilestoneNotFound(id) => write!(f, "milestone not found: {id}"),
            Self::UpdateNotFound(id) => write!(f, "milestone update not found: {id}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for MilestoneServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for MilestoneServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound { entity: "goal", id } => Self::GoalNotFound(id),
            RepoError::NotFound {
                entity: "milestone",
                id,
            } => Self::MilestoneNotFound(id),
            RepoError::NotFound {
                entity: "milestone update",
                id,
            } => Self::UpdateNotFound(id),
            other => Self::Repo(other),
        }
    }
}

pub type MilestoneServiceResult<T> = Result<T, MilestoneServiceError>;

/// Milestone service facade over repository implementations.
pub struct MilestoneService<R: MilestoneRepository> {
    repo: R,
}

impl<R: MilestoneRepository> MilestoneService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Appends an open milestone to the goal.
    pub fn add_milestone(
        &self,
        user_id: &str,
        goal_id: GoalId,
        text: &str,
        now: DateTime<Utc>,
    ) -> MilestoneServiceResult<Milestone> {
        let text = non_blank(text)?;
        self.require_goal(user_id, goal_id)?;

        let milestone = Milestone::new(text);
        self.repo.add_milestone(user_id, goal_id, &milestone, now)?;
        Ok(milestone)
    }

    /// Flips the completion flag and returns the updated milestone.
    pub fn toggle_milestone(
        &self,
        user_id: &str,
        goal_id: GoalId,
        milestone_id: MilestoneId,
        now: DateTime<Utc>,
    ) -> MilestoneServiceResult<Milestone> {
        self.require_goal(user_id, goal_id)?;
        let current = self.require_milestone(goal_id, milestone_id)?;
        self.repo
            .set_milestone_completed(user_id, goal_id, milestone_id, !current.completed, now)?;
        self.require_milestone(goal_id, milestone_id)
    }

    pub fn rename_milestone(
        &self,
        user_id: &str,
        goal_id: GoalId,
        milestone_id: MilestoneId,
        text: &str,
        now: DateTime<Utc>,
    ) -> MilestoneServiceResult<Milestone> {
        let text = non_blank(text)?;
        self.require_goal(user_id, goal_id)?;
        self.repo
            .rename_milestone(user_id, goal_id, milestone_id, text, now)?;
        self.require_milestone(goal_id, milestone_id)
    }

    pub fn delete_milestone(
        &self,
        user_id: &str,
        goal_id: GoalId,
        milestone_id: MilestoneId,
        now: DateTime<Utc>,
    ) -> MilestoneServiceResult<()> {
        self.require_goal(user_id, goal_id)?;
        self.repo
            .delete_milestone(user_id, goal_id, milestone_id, now)?;
        Ok(())
    }

    /// Appends one activity log line stamped with `now`.
    pub fn add_update(
        &self,
        user_id: &str,
        goal_id: GoalId,
        milestone_id: MilestoneId,
        text: &str,
        now: DateTime<Utc>,
    ) -> MilestoneServiceResult<MilestoneUpdate> {
        let text = non_blank(text)?;
        self.require_goal(user_id, goal_id)?;

        let update = MilestoneUpdate::new(text, to_storage_precision(now));
        self.repo
            .add_milestone_update(user_id, goal_id, milestone_id, &update)?;
        Ok(update)
    }

    pub fn delete_update(
        &self,
        user_id: &str,
        goal_id: GoalId,
        milestone_id: MilestoneId,
        update_id: MilestoneUpdateId,
        now: DateTime<Utc>,
    ) -> MilestoneServiceResult<()> {
        self.require_goal(user_id, goal_id)?;
        self.repo
            .delete_milestone_update(user_id, goal_id, milestone_id, update_id, now)?;
        Ok(())
    }

    pub fn list_milestones(
        &self,
        user_id: &str,
        goal_id: GoalId,
    ) -> MilestoneServiceResult<Vec<Milestone>> {
        self.require_goal(user_id, goal_id)?;
        Ok(self.repo.list_milestones(goal_id)?)
    }

    fn require_goal(&self, user_id: &str, goal_id: GoalId) -> MilestoneServiceResult<()> {
        if self.repo.goal_exists(user_id, goal_id)? {
            Ok(())
        } else {
            Err(MilestoneServiceError::GoalNotFound(goal_id))
        }
    }

    fn require_milestone(
        &self,
        goal_id: GoalId,
        milestone_id: MilestoneId,
    ) -> MilestoneServiceResult<Milestone> {
        self.repo
            .get_milestone(goal_id, milestone_id)?
            .ok_or(MilestoneServiceError::MilestoneNotFound(milestone_id))
    }
}

fn non_blank(text: &str) -> MilestoneServiceResult<&str> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        Err(MilestoneServiceError::BlankText)
    } else {
        Ok(trimmed)
    }
}
