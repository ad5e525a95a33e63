//! Milestone repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist goal milestones and their activity logs.
//! - Scope every mutation to a goal owned by the calling user.
//!
//! # Invariants
//! - Milestones and updates are listed in insertion order (`position ASC`).
//! - Deleting a milestone deletes its activity log.

use crate::model::goal::GoalId;
use crate::model::milestone::{Milestone, MilestoneId, MilestoneUpdate, MilestoneUpdateId};
use crate::repo::goal_repo::{goal_exists, touch_goal, RepoError, RepoResult};
use crate::repo::support::{
    bool_to_int, ensure_connection_ready, format_timestamp, int_to_bool, parse_timestamp,
    parse_uuid,
};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Transaction, TransactionBehavior};

/// Repository interface for milestone operations.
///
/// Every mutation refreshes the owning goal's `last_updated` to `at` in the
/// same transaction as the milestone write.
pub trait MilestoneRepository {
    /// Returns whether `goal_id` exists for `user_id`.
    fn goal_exists(&self, user_id: &str, goal_id: GoalId) -> RepoResult<bool>;
    /// Appends a milestone (and any updates it already carries).
    fn add_milestone(
        &self,
        user_id: &str,
        goal_id: GoalId,
        milestone: &Milestone,
        at: DateTime<Utc>,
    ) -> RepoResult<()>;
    fn get_milestone(
        &self,
        goal_id: GoalId,
        milestone_id: MilestoneId,
    ) -> RepoResult<Option<Milestone>>;
    fn set_milestone_completed(
        &self,
        user_id: &str,
        goal_id: GoalId,
        milestone_id: MilestoneId,
        completed: bool,
        at: DateTime<Utc>,
    ) -> RepoResult<()>;
    fn rename_milestone(
        &self,
        user_id: &str,
        goal_id: GoalId,
        milestone_id: MilestoneId,
        text: &str,
        at: DateTime<Utc>,
    ) -> RepoResult<()>;
    fn delete_milestone(
        &self,
        user_id: &str,
        goal_id: GoalId,
        milestone_id: MilestoneId,
        at: DateTime<Utc>,
    ) -> RepoResult<()>;
    fn add_milestone_update(
        &self,
        user_id: &str,
        goal_id: GoalId,
        milestone_id: MilestoneId,
        update: &MilestoneUpdate,
    ) -> RepoResult<()>;
    fn delete_milestone_update(
        &self,
        user_id: &str,
        goal_id: GoalId,
        milestone_id: MilestoneId,
        update_id: MilestoneUpdateId,
        at: DateTime<Utc>,
    ) -> RepoResult<()>;
    fn list_milestones(&self, goal_id: GoalId) -> RepoResult<Vec<Milestone>>;
}

/// SQLite-backed milestone repository.
pub struct SqliteMilestoneRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteMilestoneRepository<'conn> {
    /// Creates repository from migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, &["goals", "milestones", "milestone_updates"])?;
        Ok(Self { conn })
    }

    /// Runs `write`, then touches the goal; both commit or neither does.
    fn write_and_touch<T>(
        &self,
        user_id: &str,
        goal_id: GoalId,
        at: DateTime<Utc>,
        write: impl FnOnce(&Connection) -> RepoResult<T>,
    ) -> RepoResult<T> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let value = write(&tx)?;
        touch_goal(&tx, user_id, goal_id, at)?;
        tx.commit()?;
        Ok(value)
    }
}

impl MilestoneRepository for SqliteMilestoneRepository<'_> {
    fn goal_exists(&self, user_id: &str, goal_id: GoalId) -> RepoResult<bool> {
        goal_exists(self.conn, user_id, goal_id)
    }

    fn add_milestone(
        &self,
        user_id: &str,
        goal_id: GoalId,
        milestone: &Milestone,
        at: DateTime<Utc>,
    ) -> RepoResult<()> {
        milestone.validate()?;

        self.write_and_touch(user_id, goal_id, at, |conn| {
            let position: i64 = conn.query_row(
                "SELECT COALESCE(MAX(position) + 1, 0) FROM milestones WHERE goal_id = ?1;",
                [goal_id.to_string()],
                |row| row.get(0),
            )?;
            insert_milestone(conn, goal_id, milestone, position)
        })
    }

    fn get_milestone(
        &self,
        goal_id: GoalId,
        milestone_id: MilestoneId,
    ) -> RepoResult<Option<Milestone>> {
        let milestones = load_milestones(self.conn, goal_id)?;
        Ok(milestones
            .into_iter()
            .find(|milestone| milestone.id == milestone_id))
    }

    fn set_milestone_completed(
        &self,
        user_id: &str,
        goal_id: GoalId,
        milestone_id: MilestoneId,
        completed: bool,
        at: DateTime<Utc>,
    ) -> RepoResult<()> {
        self.write_and_touch(user_id, goal_id, at, |conn| {
            let changed = conn.execute(
                "UPDATE milestones SET completed = ?1 WHERE id = ?2 AND goal_id = ?3;",
                params![
                    bool_to_int(completed),
                    milestone_id.to_string(),
                    goal_id.to_string()
                ],
            )?;
            ensure_changed(changed, "milestone", milestone_id)
        })
    }

    fn rename_milestone(
        &self,
        user_id: &str,
        goal_id: GoalId,
        milestone_id: MilestoneId,
        text: &str,
        at: DateTime<Utc>,
    ) -> RepoResult<()> {
        self.write_and_touch(user_id, goal_id, at, |conn| {
            let changed = conn.execute(
                "UPDATE milestones SET text = ?1 WHERE id = ?2 AND goal_id = ?3;",
                params![text, milestone_id.to_string(), goal_id.to_string()],
            )?;
            ensure_changed(changed, "milestone", milestone_id)
        })
    }

    fn delete_milestone(
        &self,
        user_id: &str,
        goal_id: GoalId,
        milestone_id: MilestoneId,
        at: DateTime<Utc>,
    ) -> RepoResult<()> {
        self.write_and_touch(user_id, goal_id, at, |conn| {
            let changed = conn.execute(
                "DELETE FROM milestones WHERE id = ?1 AND goal_id = ?2;",
                params![milestone_id.to_string(), goal_id.to_string()],
            )?;
            ensure_changed(changed, "milestone", milestone_id)
        })
    }

    fn add_milestone_update(
        &self,
        user_id: &str,
        goal_id: GoalId,
        milestone_id: MilestoneId,
        update: &MilestoneUpdate,
    ) -> RepoResult<()> {
        self.write_and_touch(user_id, goal_id, update.timestamp, |conn| {
            if !milestone_exists(conn, goal_id, milestone_id)? {
                return Err(RepoError::NotFound {
                    entity: "milestone",
                    id: milestone_id,
                });
            }
            let position: i64 = conn.query_row(
                "SELECT COALESCE(MAX(position) + 1, 0)
                 FROM milestone_updates
                 WHERE milestone_id = ?1;",
                [milestone_id.to_string()],
                |row| row.get(0),
            )?;
            insert_update(conn, milestone_id, update, position)
        })
    }

    fn delete_milestone_update(
        &self,
        user_id: &str,
        goal_id: GoalId,
        milestone_id: MilestoneId,
        update_id: MilestoneUpdateId,
        at: DateTime<Utc>,
    ) -> RepoResult<()> {
        self.write_and_touch(user_id, goal_id, at, |conn| {
            let changed = conn.execute(
                "DELETE FROM milestone_updates
                 WHERE id = ?1
                   AND milestone_id = ?2
                   AND EXISTS (
                       SELECT 1 FROM milestones WHERE id = ?2 AND goal_id = ?3
                   );",
                params![
                    update_id.to_string(),
                    milestone_id.to_string(),
                    goal_id.to_string()
                ],
            )?;
            ensure_changed(changed, "milestone update", update_id)
        })
    }

    fn list_milestones(&self, goal_id: GoalId) -> RepoResult<Vec<Milestone>> {
        load_milestones(self.conn, goal_id)
    }
}

pub(crate) fn insert_milestone(
    conn: &Connection,
    goal_id: GoalId,
    milestone: &Milestone,
    position: i64,
) -> RepoResult<()> {
    conn.execute(
        "INSERT INTO milestones (id, goal_id, text, completed, position)
         VALUES (?1, ?2, ?3, ?4, ?5);",
        params![
            milestone.id.to_string(),
            goal_id.to_string(),
            milestone.text.as_str(),
            bool_to_int(milestone.completed),
            position,
        ],
    )?;
    for (update_position, update) in milestone.updates.iter().enumerate() {
        insert_update(conn, milestone.id, update, update_position as i64)?;
    }
    Ok(())
}

pub(crate) fn load_milestones(conn: &Connection, goal_id: GoalId) -> RepoResult<Vec<Milestone>> {
    let mut stmt = conn.prepare(
        "SELECT id, text, completed
         FROM milestones
         WHERE goal_id = ?1
         ORDER BY position ASC, id ASC;",
    )?;
    let mut rows = stmt.query([goal_id.to_string()])?;
    let mut milestones = Vec::new();
    while let Some(row) = rows.next()? {
        let id_text: String = row.get("id")?;
        milestones.push(Milestone {
            id: parse_uuid(&id_text, "milestones.id")?,
            text: row.get("text")?,
            completed: int_to_bool(row.get("completed")?, "milestones.completed")?,
            updates: load_updates(conn, &id_text)?,
        });
    }
    Ok(milestones)
}

fn load_updates(conn: &Connection, milestone_id: &str) -> RepoResult<Vec<MilestoneUpdate>> {
    let mut stmt = conn.prepare(
        "SELECT id, text, timestamp
         FROM milestone_updates
         WHERE milestone_id = ?1
         ORDER BY position ASC, id ASC;",
    )?;
    let mut rows = stmt.query([milestone_id])?;
    let mut updates = Vec::new();
    while let Some(row) = rows.next()? {
        let id_text: String = row.get("id")?;
        let timestamp: String = row.get("timestamp")?;
        updates.push(MilestoneUpdate {
            id: parse_uuid(&id_text, "milestone_updates.id")?,
            text: row.get("text")?,
            timestamp: parse_timestamp(&timestamp, "milestone_updates.timestamp")?,
        });
    }
    Ok(updates)
}

fn insert_update(
    conn: &Connection,
    milestone_id: MilestoneId,
    update: &MilestoneUpdate,
    position: i64,
) -> RepoResult<()> {
    conn.execute(
        "INSERT INTO milestone_updates (id, milestone_id, text, timestamp, position)
         VALUES (?1, ?2, ?3, ?4, ?5);",
        params![
            update.id.to_string(),
            milestone_id.to_string(),
            update.text.as_str(),
            format_timestamp(update.timestamp),
            position,
        ],
    )?;
    Ok(())
}

fn milestone_exists(
    conn: &Connection,
    goal_id: GoalId,
    milestone_id: MilestoneId,
) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1 FROM milestones WHERE id = ?1 AND goal_id = ?2
        );",
        params![milestone_id.to_string(), goal_id.to_string()],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn ensure_changed(changed: usize, entity: &'static str, id: uuid::Uuid) -> RepoResult<()> {
    if changed == 0 {
        return Err(RepoError::NotFound { entity, id });
    }
    Ok(())
}
