//! Goal repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide user-scoped CRUD APIs over canonical `goals` storage.
//! - Own the transactional streak write path (`transact_streak`).
//! - Keep SQL details inside core persistence boundary.
//!
//! # Invariants
//! - Write paths must call `Goal::validate()` before SQL mutations.
//! - Read paths reject invalid persisted state instead of masking it, except
//!   `streak_last_completed`, which degrades to `None` when unparsable.
//! - Streak counters and the matching history row are written in one
//!   `IMMEDIATE` transaction.
//! - Goal deletion cascades to milestones, streak history and notifications.
//! - Streak history entries sharing `recorded_at` list in reverse append order.

use crate::db::DbError;
use crate::model::goal::{Frequency, Goal, GoalId, GoalType, GoalValidationError, Reminder};
use crate::model::streak::{StreakHistoryEntry, StreakRecord, StreakUpdate};
use crate::repo::milestone_repo::{insert_milestone, load_milestones};
use crate::repo::support::{
    bool_to_int, ensure_connection_ready, format_timestamp, int_to_bool, parse_timestamp,
    parse_uuid,
};
use chrono::{DateTime, Utc};
use log::warn;
use rusqlite::types::Value;
use rusqlite::{
    params, params_from_iter, Connection, OptionalExtension, Row, Transaction, TransactionBehavior,
};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

const GOAL_SELECT_SQL: &str = "SELECT
    id,
    user_id,
    title,
    description,
    type,
    icon,
    deadline,
    frequency_json,
    progress,
    streak_current,
    streak_best,
    streak_last_completed,
    reminders_json,
    category,
    completed,
    created_at,
    last_updated
FROM goals";

const HISTORY_DEFAULT_LIMIT: u32 = 30;
const HISTORY_LIMIT_MAX: u32 = 365;

pub type RepoResult<T> = Result<T, RepoError>;

/// Generic repository error for goal-owned persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    Validation(GoalValidationError),
    Db(DbError),
    /// Target row does not exist or belongs to another user.
    NotFound { entity: &'static str, id: Uuid },
    InvalidData(String),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    MissingRequiredTable(&'static str),
}

impl RepoError {
    pub(crate) fn goal_not_found(id: GoalId) -> Self {
        Self::NotFound { entity: "goal", id }
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound { entity, id } => write!(f, "{entity} not found: {id}"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "connection schema version {actual_version} does not match expected {expected_version}"
            ),
            Self::MissingRequiredTable(table) => write!(f, "required table missing: {table}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<GoalValidationError> for RepoError {
    fn from(value: GoalValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Query options for listing one user's goals.
#[derive(Debug, Clone, Default)]
pub struct GoalListQuery {
    pub user_id: String,
    pub kind: Option<GoalType>,
    /// `Some(flag)` keeps only goals with that completion flag.
    pub completed: Option<bool>,
    pub limit: Option<u32>,
    pub offset: u32,
}

impl GoalListQuery {
    /// Lists every goal of `user_id`.
    pub fn for_user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            ..Self::default()
        }
    }
}

/// Repository interface for goal CRUD and streak persistence.
pub trait GoalRepository {
    /// Inserts the goal and its initial milestones.
    fn create_goal(&self, goal: &Goal) -> RepoResult<GoalId>;
    /// Gets one goal owned by `user_id`, with milestones.
    fn get_goal(&self, user_id: &str, id: GoalId) -> RepoResult<Option<Goal>>;
    /// Replaces all scalar goal fields. Milestones are managed separately.
    fn update_goal(&self, goal: &Goal) -> RepoResult<()>;
    /// Hard-deletes a goal with everything it owns.
    fn delete_goal(&self, user_id: &str, id: GoalId) -> RepoResult<()>;
    /// Lists goals sorted by `created_at DESC, id ASC`.
    fn list_goals(&self, query: &GoalListQuery) -> RepoResult<Vec<Goal>>;
    /// Reads the streak, applies `apply`, stores the result and appends the
    /// history entry atomically.
    fn transact_streak(
        &self,
        user_id: &str,
        id: GoalId,
        apply: &dyn Fn(&StreakRecord) -> StreakUpdate,
    ) -> RepoResult<StreakUpdate>;
    /// Lists history newest first. Limit defaults to 30 and clamps to 365.
    fn list_streak_history(
        &self,
        user_id: &str,
        id: GoalId,
        limit: Option<u32>,
    ) -> RepoResult<Vec<StreakHistoryEntry>>;
}

/// SQLite-backed goal repository.
pub struct SqliteGoalRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteGoalRepository<'conn> {
    /// Creates repository from migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, &["goals", "milestones", "streak_history"])?;
        Ok(Self { conn })
    }
}

impl GoalRepository for SqliteGoalRepository<'_> {
    fn create_goal(&self, goal: &Goal) -> RepoResult<GoalId> {
        goal.validate()?;

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        tx.execute(
            "INSERT INTO goals (
                id,
                user_id,
                title,
                description,
                type,
                icon,
                deadline,
                frequency_json,
                progress,
                streak_current,
                streak_best,
                streak_last_completed,
                reminders_json,
                category,
                completed,
                created_at,
                last_updated
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17);",
            params![
                goal.id.to_string(),
                goal.user_id.as_str(),
                goal.title.as_str(),
                goal.description.as_deref(),
                goal.kind.as_str(),
                goal.icon.as_str(),
                goal.deadline.map(format_timestamp),
                encode_frequency(goal.frequency.as_ref())?,
                goal.progress,
                goal.streak.current,
                goal.streak.best,
                goal.streak.last_completed.map(format_timestamp),
                encode_reminders(&goal.reminders)?,
                goal.category.as_deref(),
                bool_to_int(goal.completed),
                format_timestamp(goal.created_at),
                format_timestamp(goal.last_updated),
            ],
        )?;

        for (position, milestone) in goal.milestones.iter().enumerate() {
            insert_milestone(&tx, goal.id, milestone, position as i64)?;
        }

        tx.commit()?;
        Ok(goal.id)
    }

    fn get_goal(&self, user_id: &str, id: GoalId) -> RepoResult<Option<Goal>> {
        let mut stmt = self.conn.prepare(&format!(
            "{GOAL_SELECT_SQL}
             WHERE id = ?1
               AND user_id = ?2;"
        ))?;

        let mut rows = stmt.query(params![id.to_string(), user_id])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_goal_row(self.conn, row)?));
        }

        Ok(None)
    }

    fn update_goal(&self, goal: &Goal) -> RepoResult<()> {
        goal.validate()?;

        let changed = self.conn.execute(
            "UPDATE goals
             SET
                title = ?1,
                description = ?2,
                type = ?3,
                icon = ?4,
                deadline = ?5,
                frequency_json = ?6,
                progress = ?7,
                streak_current = ?8,
                streak_best = ?9,
                streak_last_completed = ?10,
                reminders_json = ?11,
                category = ?12,
                completed = ?13,
                last_updated = ?14
             WHERE id = ?15
               AND user_id = ?16;",
            params![
                goal.title.as_str(),
                goal.description.as_deref(),
                goal.kind.as_str(),
                goal.icon.as_str(),
                goal.deadline.map(format_timestamp),
                encode_frequency(goal.frequency.as_ref())?,
                goal.progress,
                goal.streak.current,
                goal.streak.best,
                goal.streak.last_completed.map(format_timestamp),
                encode_reminders(&goal.reminders)?,
                goal.category.as_deref(),
                bool_to_int(goal.completed),
                format_timestamp(goal.last_updated),
                goal.id.to_string(),
                goal.user_id.as_str(),
            ],
        )?;

        if changed == 0 {
            return Err(RepoError::goal_not_found(goal.id));
        }

        Ok(())
    }

    fn delete_goal(&self, user_id: &str, id: GoalId) -> RepoResult<()> {
        let changed = self.conn.execute(
            "DELETE FROM goals WHERE id = ?1 AND user_id = ?2;",
            params![id.to_string(), user_id],
        )?;

        if changed == 0 {
            return Err(RepoError::goal_not_found(id));
        }

        Ok(())
    }

    fn list_goals(&self, query: &GoalListQuery) -> RepoResult<Vec<Goal>> {
        let mut sql = format!("{GOAL_SELECT_SQL} WHERE user_id = ?");
        let mut bind_values: Vec<Value> = vec![Value::Text(query.user_id.clone())];

        if let Some(kind) = query.kind {
            sql.push_str(" AND type = ?");
            bind_values.push(Value::Text(kind.as_str().to_string()));
        }

        if let Some(completed) = query.completed {
            sql.push_str(" AND completed = ?");
            bind_values.push(Value::Integer(bool_to_int(completed)));
        }

        sql.push_str(" ORDER BY created_at DESC, id ASC");

        if let Some(limit) = query.limit {
            sql.push_str(" LIMIT ?");
            bind_values.push(Value::Integer(i64::from(limit)));
            if query.offset > 0 {
                sql.push_str(" OFFSET ?");
                bind_values.push(Value::Integer(i64::from(query.offset)));
            }
        } else if query.offset > 0 {
            sql.push_str(" LIMIT -1 OFFSET ?");
            bind_values.push(Value::Integer(i64::from(query.offset)));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut goals = Vec::new();

        while let Some(row) = rows.next()? {
            goals.push(parse_goal_row(self.conn, row)?);
        }

        Ok(goals)
    }

    fn transact_streak(
        &self,
        user_id: &str,
        id: GoalId,
        apply: &dyn Fn(&StreakRecord) -> StreakUpdate,
    ) -> RepoResult<StreakUpdate> {
        let goal_id = id.to_string();
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;

        let stored = tx
            .query_row(
                "SELECT streak_current, streak_best, streak_last_completed
                 FROM goals
                 WHERE id = ?1
                   AND user_id = ?2;",
                params![goal_id.as_str(), user_id],
                |row| {
                    Ok((
                        row.get::<_, u32>(0)?,
                        row.get::<_, u32>(1)?,
                        row.get::<_, Option<String>>(2)?,
                    ))
                },
            )
            .optional()?;
        let Some((current, best, last_completed)) = stored else {
            return Err(RepoError::goal_not_found(id));
        };

        let record = StreakRecord {
            current,
            best,
            last_completed: lenient_last_completed(id, last_completed.as_deref()),
        };
        let update = apply(&record);

        tx.execute(
            "UPDATE goals
             SET
                streak_current = ?1,
                streak_best = ?2,
                streak_last_completed = ?3,
                last_updated = ?4
             WHERE id = ?5;",
            params![
                update.record.current,
                update.record.best,
                update.record.last_completed.map(format_timestamp),
                format_timestamp(update.entry.date),
                goal_id.as_str(),
            ],
        )?;
        tx.execute(
            "INSERT INTO streak_history (id, goal_id, recorded_at, completed)
             VALUES (?1, ?2, ?3, ?4);",
            params![
                update.entry.id.to_string(),
                goal_id.as_str(),
                format_timestamp(update.entry.date),
                bool_to_int(update.entry.completed),
            ],
        )?;

        tx.commit()?;
        Ok(update)
    }

    fn list_streak_history(
        &self,
        user_id: &str,
        id: GoalId,
        limit: Option<u32>,
    ) -> RepoResult<Vec<StreakHistoryEntry>> {
        if !goal_exists(self.conn, user_id, id)? {
            return Err(RepoError::goal_not_found(id));
        }

        let mut stmt = self.conn.prepare(
            "SELECT id, recorded_at, completed
             FROM streak_history
             WHERE goal_id = ?1
             ORDER BY recorded_at DESC, rowid DESC
             LIMIT ?2;",
        )?;
        let mut rows = stmt.query(params![
            id.to_string(),
            i64::from(normalize_history_limit(limit))
        ])?;
        let mut entries = Vec::new();
        while let Some(row) = rows.next()? {
            let id_text: String = row.get("id")?;
            let recorded_at: String = row.get("recorded_at")?;
            entries.push(StreakHistoryEntry {
                id: parse_uuid(&id_text, "streak_history.id")?,
                date: parse_timestamp(&recorded_at, "streak_history.recorded_at")?,
                completed: int_to_bool(row.get("completed")?, "streak_history.completed")?,
            });
        }

        Ok(entries)
    }
}

/// Normalizes history list limit: `None`/`0` -> 30, capped at 365.
pub fn normalize_history_limit(limit: Option<u32>) -> u32 {
    match limit {
        Some(0) | None => HISTORY_DEFAULT_LIMIT,
        Some(value) if value > HISTORY_LIMIT_MAX => HISTORY_LIMIT_MAX,
        Some(value) => value,
    }
}

pub(crate) fn goal_exists(conn: &Connection, user_id: &str, id: GoalId) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM goals
            WHERE id = ?1
              AND user_id = ?2
        );",
        params![id.to_string(), user_id],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

pub(crate) fn touch_goal(
    conn: &Connection,
    user_id: &str,
    id: GoalId,
    at: DateTime<Utc>,
) -> RepoResult<()> {
    let changed = conn.execute(
        "UPDATE goals SET last_updated = ?1 WHERE id = ?2 AND user_id = ?3;",
        params![format_timestamp(at), id.to_string(), user_id],
    )?;
    if changed == 0 {
        return Err(RepoError::goal_not_found(id));
    }
    Ok(())
}

fn parse_goal_row(conn: &Connection, row: &Row<'_>) -> RepoResult<Goal> {
    let id_text: String = row.get("id")?;
    let id = parse_uuid(&id_text, "goals.id")?;

    let type_text: String = row.get("type")?;
    let kind = GoalType::parse(&type_text).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid goal type `{type_text}` in goals.type"))
    })?;

    let deadline = match row.get::<_, Option<String>>("deadline")? {
        Some(value) => Some(parse_timestamp(&value, "goals.deadline")?),
        None => None,
    };

    let frequency = match row.get::<_, Option<String>>("frequency_json")? {
        Some(value) => Some(serde_json::from_str::<Frequency>(&value).map_err(|err| {
            RepoError::InvalidData(format!("invalid goals.frequency_json: {err}"))
        })?),
        None => None,
    };

    let reminders_json: String = row.get("reminders_json")?;
    let reminders = serde_json::from_str::<Reminder>(&reminders_json)
        .map_err(|err| RepoError::InvalidData(format!("invalid goals.reminders_json: {err}")))?;

    let last_completed: Option<String> = row.get("streak_last_completed")?;
    let created_at: String = row.get("created_at")?;
    let last_updated: String = row.get("last_updated")?;

    let goal = Goal {
        id,
        user_id: row.get("user_id")?,
        title: row.get("title")?,
        description: row.get("description")?,
        kind,
        icon: row.get("icon")?,
        deadline,
        frequency,
        progress: row.get("progress")?,
        streak: StreakRecord {
            current: row.get("streak_current")?,
            best: row.get("streak_best")?,
            last_completed: lenient_last_completed(id, last_completed.as_deref()),
        },
        reminders,
        category: row.get("category")?,
        milestones: load_milestones(conn, id)?,
        completed: int_to_bool(row.get("completed")?, "goals.completed")?,
        created_at: parse_timestamp(&created_at, "goals.created_at")?,
        last_updated: parse_timestamp(&last_updated, "goals.last_updated")?,
    };
    goal.validate()?;
    Ok(goal)
}

/// Unparsable values count as "never completed" rather than failing reads.
fn lenient_last_completed(id: GoalId, value: Option<&str>) -> Option<DateTime<Utc>> {
    let value = value?;
    match parse_timestamp(value, "goals.streak_last_completed") {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            warn!(
                "event=streak_last_completed_invalid module=repo status=degraded goal_id={}",
                id
            );
            None
        }
    }
}

fn encode_frequency(frequency: Option<&Frequency>) -> RepoResult<Option<String>> {
    frequency
        .map(|value| {
            serde_json::to_string(value)
                .map_err(|err| RepoError::InvalidData(format!("frequency encode failed: {err}")))
        })
        .transpose()
}

fn encode_reminders(reminders: &Reminder) -> RepoResult<String> {
    serde_json::to_string(reminders)
        .map_err(|err| RepoError::InvalidData(format!("reminders encode failed: {err}")))
}
