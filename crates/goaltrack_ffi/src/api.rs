//! FFI use-case API for Flutter-facing calls.
//!
//! # Responsibility
//! - Expose stable, use-case-level goal and streak functions to Dart via FRB.
//! - Keep error semantics simple: every call returns an envelope with
//!   `ok` + `message` instead of throwing.
//!
//! # Invariants
//! - Exported functions must not panic across FFI boundary.
//! - IDs cross the boundary as canonical UUID strings.
//! - Instants cross the boundary as Unix epoch milliseconds.

use chrono::{DateTime, Local, Utc};
use goaltrack_core::db::open_db;
use goaltrack_core::{
    core_version as core_version_inner, init_logging as init_logging_inner, ping as ping_inner,
    Goal, GoalListQuery, GoalService, GoalServiceError, GoalType, NewGoal, SqliteGoalRepository,
};
use log::warn;
use std::path::PathBuf;
use std::sync::OnceLock;
use uuid::Uuid;

const GOALS_DB_FILE_NAME: &str = "goaltrack_ffi.sqlite3";
const DB_PATH_ENV: &str = "GOALTRACK_DB_PATH";
static GOALS_DB_PATH: OnceLock<PathBuf> = OnceLock::new();

/// Minimal health-check API for FRB smoke integration.
///
/// # FFI contract
/// - Sync call, non-blocking.
/// - Never throws; always returns a UTF-8 string.
#[flutter_rust_bridge::frb(sync)]
pub fn ping() -> String {
    ping_inner().to_owned()
}

/// Expose core crate version through FFI.
#[flutter_rust_bridge::frb(sync)]
pub fn core_version() -> String {
    core_version_inner().to_owned()
}

/// Initializes Rust core logging once per process.
///
/// Input semantics:
/// - `level`: one of `trace|debug|info|warn|error` (case-insensitive).
/// - `log_dir`: absolute directory path where rolling logs are written.
///
/// # FFI contract
/// - Safe to call repeatedly with the same `level + log_dir` (idempotent).
/// - Reconfiguration attempts with different level or directory return error.
/// - Never panics; returns empty string on success and error message on failure.
#[flutter_rust_bridge::frb(sync)]
pub fn init_logging(level: String, log_dir: String) -> String {
    match init_logging_inner(level.as_str(), log_dir.as_str()) {
        Ok(()) => String::new(),
        Err(err) => err.to_string(),
    }
}

/// Flat goal projection for list screens.
#[derive(Debug, Clone, PartialEq)]
pub struct GoalItem {
    pub goal_id: String,
    pub title: String,
    /// `habit|one_time`.
    pub kind: String,
    pub icon: String,
    pub progress: f64,
    pub completed: bool,
    pub streak_current: u32,
    pub streak_best: u32,
    pub last_completed_ms: Option<i64>,
    pub milestone_count: u32,
}

/// Single-goal action response.
#[derive(Debug, Clone, PartialEq)]
pub struct GoalActionResponse {
    pub ok: bool,
    /// Goal after the action; `None` on failure or delete.
    pub goal: Option<GoalItem>,
    pub message: String,
}

impl GoalActionResponse {
    fn success(message: impl Into<String>, goal: Option<GoalItem>) -> Self {
        Self {
            ok: true,
            goal,
            message: message.into(),
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            goal: None,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GoalListResponse {
    pub ok: bool,
    pub items: Vec<GoalItem>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreakHistoryItem {
    pub date_ms: i64,
    pub completed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreakHistoryResponse {
    pub ok: bool,
    /// Newest first.
    pub items: Vec<StreakHistoryItem>,
    pub message: String,
}

/// Streak update response.
#[derive(Debug, Clone, PartialEq)]
pub struct StreakResponse {
    pub ok: bool,
    pub streak_current: u32,
    pub streak_best: u32,
    /// Whether this call raised the best streak.
    pub best_improved: bool,
    pub message: String,
}

/// Creates a goal for `user_id`.
///
/// `kind` accepts `habit` or `one_time` / `one-time`.
#[flutter_rust_bridge::frb(sync)]
pub fn goal_create(
    user_id: String,
    title: String,
    kind: String,
    icon: String,
) -> GoalActionResponse {
    let Some(kind) = GoalType::parse(kind.trim()) else {
        return GoalActionResponse::failure(format!("goal_create failed: unknown kind `{kind}`"));
    };
    let mut request = NewGoal::new(title, kind);
    request.icon = icon.trim().to_string();

    match with_goal_service(|service| service.create_goal(user_id.trim(), request, Utc::now())) {
        Ok(goal) => GoalActionResponse::success("Goal created.", Some(to_goal_item(&goal))),
        Err(err) => GoalActionResponse::failure(format!("goal_create failed: {err}")),
    }
}

/// Lists goals for `user_id`, newest first.
#[flutter_rust_bridge::frb(sync)]
pub fn goal_list(user_id: String, include_completed: bool) -> GoalListResponse {
    let query = GoalListQuery {
        completed: if include_completed { None } else { Some(false) },
        ..GoalListQuery::for_user(user_id.trim())
    };
    match with_goal_service(|service| service.list_goals(&query)) {
        Ok(goals) => {
            let items: Vec<GoalItem> = goals.iter().map(to_goal_item).collect();
            let message = if items.is_empty() {
                "No goals.".to_string()
            } else {
                format!("Found {} goal(s).", items.len())
            };
            GoalListResponse {
                ok: true,
                items,
                message,
            }
        }
        Err(err) => GoalListResponse {
            ok: false,
            items: Vec::new(),
            message: format!("goal_list failed: {err}"),
        },
    }
}

/// Records today's completion state for a habit.
///
/// "Today" is the device's local calendar date.
#[flutter_rust_bridge::frb(sync)]
pub fn goal_complete_today(user_id: String, goal_id: String, completed: bool) -> StreakResponse {
    let failure = |message: String| StreakResponse {
        ok: false,
        streak_current: 0,
        streak_best: 0,
        best_improved: false,
        message,
    };
    let goal_id = match parse_goal_id(&goal_id) {
        Ok(id) => id,
        Err(message) => return failure(format!("goal_complete_today failed: {message}")),
    };

    let now = Local::now();
    match with_goal_service(|service| {
        service.update_streak(user_id.trim(), goal_id, completed, &now)
    }) {
        Ok(update) => StreakResponse {
            ok: true,
            streak_current: update.record.current,
            streak_best: update.record.best,
            best_improved: update.best_improved(),
            message: if update.counters_changed() {
                "Streak updated.".to_string()
            } else {
                "Streak unchanged.".to_string()
            },
        },
        Err(err) => failure(format!("goal_complete_today failed: {err}")),
    }
}

/// Lists streak history newest first; `limit` defaults to 30, max 365.
#[flutter_rust_bridge::frb(sync)]
pub fn goal_streak_history(
    user_id: String,
    goal_id: String,
    limit: Option<u32>,
) -> StreakHistoryResponse {
    let failure = |message: String| StreakHistoryResponse {
        ok: false,
        items: Vec::new(),
        message,
    };
    let goal_id = match parse_goal_id(&goal_id) {
        Ok(id) => id,
        Err(message) => return failure(format!("goal_streak_history failed: {message}")),
    };

    match with_goal_service(|service| service.streak_history(user_id.trim(), goal_id, limit)) {
        Ok(entries) => StreakHistoryResponse {
            ok: true,
            message: format!("Found {} entr(ies).", entries.len()),
            items: entries
                .into_iter()
                .map(|entry| StreakHistoryItem {
                    date_ms: epoch_ms(entry.date),
                    completed: entry.completed,
                })
                .collect(),
        },
        Err(err) => failure(format!("goal_streak_history failed: {err}")),
    }
}

/// Deletes a goal with its milestones and streak history.
#[flutter_rust_bridge::frb(sync)]
pub fn goal_delete(user_id: String, goal_id: String) -> GoalActionResponse {
    let goal_id = match parse_goal_id(&goal_id) {
        Ok(id) => id,
        Err(message) => {
            return GoalActionResponse::failure(format!("goal_delete failed: {message}"))
        }
    };
    match with_goal_service(|service| service.delete_goal(user_id.trim(), goal_id)) {
        Ok(()) => GoalActionResponse::success("Goal deleted.", None),
        Err(err) => GoalActionResponse::failure(format!("goal_delete failed: {err}")),
    }
}

fn resolve_goals_db_path() -> PathBuf {
    GOALS_DB_PATH
        .get_or_init(|| {
            if let Ok(raw) = std::env::var(DB_PATH_ENV) {
                let trimmed = raw.trim();
                if !trimmed.is_empty() {
                    return PathBuf::from(trimmed);
                }
            }
            std::env::temp_dir().join(GOALS_DB_FILE_NAME)
        })
        .clone()
}

fn with_goal_service<T>(
    f: impl FnOnce(&GoalService<SqliteGoalRepository<'_>>) -> Result<T, GoalServiceError>,
) -> Result<T, String> {
    let db_path = resolve_goals_db_path();
    let conn = open_db(&db_path).map_err(|err| format!("goals DB open failed: {err}"))?;
    let repo = SqliteGoalRepository::try_new(&conn)
        .map_err(|err| format!("goal repo init failed: {err}"))?;
    let service = GoalService::new(repo);
    f(&service).map_err(|err| {
        warn!("event=ffi_call module=ffi status=error error={err}");
        err.to_string()
    })
}

fn parse_goal_id(raw: &str) -> Result<Uuid, String> {
    Uuid::parse_str(raw.trim()).map_err(|_| format!("invalid goal id `{}`", raw.trim()))
}

fn epoch_ms(value: DateTime<Utc>) -> i64 {
    value.timestamp_millis()
}

fn to_goal_item(goal: &Goal) -> GoalItem {
    GoalItem {
        goal_id: goal.id.to_string(),
        title: goal.title.clone(),
        kind: goal.kind.as_str().to_string(),
        icon: goal.icon.clone(),
        progress: goal.progress,
        completed: goal.completed,
        streak_current: goal.streak.current,
        streak_best: goal.streak.best,
        last_completed_ms: goal.streak.last_completed.map(epoch_ms),
        milestone_count: u32::try_from(goal.milestones.len()).unwrap_or(u32::MAX),
    }
}

#[cfg(test)]
mod tests {
    use super::{
        core_version, goal_complete_today, goal_create, goal_delete, goal_list,
        goal_streak_history, init_logging, ping, resolve_goals_db_path,
    };
    use goaltrack_core::db::open_db;
    use std::time::{SystemTime, UNIX_EPOCH};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }

    #[test]
    fn init_logging_rejects_empty_log_dir() {
        let error = init_logging("info".to_string(), String::new());
        assert!(!error.is_empty());
    }

    #[test]
    fn init_logging_rejects_unsupported_level() {
        let error = init_logging("verbose".to_string(), "tmp/logs".to_string());
        assert!(!error.is_empty());
    }

    #[test]
    fn created_goal_shows_up_in_list() {
        let user = unique_user("list");
        let created = goal_create(
            user.clone(),
            "Drink water".to_string(),
            "habit".to_string(),
            "cup".to_string(),
        );
        assert!(created.ok, "{}", created.message);
        let goal = created.goal.expect("created goal");
        assert_eq!(goal.kind, "habit");
        assert_eq!(goal.streak_current, 0);

        let listed = goal_list(user, true);
        assert!(listed.ok, "{}", listed.message);
        assert_eq!(listed.items.len(), 1);
        assert_eq!(listed.items[0].goal_id, goal.goal_id);
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let response = goal_create(
            unique_user("kind"),
            "x".to_string(),
            "weekly".to_string(),
            String::new(),
        );
        assert!(!response.ok);
        assert!(response.message.contains("weekly"));
    }

    #[test]
    fn completing_on_creation_day_appends_history_only() {
        let user = unique_user("streak");
        let goal_id = create_habit(&user, "Walk");

        let streak = goal_complete_today(user.clone(), goal_id.clone(), true);
        assert!(streak.ok, "{}", streak.message);
        assert!(streak.streak_best >= streak.streak_current);

        let history = goal_streak_history(user, goal_id, None);
        assert!(history.ok, "{}", history.message);
        assert_eq!(history.items.len(), 1);
        assert!(history.items[0].completed);
    }

    #[test]
    fn malformed_goal_id_is_reported() {
        let response = goal_complete_today(unique_user("bad-id"), "not-a-uuid".to_string(), true);
        assert!(!response.ok);
        assert!(response.message.contains("invalid goal id"));
    }

    #[test]
    fn delete_removes_goal_and_history() {
        let user = unique_user("delete");
        let goal_id = create_habit(&user, "Journal");
        assert!(goal_complete_today(user.clone(), goal_id.clone(), true).ok);

        let deleted = goal_delete(user.clone(), goal_id.clone());
        assert!(deleted.ok, "{}", deleted.message);
        assert!(goal_list(user.clone(), true).items.is_empty());
        assert!(!goal_streak_history(user.clone(), goal_id.clone(), None).ok);
        assert!(!goal_delete(user, goal_id.clone()).ok);

        let conn = open_db(resolve_goals_db_path()).expect("open db");
        let rows: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM streak_history WHERE goal_id = ?1",
                [goal_id.as_str()],
                |row| row.get(0),
            )
            .expect("count history rows");
        assert_eq!(rows, 0);
    }

    fn create_habit(user: &str, title: &str) -> String {
        goal_create(
            user.to_string(),
            title.to_string(),
            "habit".to_string(),
            String::new(),
        )
        .goal
        .expect("created goal")
        .goal_id
    }

    fn unique_user(prefix: &str) -> String {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("time went backwards")
            .as_nanos();
        format!("{prefix}-{nanos}")
    }
}
