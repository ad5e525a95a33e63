//! Core domain logic for goaltrack.
//! This crate is the single source of truth for goal and streak invariants.

pub mod analytics;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod store;

pub use config::{CoreConfig, ConfigError};
pub use db::{open_db, open_db_in_memory, DbError, DbResult};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::goal::{Goal, GoalId, GoalType, GoalValidationError};
pub use model::milestone::{Milestone, MilestoneUpdate};
pub use model::streak::{update_streak, StreakHistoryEntry, StreakRecord, StreakUpdate};
pub use repo::goal_repo::{
    GoalListQuery, GoalRepository, RepoError, RepoResult, SqliteGoalRepository,
};
pub use repo::milestone_repo::{MilestoneRepository, SqliteMilestoneRepository};
pub use repo::notification_repo::{NotificationRepository, SqliteNotificationRepository};
pub use service::goal_service::{GoalPatch, GoalService, GoalServiceError, NewGoal};
pub use service::milestone_service::{MilestoneService, MilestoneServiceError};
pub use store::goal_store::{reduce, GoalAction, GoalState, GoalStore};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
