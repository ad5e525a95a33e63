//! Command-line front end for goaltrack.
//!
//! # Responsibility
//! - Parse goal, streak and milestone commands.
//! - Load `goaltrack.toml`, start logging, open the database, then call
//!   the core services.
//!
//! Streak commands use the configured day-boundary zone for "today".

use chrono::Utc;
use clap::{Parser, Subcommand};
use goaltrack_core::config::{default_config_path, CoreConfig};
use goaltrack_core::db::open_db;
use goaltrack_core::logging::init_logging_from_config;
use goaltrack_core::{
    Goal, GoalListQuery, GoalService, GoalType, MilestoneService, NewGoal, SqliteGoalRepository,
    SqliteMilestoneRepository,
};
use log::info;
use rusqlite::Connection;
use std::error::Error;
use std::path::PathBuf;
use uuid::Uuid;

#[derive(Debug, Parser)]
#[command(
    name = "goaltrack",
    version = env!("CARGO_PKG_VERSION"),
    about = "Track goals, habit streaks and milestones"
)]
struct Cli {
    /// Override database path
    #[arg(global = true, long = "db")]
    db: Option<PathBuf>,

    /// Config file path (default: <data dir>/goaltrack/goaltrack.toml)
    #[arg(global = true, long = "config")]
    config: Option<PathBuf>,

    /// User scope for all goal data
    #[arg(global = true, long = "user", default_value = "local")]
    user: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create a goal
    Add {
        title: String,
        /// `habit` or `one-time`
        #[arg(long, default_value = "habit", value_parser = parse_kind)]
        kind: GoalType,
        #[arg(long, default_value = "")]
        icon: String,
    },
    /// List goals, newest first
    List {
        /// Include completed goals
        #[arg(long)]
        all: bool,
    },
    /// Mark a habit done for today
    Done { id: Uuid },
    /// Undo today's completion
    Undo { id: Uuid },
    /// Show streak history, newest first
    History {
        id: Uuid,
        #[arg(long)]
        limit: Option<u32>,
    },
    /// Mark a goal completed
    Complete { id: Uuid },
    /// Delete a goal with its milestones and history
    Delete { id: Uuid },
    /// Manage milestones
    #[command(subcommand)]
    Milestone(MilestoneCommand),
}

#[derive(Debug, Subcommand)]
enum MilestoneCommand {
    /// Append a milestone to a goal
    Add { goal: Uuid, text: String },
    /// Flip a milestone's completion flag
    Toggle { goal: Uuid, milestone: Uuid },
}

fn parse_kind(value: &str) -> Result<GoalType, String> {
    GoalType::parse(value).ok_or_else(|| format!("unknown goal kind `{value}`"))
}

fn main() {
    let cli = Cli::parse();
    if let Err(err) = run(cli) {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let config_path = cli.config.clone().unwrap_or_else(default_config_path);
    let mut config = CoreConfig::load_with_env(&config_path)?;
    if let Some(db) = &cli.db {
        config.storage.db_path = Some(db.clone());
    }

    if let Err(err) = init_logging_from_config(&config.logging, &config.resolved_log_dir()) {
        eprintln!("Warning: logging disabled: {err}");
    }

    let db_path = config.resolved_db_path();
    let conn = open_db(&db_path)?;
    info!(
        "event=cli_start module=cli status=start command={}",
        command_name(&cli.command)
    );
    execute(&conn, &config, &cli.user, cli.command)
}

fn execute(
    conn: &Connection,
    config: &CoreConfig,
    user: &str,
    command: Command,
) -> Result<(), Box<dyn Error>> {
    let goals = GoalService::new(SqliteGoalRepository::try_new(conn)?);
    match command {
        Command::Add { title, kind, icon } => {
            let mut request = NewGoal::new(title, kind);
            request.icon = icon;
            let goal = goals.create_goal(user, request, Utc::now())?;
            println!("Created {} ({})", goal.id, goal.kind.as_str());
        }
        Command::List { all } => {
            let query = GoalListQuery {
                completed: if all { None } else { Some(false) },
                ..GoalListQuery::for_user(user)
            };
            let listed = goals.list_goals(&query)?;
            if listed.is_empty() {
                println!("No goals.");
            }
            for goal in &listed {
                println!("{}", format_goal_line(goal));
            }
        }
        Command::Done { id } => record_today(&goals, config, user, id, true)?,
        Command::Undo { id } => record_today(&goals, config, user, id, false)?,
        Command::History { id, limit } => {
            let limit = limit.or(Some(config.streak.history_limit));
            let zone = config.day_zone_now(Utc::now())?.timezone();
            for entry in goals.streak_history(user, id, limit)? {
                let mark = if entry.completed { "done" } else { "missed" };
                let local = entry.date.with_timezone(&zone);
                println!("{}  {mark}", local.format("%Y-%m-%d %H:%M"));
            }
        }
        Command::Complete { id } => {
            let goal = goals.complete_goal(user, id, Utc::now())?;
            println!("Completed {}", goal.id);
        }
        Command::Delete { id } => {
            goals.delete_goal(user, id)?;
            println!("Deleted {id}");
        }
        Command::Milestone(command) => {
            let milestones = MilestoneService::new(SqliteMilestoneRepository::try_new(conn)?);
            match command {
                MilestoneCommand::Add { goal, text } => {
                    let milestone = milestones.add_milestone(user, goal, &text, Utc::now())?;
                    println!("Added milestone {}", milestone.id);
                }
                MilestoneCommand::Toggle { goal, milestone } => {
                    let milestone =
                        milestones.toggle_milestone(user, goal, milestone, Utc::now())?;
                    let state = if milestone.completed { "done" } else { "open" };
                    println!("Milestone {} is {state}", milestone.id);
                }
            }
        }
    }
    Ok(())
}

fn record_today(
    goals: &GoalService<SqliteGoalRepository<'_>>,
    config: &CoreConfig,
    user: &str,
    id: Uuid,
    completed: bool,
) -> Result<(), Box<dyn Error>> {
    let now = config.day_zone_now(Utc::now())?;
    let update = goals.update_streak(user, id, completed, &now)?;
    let record = update.record;
    if !update.counters_changed() {
        println!("Streak unchanged: {} (best {})", record.current, record.best);
    } else if update.best_improved() {
        println!("New best streak: {}", record.best);
    } else {
        println!("Streak: {} (best {})", record.current, record.best);
    }
    Ok(())
}

fn format_goal_line(goal: &Goal) -> String {
    let status = if goal.completed { "x" } else { " " };
    format!(
        "[{status}] {}  {:<9} streak {}/{}  {:>3.0}%  {}",
        goal.id,
        goal.kind.as_str(),
        goal.streak.current,
        goal.streak.best,
        goal.progress * 100.0,
        goal.title
    )
}

fn command_name(command: &Command) -> &'static str {
    match command {
        Command::Add { .. } => "add",
        Command::List { .. } => "list",
        Command::Done { .. } => "done",
        Command::Undo { .. } => "undo",
        Command::History { .. } => "history",
        Command::Complete { .. } => "complete",
        Command::Delete { .. } => "delete",
        Command::Milestone(MilestoneCommand::Add { .. }) => "milestone_add",
        Command::Milestone(MilestoneCommand::Toggle { .. }) => "milestone_toggle",
    }
}

#[cfg(test)]
mod tests {
    use super::{Cli, Command, MilestoneCommand};
    use clap::Parser;
    use goaltrack_core::GoalType;
    use std::path::PathBuf;

    #[test]
    fn add_parses_kind_and_defaults_user() {
        let cli = Cli::try_parse_from(["goaltrack", "add", "Read daily", "--kind", "one-time"])
            .unwrap();
        assert_eq!(cli.user, "local");
        match cli.command {
            Command::Add { title, kind, icon } => {
                assert_eq!(title, "Read daily");
                assert_eq!(kind, GoalType::OneTime);
                assert!(icon.is_empty());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn unknown_kind_is_rejected() {
        assert!(Cli::try_parse_from(["goaltrack", "add", "x", "--kind", "weekly"]).is_err());
    }

    #[test]
    fn global_flags_work_after_subcommand() {
        let id = "6f1c1d2e-3b4a-4c5d-8e9f-0a1b2c3d4e5f";
        let cli = Cli::try_parse_from([
            "goaltrack",
            "history",
            id,
            "--limit",
            "7",
            "--db",
            "/tmp/g.sqlite3",
            "--user",
            "alice",
        ])
        .unwrap();
        assert_eq!(cli.db, Some(PathBuf::from("/tmp/g.sqlite3")));
        assert_eq!(cli.user, "alice");
        match cli.command {
            Command::History { id: parsed, limit } => {
                assert_eq!(parsed.to_string(), id);
                assert_eq!(limit, Some(7));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn milestone_toggle_requires_two_ids() {
        let goal = "6f1c1d2e-3b4a-4c5d-8e9f-0a1b2c3d4e5f";
        let milestone = "0d9a2b47-8f0e-4f63-9c59-2f7a4b1e6c3d";
        let cli =
            Cli::try_parse_from(["goaltrack", "milestone", "toggle", goal, milestone]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Milestone(MilestoneCommand::Toggle { .. })
        ));
        assert!(Cli::try_parse_from(["goaltrack", "milestone", "toggle", goal]).is_err());
    }

    #[test]
    fn malformed_goal_id_is_rejected() {
        assert!(Cli::try_parse_from(["goaltrack", "done", "not-a-uuid"]).is_err());
    }
}
