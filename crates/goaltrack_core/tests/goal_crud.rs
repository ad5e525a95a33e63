use chrono::{DateTime, Duration, TimeZone, Utc};
use goaltrack_core::db::open_db_in_memory;
use goaltrack_core::model::goal::{Frequency, FrequencyType, GoalValidationError};
use goaltrack_core::{
    GoalListQuery, GoalPatch, GoalService, GoalServiceError, GoalType, NewGoal,
    SqliteGoalRepository,
};
use rusqlite::Connection;
use uuid::Uuid;

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 4, 1, 9, 0, 0).unwrap()
}

fn service(conn: &Connection) -> GoalService<SqliteGoalRepository<'_>> {
    GoalService::new(SqliteGoalRepository::try_new(conn).unwrap())
}

#[test]
fn create_goal_persists_fields_and_fresh_streak() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);

    let mut request = NewGoal::new("  Morning run  ", GoalType::Habit);
    request.description = Some("5k before work".to_string());
    request.icon = "run".to_string();
    request.category = Some("health".to_string());
    request.frequency = Some(Frequency {
        kind: FrequencyType::Weekly,
        days: vec![1, 3, 5],
        time: Some("07:30".to_string()),
    });
    request.milestones = vec!["First 1k".to_string(), "First 5k".to_string()];

    let goal = service.create_goal("u1", request, t0()).unwrap();

    assert_eq!(goal.title, "Morning run");
    assert_eq!(goal.kind, GoalType::Habit);
    assert_eq!(goal.progress, 0.0);
    assert!(!goal.completed);
    assert_eq!(goal.streak.current, 0);
    assert_eq!(goal.streak.best, 0);
    assert_eq!(goal.streak.last_completed, Some(t0()));
    assert_eq!(goal.created_at, t0());
    assert_eq!(goal.frequency.as_ref().unwrap().days, vec![1, 3, 5]);

    let texts: Vec<&str> = goal.milestones.iter().map(|m| m.text.as_str()).collect();
    assert_eq!(texts, vec!["First 1k", "First 5k"]);

    let loaded = service.get_goal("u1", goal.id).unwrap().unwrap();
    assert_eq!(loaded, goal);
}

#[test]
fn blank_title_is_rejected() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);

    let err = service
        .create_goal("u1", NewGoal::new("   ", GoalType::OneTime), t0())
        .unwrap_err();
    assert!(matches!(
        err,
        GoalServiceError::InvalidInput(GoalValidationError::EmptyTitle)
    ));
}

#[test]
fn goals_are_scoped_per_user() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);

    let goal = service
        .create_goal("u1", NewGoal::new("Read", GoalType::Habit), t0())
        .unwrap();

    assert!(service.get_goal("u2", goal.id).unwrap().is_none());
    assert!(service
        .list_goals(&GoalListQuery::for_user("u2"))
        .unwrap()
        .is_empty());
    assert!(matches!(
        service.delete_goal("u2", goal.id),
        Err(GoalServiceError::GoalNotFound(id)) if id == goal.id
    ));
}

#[test]
fn list_goals_is_newest_first_and_filters() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);

    let older = service
        .create_goal("u1", NewGoal::new("Older", GoalType::Habit), t0())
        .unwrap();
    let newer = service
        .create_goal(
            "u1",
            NewGoal::new("Newer", GoalType::OneTime),
            t0() + Duration::hours(1),
        )
        .unwrap();
    service
        .complete_goal("u1", newer.id, t0() + Duration::hours(2))
        .unwrap();

    let all = service.list_goals(&GoalListQuery::for_user("u1")).unwrap();
    let ids: Vec<Uuid> = all.iter().map(|goal| goal.id).collect();
    assert_eq!(ids, vec![newer.id, older.id]);

    let open = service
        .list_goals(&GoalListQuery {
            completed: Some(false),
            ..GoalListQuery::for_user("u1")
        })
        .unwrap();
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].id, older.id);

    let habits = service
        .list_goals(&GoalListQuery {
            kind: Some(GoalType::Habit),
            ..GoalListQuery::for_user("u1")
        })
        .unwrap();
    assert_eq!(habits.len(), 1);

    let paged = service
        .list_goals(&GoalListQuery {
            limit: Some(1),
            offset: 1,
            ..GoalListQuery::for_user("u1")
        })
        .unwrap();
    assert_eq!(paged.len(), 1);
    assert_eq!(paged[0].id, older.id);
}

#[test]
fn update_goal_applies_patch_and_touches_last_updated() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);
    let mut request = NewGoal::new("Ship", GoalType::OneTime);
    request.description = Some("draft".to_string());
    let goal = service.create_goal("u1", request, t0()).unwrap();

    let later = t0() + Duration::days(1);
    let updated = service
        .update_goal(
            "u1",
            goal.id,
            GoalPatch {
                title: Some("Ship v2".to_string()),
                description: Some(None),
                progress: Some(0.5),
                ..GoalPatch::default()
            },
            later,
        )
        .unwrap();

    assert_eq!(updated.title, "Ship v2");
    assert!(updated.description.is_none());
    assert_eq!(updated.progress, 0.5);
    assert_eq!(updated.last_updated, later);
    assert_eq!(updated.created_at, t0());
}

#[test]
fn update_goal_rejects_out_of_range_progress() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);
    let goal = service
        .create_goal("u1", NewGoal::new("Ship", GoalType::OneTime), t0())
        .unwrap();

    let err = service
        .update_goal(
            "u1",
            goal.id,
            GoalPatch {
                progress: Some(1.5),
                ..GoalPatch::default()
            },
            t0(),
        )
        .unwrap_err();
    assert!(matches!(err, GoalServiceError::InvalidInput(_)));
    assert_eq!(service.get_goal("u1", goal.id).unwrap().unwrap().progress, 0.0);
}

#[test]
fn complete_goal_sets_full_progress() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);
    let goal = service
        .create_goal("u1", NewGoal::new("Ship", GoalType::OneTime), t0())
        .unwrap();

    let done = service
        .complete_goal("u1", goal.id, t0() + Duration::hours(3))
        .unwrap();
    assert!(done.completed);
    assert_eq!(done.progress, 1.0);
}

#[test]
fn unknown_goal_operations_report_not_found() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);
    let missing = Uuid::new_v4();

    assert!(service.get_goal("u1", missing).unwrap().is_none());
    assert!(matches!(
        service.complete_goal("u1", missing, t0()),
        Err(GoalServiceError::GoalNotFound(_))
    ));
    assert!(matches!(
        service.update_goal("u1", missing, GoalPatch::default(), t0()),
        Err(GoalServiceError::GoalNotFound(_))
    ));
}

#[test]
fn delete_goal_removes_goal_and_milestones() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);
    let mut request = NewGoal::new("Read", GoalType::Habit);
    request.milestones = vec!["Chapter 1".to_string()];
    let goal = service.create_goal("u1", request, t0()).unwrap();

    service.delete_goal("u1", goal.id).unwrap();

    assert!(service.get_goal("u1", goal.id).unwrap().is_none());
    let milestones: i64 = conn
        .query_row("SELECT COUNT(*) FROM milestones;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(milestones, 0);
}
