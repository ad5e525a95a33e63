use chrono::{Duration, TimeZone, Utc};
use goaltrack_core::db::open_db_in_memory;
use goaltrack_core::repo::goal_repo::GoalListQuery;
use goaltrack_core::store::goal_store::LOAD_GOALS_ERROR;
use goaltrack_core::{
    Goal, GoalAction, GoalRepository, GoalService, GoalStore, GoalType, NewGoal, RepoError,
    RepoResult, SqliteGoalRepository, StreakHistoryEntry, StreakRecord, StreakUpdate,
};
use std::cell::RefCell;
use std::rc::Rc;
use uuid::Uuid;

struct BrokenRepo;

impl GoalRepository for BrokenRepo {
    fn create_goal(&self, _goal: &Goal) -> RepoResult<Uuid> {
        Err(RepoError::InvalidData("offline".to_string()))
    }

    fn get_goal(&self, _user_id: &str, _id: Uuid) -> RepoResult<Option<Goal>> {
        Err(RepoError::InvalidData("offline".to_string()))
    }

    fn update_goal(&self, _goal: &Goal) -> RepoResult<()> {
        Err(RepoError::InvalidData("offline".to_string()))
    }

    fn delete_goal(&self, _user_id: &str, _id: Uuid) -> RepoResult<()> {
        Err(RepoError::InvalidData("offline".to_string()))
    }

    fn list_goals(&self, _query: &GoalListQuery) -> RepoResult<Vec<Goal>> {
        Err(RepoError::InvalidData("offline".to_string()))
    }

    fn transact_streak(
        &self,
        _user_id: &str,
        _id: Uuid,
        _apply: &dyn Fn(&StreakRecord) -> StreakUpdate,
    ) -> RepoResult<StreakUpdate> {
        Err(RepoError::InvalidData("offline".to_string()))
    }

    fn list_streak_history(
        &self,
        _user_id: &str,
        _id: Uuid,
        _limit: Option<u32>,
    ) -> RepoResult<Vec<StreakHistoryEntry>> {
        Err(RepoError::InvalidData("offline".to_string()))
    }
}

#[test]
fn sync_user_loads_goals_newest_first() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteGoalRepository::try_new(&conn).unwrap();
    let t0 = Utc.with_ymd_and_hms(2024, 2, 1, 10, 0, 0).unwrap();
    {
        let service = GoalService::new(SqliteGoalRepository::try_new(&conn).unwrap());
        service
            .create_goal("u1", NewGoal::new("First", GoalType::Habit), t0)
            .unwrap();
        service
            .create_goal(
                "u1",
                NewGoal::new("Second", GoalType::Habit),
                t0 + Duration::minutes(1),
            )
            .unwrap();
        service
            .create_goal("u2", NewGoal::new("Elsewhere", GoalType::Habit), t0)
            .unwrap();
    }

    let mut store = GoalStore::new();
    let loading_seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&loading_seen);
    store.subscribe(move |state| sink.borrow_mut().push(state.loading));

    store.sync_user(Some("u1"), &repo);

    let titles: Vec<&str> = store
        .state()
        .goals
        .iter()
        .map(|goal| goal.title.as_str())
        .collect();
    assert_eq!(titles, vec!["Second", "First"]);
    assert!(!store.state().loading);
    assert!(store.state().error.is_none());
    assert_eq!(store.user_id(), Some("u1"));
    assert_eq!(*loading_seen.borrow(), vec![true, true, false]);
}

#[test]
fn signing_out_clears_goals() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteGoalRepository::try_new(&conn).unwrap();
    let mut store = GoalStore::new();
    let now = Utc.with_ymd_and_hms(2024, 2, 1, 10, 0, 0).unwrap();
    store.dispatch(GoalAction::AddGoal(Goal::new(
        "u1",
        GoalType::OneTime,
        "Stale",
        now,
    )));

    store.sync_user(None, &repo);

    assert!(store.state().goals.is_empty());
    assert!(store.user_id().is_none());
}

#[test]
fn load_failure_sets_error_and_clears_loading() {
    let mut store = GoalStore::new();

    store.sync_user(Some("u1"), &BrokenRepo);

    assert_eq!(store.state().error.as_deref(), Some(LOAD_GOALS_ERROR));
    assert!(!store.state().loading);
    assert!(store.state().goals.is_empty());
}

#[test]
fn refresh_picks_up_new_goals() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteGoalRepository::try_new(&conn).unwrap();
    let mut store = GoalStore::new();
    store.sync_user(Some("u1"), &repo);
    assert!(store.state().goals.is_empty());

    let service = GoalService::new(SqliteGoalRepository::try_new(&conn).unwrap());
    service
        .create_goal(
            "u1",
            NewGoal::new("Later", GoalType::Habit),
            Utc.with_ymd_and_hms(2024, 2, 2, 10, 0, 0).unwrap(),
        )
        .unwrap();

    store.refresh(&repo);
    assert_eq!(store.state().goals.len(), 1);
}
