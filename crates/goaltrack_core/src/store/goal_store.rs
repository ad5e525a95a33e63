//! In-memory goal state for UI layers.
//!
//! # Responsibility
//! - Hold the signed-in user's goal list with loading/error flags.
//! - Apply state transitions through a pure reducer.
//! - Notify subscribers after every dispatched action.
//!
//! # Invariants
//! - `reduce` never mutates its input state.
//! - `DeleteGoal` / `UpdateGoal` for an unknown id leave the list unchanged.

use crate::analytics::{log_error, log_event, AnalyticsEvent, PropertyValue};
use crate::model::goal::{Goal, GoalId};
use crate::repo::goal_repo::{GoalListQuery, GoalRepository};
use log::info;

pub const LOAD_GOALS_ERROR: &str = "Failed to load goals";

/// Snapshot of the goal list as seen by the UI.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GoalState {
    pub goals: Vec<Goal>,
    pub loading: bool,
    pub error: Option<String>,
}

/// State transition request.
#[derive(Debug, Clone, PartialEq)]
pub enum GoalAction {
    SetGoals(Vec<Goal>),
    /// Appends to the end of the list.
    AddGoal(Goal),
    /// Replaces the goal with the same id.
    UpdateGoal(Goal),
    DeleteGoal(GoalId),
    SetLoading(bool),
    SetError(Option<String>),
}

/// Returns the state that results from applying `action` to `state`.
pub fn reduce(state: &GoalState, action: GoalAction) -> GoalState {
    let mut next = state.clone();
    match action {
        GoalAction::SetGoals(goals) => next.goals = goals,
        GoalAction::AddGoal(goal) => next.goals.push(goal),
        GoalAction::UpdateGoal(goal) => {
            if let Some(slot) = next.goals.iter_mut().find(|item| item.id == goal.id) {
                *slot = goal;
            }
        }
        GoalAction::DeleteGoal(id) => next.goals.retain(|item| item.id != id),
        GoalAction::SetLoading(loading) => next.loading = loading,
        GoalAction::SetError(error) => next.error = error,
    }
    next
}

/// Handle returned by [`GoalStore::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener = Box<dyn FnMut(&GoalState)>;

/// Owns a [`GoalState`] and fans out changes to listeners.
#[derive(Default)]
pub struct GoalStore {
    state: GoalState,
    user_id: Option<String>,
    listeners: Vec<(SubscriptionId, Listener)>,
    next_subscription: u64,
}

impl GoalStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &GoalState {
        &self.state
    }

    /// User whose goals are currently loaded, if any.
    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    pub fn dispatch(&mut self, action: GoalAction) {
        self.state = reduce(&self.state, action);
        for (_, listener) in &mut self.listeners {
            listener(&self.state);
        }
    }

    pub fn subscribe(&mut self, listener: impl FnMut(&GoalState) + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Returns `false` when `id` was not subscribed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(existing, _)| *existing != id);
        self.listeners.len() != before
    }

    /// Switches the store to `user_id` and loads that user's goals.
    ///
    /// `None` (signed out) clears the list without touching storage.
    pub fn sync_user<R: GoalRepository>(&mut self, user_id: Option<&str>, repo: &R) {
        self.user_id = user_id.map(str::to_string);
        match user_id {
            None => self.dispatch(GoalAction::SetGoals(Vec::new())),
            Some(user_id) => self.load(user_id, repo),
        }
    }

    /// Reloads goals for the current user; no-op when signed out.
    pub fn refresh<R: GoalRepository>(&mut self, repo: &R) {
        if let Some(user_id) = self.user_id.clone() {
            self.load(&user_id, repo);
        }
    }

    fn load<R: GoalRepository>(&mut self, user_id: &str, repo: &R) {
        self.dispatch(GoalAction::SetLoading(true));
        match repo.list_goals(&GoalListQuery::for_user(user_id)) {
            Ok(goals) => {
                let count = goals.len();
                self.dispatch(GoalAction::SetGoals(goals));
                info!("event=goals_load module=store status=ok count={count}");
                log_event(
                    AnalyticsEvent::GoalsLoaded,
                    &[("count", PropertyValue::from(count))],
                );
            }
            Err(err) => {
                log_error("goals_load", &err);
                self.dispatch(GoalAction::SetError(Some(LOAD_GOALS_ERROR.to_string())));
            }
        }
        self.dispatch(GoalAction::SetLoading(false));
    }
}

#[cfg(test)]
mod tests {
    use super::{reduce, GoalAction, GoalState, GoalStore};
    use crate::model::goal::{Goal, GoalType};
    use chrono::{TimeZone, Utc};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn goal(title: &str) -> Goal {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        Goal::new("u1", GoalType::Habit, title, now)
    }

    #[test]
    fn reduce_leaves_input_untouched() {
        let state = GoalState::default();
        let next = reduce(&state, GoalAction::AddGoal(goal("Read")));
        assert!(state.goals.is_empty());
        assert_eq!(next.goals.len(), 1);
    }

    #[test]
    fn update_replaces_matching_goal_only() {
        let first = goal("Read");
        let second = goal("Walk");
        let state = reduce(
            &GoalState::default(),
            GoalAction::SetGoals(vec![first.clone(), second.clone()]),
        );

        let mut edited = first.clone();
        edited.title = "Read more".to_string();
        let next = reduce(&state, GoalAction::UpdateGoal(edited));
        assert_eq!(next.goals[0].title, "Read more");
        assert_eq!(next.goals[1], second);

        let unknown = goal("Ghost");
        assert_eq!(reduce(&next, GoalAction::UpdateGoal(unknown)), next);
    }

    #[test]
    fn delete_removes_by_id() {
        let first = goal("Read");
        let state = reduce(
            &GoalState::default(),
            GoalAction::SetGoals(vec![first.clone(), goal("Walk")]),
        );
        let next = reduce(&state, GoalAction::DeleteGoal(first.id));
        assert_eq!(next.goals.len(), 1);
        assert_eq!(next.goals[0].title, "Walk");
    }

    #[test]
    fn flags_are_independent_of_goal_list() {
        let state = reduce(&GoalState::default(), GoalAction::SetLoading(true));
        let state = reduce(&state, GoalAction::SetError(Some("boom".to_string())));
        assert!(state.loading);
        assert_eq!(state.error.as_deref(), Some("boom"));
        assert!(state.goals.is_empty());
    }

    #[test]
    fn subscribers_see_each_dispatch_until_unsubscribed() {
        let mut store = GoalStore::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let id = store.subscribe(move |state| sink.borrow_mut().push(state.goals.len()));

        store.dispatch(GoalAction::AddGoal(goal("Read")));
        store.dispatch(GoalAction::AddGoal(goal("Walk")));
        assert!(store.unsubscribe(id));
        store.dispatch(GoalAction::SetGoals(Vec::new()));

        assert_eq!(*seen.borrow(), vec![1, 2]);
        assert!(!store.unsubscribe(id));
    }
}
