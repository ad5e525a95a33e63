//! Streak continuity model.
//!
//! # Responsibility
//! - Define the per-goal streak counters and the append-only history entry.
//! - Compute the next streak record for one completion/non-completion event.
//!
//! # Invariants
//! - `best >= current` after every update.
//! - Calendar dates are compared in the time zone of the caller-supplied `now`.
//! - A missing `last_completed` counts as neither today nor yesterday.
//! - Every update call yields exactly one history entry.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identifier of one streak history row.
pub type StreakHistoryId = Uuid;

/// Current/best counters for one goal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreakRecord {
    /// Consecutive qualifying days ending at `last_completed`.
    pub current: u32,
    /// Highest `current` ever reached.
    pub best: u32,
    /// Last completion instant. `None` when unknown or unparsable in storage.
    pub last_completed: Option<DateTime<Utc>>,
}

impl StreakRecord {
    /// Creates the initial record for a freshly created goal.
    pub fn started_at(now: DateTime<Utc>) -> Self {
        Self {
            current: 0,
            best: 0,
            last_completed: Some(now),
        }
    }

    /// Returns whether counters satisfy `best >= current`.
    pub fn is_consistent(&self) -> bool {
        self.best >= self.current
    }
}

/// One immutable streak log row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreakHistoryEntry {
    pub id: StreakHistoryId,
    pub date: DateTime<Utc>,
    pub completed: bool,
}

impl StreakHistoryEntry {
    /// Creates a history entry with a generated id.
    pub fn new(date: DateTime<Utc>, completed: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            date,
            completed,
        }
    }
}

/// Outcome of one streak update call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreakUpdate {
    /// Record before the update.
    pub previous: StreakRecord,
    /// Record to persist.
    pub record: StreakRecord,
    /// History row to append, regardless of counter changes.
    pub entry: StreakHistoryEntry,
}

impl StreakUpdate {
    /// Returns whether `current`, `best` or `last_completed` changed.
    pub fn counters_changed(&self) -> bool {
        self.previous != self.record
    }

    /// Returns whether this update raised the best streak.
    pub fn best_improved(&self) -> bool {
        self.record.best > self.previous.best
    }
}

/// Computes the next streak record for a completion event on `now`'s date.
///
/// Rules:
/// - completed and last completion not today: `current` becomes
///   `current + 1` when last completion was yesterday, else `1`; `best`
///   follows; `last_completed = now`.
/// - not completed and last completion today: `current` decrements
///   (saturating at zero); `last_completed` unchanged.
/// - anything else leaves the record unchanged.
pub fn update_streak<Tz: TimeZone>(
    record: &StreakRecord,
    completed_today: bool,
    now: &DateTime<Tz>,
) -> StreakUpdate {
    let today = now.date_naive();
    let last_date = record
        .last_completed
        .map(|last| last.with_timezone(&now.timezone()).date_naive());
    let is_today = last_date == Some(today);
    let is_yesterday = last_date.is_some() && last_date == today.pred_opt();

    let mut next = *record;
    if completed_today && !is_today {
        next.current = if is_yesterday {
            record.current.saturating_add(1)
        } else {
            1
        };
        next.best = next.current.max(record.best);
        next.last_completed = Some(now.with_timezone(&Utc));
    } else if !completed_today && is_today {
        next.current = record.current.saturating_sub(1);
    }
    // Stored records may predate validation.
    next.best = next.best.max(next.current);

    StreakUpdate {
        previous: *record,
        record: next,
        entry: StreakHistoryEntry::new(now.with_timezone(&Utc), completed_today),
    }
}

/// Returns the calendar date of `instant` in `zone`.
pub fn local_date<Tz: TimeZone>(instant: DateTime<Utc>, zone: &Tz) -> NaiveDate {
    instant.with_timezone(zone).date_naive()
}

#[cfg(test)]
mod tests {
    use super::{local_date, update_streak, StreakRecord};
    use chrono::{DateTime, Duration, FixedOffset, TimeZone, Utc};

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, day, hour, 0, 0).unwrap()
    }

    fn record(current: u32, best: u32, last: Option<DateTime<Utc>>) -> StreakRecord {
        StreakRecord {
            current,
            best,
            last_completed: last,
        }
    }

    #[test]
    fn completion_after_yesterday_on_fresh_streak_starts_at_one() {
        let update = update_streak(&record(0, 0, Some(at(9, 20))), true, &at(10, 8));
        assert_eq!(update.record.current, 1);
        assert_eq!(update.record.best, 1);
        assert_eq!(update.record.last_completed, Some(at(10, 8)));
        assert!(update.entry.completed);
        assert_eq!(update.entry.date, at(10, 8));
    }

    #[test]
    fn consecutive_days_increment_current_and_best() {
        let day1 = update_streak(&record(0, 0, Some(at(1, 9))), true, &at(3, 9));
        assert_eq!(day1.record.current, 1);

        let day2 = update_streak(&day1.record, true, &at(4, 21));
        assert_eq!(day2.record.current, 2);
        assert_eq!(day2.record.best, 2);
        assert!(day2.best_improved());
    }

    #[test]
    fn gap_longer_than_one_day_resets_current() {
        let update = update_streak(&record(5, 7, Some(at(1, 12))), true, &at(4, 12));
        assert_eq!(update.record.current, 1);
        assert_eq!(update.record.best, 7);
    }

    #[test]
    fn uncompleting_today_decrements_and_keeps_last_completed() {
        let last = at(10, 7);
        let update = update_streak(&record(3, 4, Some(last)), false, &at(10, 18));
        assert_eq!(update.record.current, 2);
        assert_eq!(update.record.best, 4);
        assert_eq!(update.record.last_completed, Some(last));
        assert!(!update.entry.completed);
    }

    #[test]
    fn uncompleting_today_saturates_at_zero() {
        let update = update_streak(&record(0, 2, Some(at(10, 7))), false, &at(10, 9));
        assert_eq!(update.record.current, 0);
    }

    #[test]
    fn uncompleting_on_another_day_is_a_noop() {
        let before = record(3, 3, Some(at(8, 7)));
        let update = update_streak(&before, false, &at(10, 9));
        assert_eq!(update.record, before);
        assert!(!update.counters_changed());
    }

    #[test]
    fn second_completion_on_same_date_keeps_counters() {
        let first = update_streak(&record(1, 1, Some(at(9, 7))), true, &at(10, 7));
        let second = update_streak(&first.record, true, &at(10, 22));
        assert_eq!(second.record, first.record);
        assert!(!second.counters_changed());
        assert_ne!(first.entry.id, second.entry.id);
    }

    #[test]
    fn missing_last_completed_forces_restart_on_completion() {
        let update = update_streak(&record(4, 6, None), true, &at(10, 7));
        assert_eq!(update.record.current, 1);
        assert_eq!(update.record.best, 6);
    }

    #[test]
    fn missing_last_completed_ignores_uncompletion() {
        let before = record(4, 6, None);
        let update = update_streak(&before, false, &at(10, 7));
        assert_eq!(update.record, before);
    }

    #[test]
    fn calendar_dates_follow_the_time_zone_of_now() {
        // 23:30 UTC on the 9th is already the 10th at UTC+2.
        let last = Utc.with_ymd_and_hms(2024, 3, 9, 23, 30, 0).unwrap();
        let zone = FixedOffset::east_opt(2 * 3600).unwrap();
        let now = zone.with_ymd_and_hms(2024, 3, 10, 20, 0, 0).unwrap();
        assert_eq!(local_date(last, &zone), now.date_naive());

        let update = update_streak(&record(2, 2, Some(last)), true, &now);
        assert_eq!(update.record.current, 2);

        let utc_now = now.with_timezone(&Utc);
        let update = update_streak(&record(2, 2, Some(last)), true, &utc_now);
        assert_eq!(update.record.current, 3);
    }

    #[test]
    fn inconsistent_input_is_repaired_on_update() {
        let update = update_streak(&record(5, 2, Some(at(9, 7))), true, &at(10, 7));
        assert_eq!(update.record.current, 6);
        assert_eq!(update.record.best, 6);
    }

    #[test]
    fn best_never_drops_below_current_across_mixed_sequences() {
        let mut current = record(0, 0, Some(at(1, 0)));
        let mut now = at(1, 12);
        let pattern = [true, true, false, true, false, false, true, true, true, false];
        for (step, completed) in pattern.iter().cycle().take(60).enumerate() {
            let update = update_streak(&current, *completed, &now);
            assert!(update.record.is_consistent(), "step {step}");
            current = update.record;
            now += if step % 3 == 0 {
                Duration::hours(30)
            } else {
                Duration::hours(5)
            };
        }
    }
}
