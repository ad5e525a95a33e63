//! Goal reminder notifications.
//!
//! # Responsibility
//! - Ask the platform for notification permission.
//! - Schedule goal reminders and keep a record of each one.
//! - List and acknowledge recorded notifications.
//!
//! # Invariants
//! - A reminder is only scheduled for an instant strictly after `now`.
//! - A platform notification never outlives a failed record write.
//! - Failures are logged and reported as `None` / `false` / empty lists.

use crate::logging::sanitize_message;
use crate::model::goal::GoalId;
use crate::model::notification::{Notification, NotificationId, NotificationKind};
use crate::repo::notification_repo::NotificationRepository;
use chrono::{DateTime, Utc};
use log::{error, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Duration;

/// Platform permission state for notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionStatus {
    Granted,
    Denied,
    Undetermined,
}

/// Error reported by the platform notification API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerError(pub String);

impl Display for SchedulerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "notification scheduler error: {}", self.0)
    }
}

impl Error for SchedulerError {}

/// Local notification content plus a relative trigger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledNotification {
    pub title: String,
    pub body: String,
    /// Fires once after this delay.
    pub fire_in: Duration,
}

/// Platform notification API.
pub trait NotificationScheduler {
    fn permission_status(&self) -> Result<PermissionStatus, SchedulerError>;
    fn request_permission(&self) -> Result<PermissionStatus, SchedulerError>;
    /// Returns the platform id of the scheduled notification.
    fn schedule(&self, notification: &ScheduledNotification) -> Result<String, SchedulerError>;
    fn cancel(&self, platform_id: &str) -> Result<(), SchedulerError>;
}

impl<S: NotificationScheduler + ?Sized> NotificationScheduler for &S {
    fn permission_status(&self) -> Result<PermissionStatus, SchedulerError> {
        (**self).permission_status()
    }

    fn request_permission(&self) -> Result<PermissionStatus, SchedulerError> {
        (**self).request_permission()
    }

    fn schedule(&self, notification: &ScheduledNotification) -> Result<String, SchedulerError> {
        (**self).schedule(notification)
    }

    fn cancel(&self, platform_id: &str) -> Result<(), SchedulerError> {
        (**self).cancel(platform_id)
    }
}

pub struct NotificationService<R: NotificationRepository, S: NotificationScheduler> {
    repo: R,
    scheduler: S,
}

impl<R: NotificationRepository, S: NotificationScheduler> NotificationService<R, S> {
    pub fn new(repo: R, scheduler: S) -> Self {
        Self { repo, scheduler }
    }

    /// Returns whether notifications are allowed, prompting when not yet granted.
    pub fn request_permissions(&self) -> bool {
        let status = self.scheduler.permission_status().and_then(|status| {
            if status == PermissionStatus::Granted {
                Ok(status)
            } else {
                self.scheduler.request_permission()
            }
        });
        match status {
            Ok(status) => status == PermissionStatus::Granted,
            Err(err) => {
                log_failure("notification_permission", &err);
                false
            }
        }
    }

    /// Schedules one local notification when permission is granted.
    pub fn schedule_notification(
        &self,
        title: &str,
        body: &str,
        fire_in: Duration,
    ) -> Option<String> {
        if !self.request_permissions() {
            return None;
        }
        let request = ScheduledNotification {
            title: title.to_string(),
            body: body.to_string(),
            fire_in,
        };
        match self.scheduler.schedule(&request) {
            Ok(platform_id) => Some(platform_id),
            Err(err) => {
                log_failure("notification_schedule", &err);
                None
            }
        }
    }

    /// Records an undelivered notification stamped with `now` and returns
    /// the stored row.
    #[allow(clippy::too_many_arguments)]
    pub fn create_notification(
        &self,
        user_id: &str,
        goal_id: GoalId,
        kind: NotificationKind,
        title: &str,
        body: &str,
        scheduled_for: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Option<Notification> {
        let notification =
            Notification::new(user_id, goal_id, kind, title, body, scheduled_for, now);
        let stored = self
            .repo
            .create_notification(&notification)
            .and_then(|id| self.repo.get_notification(user_id, id));
        match stored {
            Ok(Some(stored)) => Some(stored),
            Ok(None) => {
                error!(
                    "event=notification_record module=notifications status=error reason=missing_after_write id={}",
                    notification.id
                );
                None
            }
            Err(err) => {
                log_failure("notification_record", &err);
                None
            }
        }
    }

    /// Schedules a reminder for `goal_id` at `scheduled_for` and records it.
    ///
    /// Returns the platform notification id. Instants at or before `now`
    /// are rejected; if the record cannot be written the platform
    /// notification is cancelled again.
    pub fn schedule_goal_reminder(
        &self,
        user_id: &str,
        goal_id: GoalId,
        title: &str,
        body: &str,
        scheduled_for: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Option<String> {
        let seconds = (scheduled_for - now).num_seconds();
        if seconds <= 0 {
            warn!(
                "event=goal_reminder module=notifications status=error goal_id={} reason=not_in_future seconds={}",
                goal_id, seconds
            );
            return None;
        }

        let platform_id =
            self.schedule_notification(title, body, Duration::from_secs(seconds.unsigned_abs()))?;
        let recorded = self.create_notification(
            user_id,
            goal_id,
            NotificationKind::Reminder,
            title,
            body,
            scheduled_for,
            now,
        );
        if recorded.is_none() {
            self.cancel_notification(&platform_id);
            return None;
        }

        info!(
            "event=goal_reminder module=notifications status=ok goal_id={} fire_in_secs={}",
            goal_id, seconds
        );
        Some(platform_id)
    }

    pub fn cancel_notification(&self, platform_id: &str) {
        if let Err(err) = self.scheduler.cancel(platform_id) {
            log_failure("notification_cancel", &err);
        }
    }

    pub fn mark_delivered(&self, user_id: &str, id: NotificationId) -> bool {
        match self.repo.mark_delivered(user_id, id) {
            Ok(()) => true,
            Err(err) => {
                log_failure("notification_delivered", &err);
                false
            }
        }
    }

    /// Newest first; `limit` defaults to 50.
    pub fn list_notifications(&self, user_id: &str, limit: Option<u32>) -> Vec<Notification> {
        self.repo
            .list_notifications(user_id, limit)
            .unwrap_or_else(|err| {
                log_failure("notification_list", &err);
                Vec::new()
            })
    }
}

fn log_failure(event: &str, err: &dyn Error) {
    error!(
        "event={} module=notifications status=error error={}",
        event,
        sanitize_message(&err.to_string(), 160)
    );
}
