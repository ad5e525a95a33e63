//! Notification record repository.
//!
//! # Invariants
//! - Records are user-scoped; another user's id reads as not found.
//! - Listing order is `created_at DESC, id ASC`.

use crate::model::notification::{Notification, NotificationId, NotificationKind};
use crate::repo::goal_repo::{RepoError, RepoResult};
use crate::repo::support::{
    bool_to_int, ensure_connection_ready, format_timestamp, int_to_bool, parse_timestamp,
    parse_uuid,
};
use rusqlite::{params, Connection, Row};

const NOTIFICATIONS_DEFAULT_LIMIT: u32 = 50;
const NOTIFICATIONS_LIMIT_MAX: u32 = 200;

const NOTIFICATION_SELECT_SQL: &str = "SELECT
    id,
    user_id,
    goal_id,
    type,
    title,
    body,
    scheduled_for,
    delivered,
    created_at
FROM notifications";

pub trait NotificationRepository {
    fn create_notification(&self, notification: &Notification) -> RepoResult<NotificationId>;
    fn get_notification(
        &self,
        user_id: &str,
        id: NotificationId,
    ) -> RepoResult<Option<Notification>>;
    fn mark_delivered(&self, user_id: &str, id: NotificationId) -> RepoResult<()>;
    /// Limit defaults to 50 and clamps to 200.
    fn list_notifications(&self, user_id: &str, limit: Option<u32>)
        -> RepoResult<Vec<Notification>>;
}

pub struct SqliteNotificationRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteNotificationRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, &["notifications"])?;
        Ok(Self { conn })
    }
}

impl NotificationRepository for SqliteNotificationRepository<'_> {
    fn create_notification(&self, notification: &Notification) -> RepoResult<NotificationId> {
        self.conn.execute(
            "INSERT INTO notifications (
                id,
                user_id,
                goal_id,
                type,
                title,
                body,
                scheduled_for,
                delivered,
                created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9);",
            params![
                notification.id.to_string(),
                notification.user_id.as_str(),
                notification.goal_id.to_string(),
                notification.kind.as_str(),
                notification.title.as_str(),
                notification.body.as_str(),
                format_timestamp(notification.scheduled_for),
                bool_to_int(notification.delivered),
                format_timestamp(notification.created_at),
            ],
        )?;
        Ok(notification.id)
    }

    fn get_notification(
        &self,
        user_id: &str,
        id: NotificationId,
    ) -> RepoResult<Option<Notification>> {
        let mut stmt = self.conn.prepare(&format!(
            "{NOTIFICATION_SELECT_SQL} WHERE id = ?1 AND user_id = ?2;"
        ))?;
        let mut rows = stmt.query(params![id.to_string(), user_id])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_notification_row(row)?));
        }
        Ok(None)
    }

    fn mark_delivered(&self, user_id: &str, id: NotificationId) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE notifications SET delivered = 1 WHERE id = ?1 AND user_id = ?2;",
            params![id.to_string(), user_id],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: "notification",
                id,
            });
        }
        Ok(())
    }

    fn list_notifications(
        &self,
        user_id: &str,
        limit: Option<u32>,
    ) -> RepoResult<Vec<Notification>> {
        let limit = match limit {
            Some(0) | None => NOTIFICATIONS_DEFAULT_LIMIT,
            Some(value) => value.min(NOTIFICATIONS_LIMIT_MAX),
        };
        let mut stmt = self.conn.prepare(&format!(
            "{NOTIFICATION_SELECT_SQL}
             WHERE user_id = ?1
             ORDER BY created_at DESC, id ASC
             LIMIT ?2;"
        ))?;
        let mut rows = stmt.query(params![user_id, i64::from(limit)])?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(parse_notification_row(row)?);
        }
        Ok(items)
    }
}

fn parse_notification_row(row: &Row<'_>) -> RepoResult<Notification> {
    let id_text: String = row.get("id")?;
    let goal_text: String = row.get("goal_id")?;
    let kind_text: String = row.get("type")?;
    let scheduled_for: String = row.get("scheduled_for")?;
    let created_at: String = row.get("created_at")?;

    Ok(Notification {
        id: parse_uuid(&id_text, "notifications.id")?,
        user_id: row.get("user_id")?,
        goal_id: parse_uuid(&goal_text, "notifications.goal_id")?,
        kind: NotificationKind::parse(&kind_text).ok_or_else(|| {
            RepoError::InvalidData(format!(
                "invalid notification type `{kind_text}` in notifications.type"
            ))
        })?,
        title: row.get("title")?,
        body: row.get("body")?,
        scheduled_for: parse_timestamp(&scheduled_for, "notifications.scheduled_for")?,
        delivered: int_to_bool(row.get("delivered")?, "notifications.delivered")?,
        created_at: parse_timestamp(&created_at, "notifications.created_at")?,
    })
}
