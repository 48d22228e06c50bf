//! Notification repository.

use sqlx::PgPool;

use barberly_core::{BookingId, NotificationId, NotificationKind, UserId};

use super::RepositoryError;
use crate::models::Notification;

const NOTIFICATION_COLUMNS: &str = "id, user_id, kind, title, body, booking_id, read_at, created_at";

/// Repository for notifications.
pub struct NotificationRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> NotificationRepository<'a> {
    /// Create a new notification repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Store a notification for a user.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create(
        &self,
        user: UserId,
        kind: NotificationKind,
        title: &str,
        body: &str,
        booking: Option<BookingId>,
    ) -> Result<Notification, RepositoryError> {
        let notification = sqlx::query_as::<_, Notification>(&format!(
            "INSERT INTO notifications (user_id, kind, title, body, booking_id)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {NOTIFICATION_COLUMNS}"
        ))
        .bind(user)
        .bind(kind)
        .bind(title)
        .bind(body)
        .bind(booking)
        .fetch_one(self.pool)
        .await?;
        Ok(notification)
    }

    /// A user's notifications, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        user: UserId,
        unread_only: bool,
        limit: i64,
    ) -> Result<Vec<Notification>, RepositoryError> {
        let notifications = sqlx::query_as::<_, Notification>(&format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications
             WHERE user_id = $1 AND (NOT $2 OR read_at IS NULL)
             ORDER BY created_at DESC, id DESC
             LIMIT $3"
        ))
        .bind(user)
        .bind(unread_only)
        .bind(limit)
        .fetch_all(self.pool)
        .await?;
        Ok(notifications)
    }

    /// Mark one of the user's notifications read.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the notification does not belong to the user.
    pub async fn mark_read(
        &self,
        user: UserId,
        id: NotificationId,
    ) -> Result<Notification, RepositoryError> {
        sqlx::query_as::<_, Notification>(&format!(
            "UPDATE notifications SET read_at = COALESCE(read_at, now())
             WHERE id = $1 AND user_id = $2
             RETURNING {NOTIFICATION_COLUMNS}"
        ))
        .bind(id)
        .bind(user)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)
    }

    /// Mark all of the user's notifications read. Returns how many changed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn mark_all_read(&self, user: UserId) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            "UPDATE notifications SET read_at = now() WHERE user_id = $1 AND read_at IS NULL",
        )
        .bind(user)
        .execute(self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}
