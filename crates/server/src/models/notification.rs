//! In-app notification type.

use chrono::{DateTime, Utc};
use serde::Serialize;

use barberly_core::{BookingId, NotificationId, NotificationKind, UserId};

/// A message shown in a user's notification list.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Notification {
    pub id: NotificationId,
    pub user_id: UserId,
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
    pub booking_id: Option<BookingId>,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}
