//! Notification inbox handlers.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::{Deserialize, Serialize};

use barberly_core::NotificationId;

use crate::error::AppError;
use crate::middleware::RequireAuth;
use crate::models::Notification;
use crate::services::notification::NotificationService;
use crate::state::AppState;

/// Inbox parameters.
#[derive(Debug, Deserialize)]
pub struct InboxQuery {
    #[serde(default)]
    pub unread: bool,
    pub limit: Option<i64>,
}

/// Result of marking everything read.
#[derive(Debug, Serialize)]
pub struct MarkedRead {
    pub updated: u64,
}

/// GET /notifications
///
/// # Errors
///
/// Returns `401` without a session.
pub async fn index(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Query(query): Query<InboxQuery>,
) -> Result<Json<Vec<Notification>>, AppError> {
    let (limit, _) = crate::db::page(query.limit, None);
    let notifications = NotificationService::new(state.pool())
        .list(user.id, query.unread, limit)
        .await?;
    Ok(Json(notifications))
}

/// POST /notifications/{id}/read
///
/// # Errors
///
/// Returns `404` for someone else's notification.
pub async fn mark_read(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<NotificationId>,
) -> Result<Json<Notification>, AppError> {
    let notification = NotificationService::new(state.pool())
        .mark_read(user.id, id)
        .await?;
    Ok(Json(notification))
}

/// POST /notifications/read-all
///
/// # Errors
///
/// Returns `401` without a session.
pub async fn mark_all_read(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<MarkedRead>, AppError> {
    let updated = NotificationService::new(state.pool())
        .mark_all_read(user.id)
        .await?;
    Ok(Json(MarkedRead { updated }))
}
