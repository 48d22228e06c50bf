//! Platform administration handlers.
//!
//! Everything here requires the admin role except payment confirmation, which the
//! owner of the booking's salon may also do (cash collected at the counter).

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::{Deserialize, Serialize};
use tracing::info;

use barberly_core::{BookingStatus, PaymentId, Price, UserId, UserRole};

use crate::db::bookings::BookingRepository;
use crate::db::page;
use crate::db::payments::PaymentRepository;
use crate::db::salons::SalonRepository;
use crate::db::users::UserRepository;
use crate::error::AppError;
use crate::middleware::{RequireAdmin, RequireAuth};
use crate::models::{Booking, PaymentView, User};
use crate::services::booking::BookingService;
use crate::services::payment::PaymentService;
use crate::state::AppState;

/// Platform totals.
#[derive(Debug, Serialize)]
pub struct Stats {
    pub users: i64,
    pub active_salons: i64,
    pub bookings_by_status: Vec<StatusCount>,
    pub total_paid: Price,
}

/// Bookings in one status.
#[derive(Debug, Serialize)]
pub struct StatusCount {
    pub status: BookingStatus,
    pub count: i64,
}

/// Paging parameters.
#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Booking listing parameters.
#[derive(Debug, Deserialize)]
pub struct BookingsQuery {
    pub status: Option<BookingStatus>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Role change payload.
#[derive(Debug, Deserialize)]
pub struct RoleChange {
    pub role: UserRole,
}

/// GET /admin/stats
///
/// # Errors
///
/// Returns `403` for non-admins.
pub async fn stats(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
) -> Result<Json<Stats>, AppError> {
    let pool = state.pool();
    let (users, salons, bookings, payments) = (
        UserRepository::new(pool),
        SalonRepository::new(pool),
        BookingRepository::new(pool),
        PaymentRepository::new(pool),
    );
    let (users, active_salons, by_status, total_paid) = tokio::try_join!(
        users.count(),
        salons.count_active(),
        bookings.count_by_status(),
        payments.total_paid(),
    )?;

    Ok(Json(Stats {
        users,
        active_salons,
        bookings_by_status: by_status
            .into_iter()
            .map(|(status, count)| StatusCount { status, count })
            .collect(),
        total_paid,
    }))
}

/// GET /admin/users
///
/// # Errors
///
/// Returns `403` for non-admins.
pub async fn users(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Query(query): Query<PageQuery>,
) -> Result<Json<Vec<User>>, AppError> {
    let (limit, offset) = page(query.limit, query.offset);
    Ok(Json(UserRepository::new(state.pool()).list(limit, offset).await?))
}

/// PUT /admin/users/{id}/role
///
/// The new role applies from the user's next login.
///
/// # Errors
///
/// Returns `400` when an admin tries to change their own role.
pub async fn set_role(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<UserId>,
    Json(change): Json<RoleChange>,
) -> Result<Json<User>, AppError> {
    if id == admin.id {
        return Err(AppError::BadRequest("cannot change your own role".to_string()));
    }
    let user = UserRepository::new(state.pool())
        .set_role(id, change.role)
        .await?;
    info!(user_id = %id, role = %change.role, admin_id = %admin.id, "User role changed");
    Ok(Json(user))
}

/// GET /admin/bookings?status=
///
/// # Errors
///
/// Returns `403` for non-admins.
pub async fn bookings(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Query(query): Query<BookingsQuery>,
) -> Result<Json<Vec<Booking>>, AppError> {
    let (limit, offset) = page(query.limit, query.offset);
    let bookings = BookingRepository::new(state.pool())
        .list_by_status(query.status, limit, offset)
        .await?;
    Ok(Json(bookings))
}

/// POST /admin/payments/{id}/confirm
///
/// # Errors
///
/// Returns `403` unless the caller is an admin or manages the booking's salon, and
/// `409` if the payment is no longer pending.
pub async fn confirm_payment(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<PaymentId>,
) -> Result<Json<PaymentView>, AppError> {
    let payment = PaymentRepository::new(state.pool())
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("payment {id}")))?;
    let (_, salon) = BookingService::new(state.pool(), &state.config().booking)
        .load(payment.booking_id)
        .await?;
    if !salon.is_managed_by(&user) {
        return Err(AppError::Forbidden(
            "only admins and the salon owner can confirm payments".to_string(),
        ));
    }

    let payment = PaymentService::new(state.pool(), &state.config().payment)
        .confirm_manually(id)
        .await?;
    info!(payment_id = %id, user_id = %user.id, "Payment confirmed manually");
    Ok(Json(payment.view(chrono::Utc::now())))
}
