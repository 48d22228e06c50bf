//! Booking route handlers.
//!
//! Guests can book without an account. They later prove ownership of a booking
//! (to pay for it) with the phone number they booked with.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Deserialize;
use tracing::info;

use barberly_core::{BookingId, PaymentMethod, PhoneNumber};

use crate::error::AppError;
use crate::middleware::{OptionalAuth, RequireAuth};
use crate::models::{Booking, BookingDetail, CurrentUser, Salon};
use crate::services::booking::{BookingRequest, BookingService};
use crate::services::payment::{PaymentService, StartedPayment};
use crate::state::AppState;

/// Payment start payload.
#[derive(Debug, Deserialize)]
pub struct StartPaymentRequest {
    pub method: PaymentMethod,
    /// Booking phone number; how guests identify themselves.
    #[serde(default)]
    pub phone: Option<String>,
}

/// Whether `user` (or a guest presenting `phone`) may pay for `booking`.
fn may_pay(
    booking: &Booking,
    salon: &Salon,
    user: Option<&CurrentUser>,
    phone: Option<&PhoneNumber>,
) -> bool {
    let by_account = user.is_some_and(|u| booking.is_customer(u.id) || salon.is_managed_by(u));
    let by_phone = booking.customer_id.is_none() && phone == Some(&booking.customer_phone);
    by_account || by_phone
}

/// POST /bookings
///
/// # Errors
///
/// Returns `400` for invalid input, `404` for an unknown salon or staff member and
/// `409` when the slot is already booked.
pub async fn create(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
    Json(request): Json<BookingRequest>,
) -> Result<(StatusCode, Json<BookingDetail>), AppError> {
    let detail = BookingService::new(state.pool(), &state.config().booking)
        .create(user.as_ref(), &request)
        .await?;
    Ok((StatusCode::CREATED, Json(detail)))
}

/// GET /bookings
///
/// # Errors
///
/// Returns `401` without a session.
pub async fn index(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<Vec<Booking>>, AppError> {
    let bookings = BookingService::new(state.pool(), &state.config().booking)
        .list_mine(user.id)
        .await?;
    Ok(Json(bookings))
}

/// GET /bookings/{id}
///
/// # Errors
///
/// Returns `404` unless the caller is the customer or manages the salon.
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<BookingId>,
) -> Result<Json<BookingDetail>, AppError> {
    let detail = BookingService::new(state.pool(), &state.config().booking)
        .detail(id, &user)
        .await?;
    Ok(Json(detail))
}

/// POST /bookings/{id}/cancel
///
/// # Errors
///
/// Returns `400` if the booking can no longer be cancelled.
pub async fn cancel(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<BookingId>,
) -> Result<Json<Booking>, AppError> {
    let booking = BookingService::new(state.pool(), &state.config().booking)
        .cancel(id, &user)
        .await?;
    Ok(Json(booking))
}

/// POST /bookings/{id}/confirm
///
/// # Errors
///
/// Returns `403` unless the caller manages the salon.
pub async fn confirm(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<BookingId>,
) -> Result<Json<Booking>, AppError> {
    let booking = BookingService::new(state.pool(), &state.config().booking)
        .confirm(id, &user)
        .await?;
    Ok(Json(booking))
}

/// POST /bookings/{id}/complete
///
/// # Errors
///
/// Returns `403` unless the caller manages the salon.
pub async fn complete(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<BookingId>,
) -> Result<Json<Booking>, AppError> {
    let booking = BookingService::new(state.pool(), &state.config().booking)
        .complete(id, &user)
        .await?;
    Ok(Json(booking))
}

/// POST /bookings/{id}/payments
///
/// Starting again after a failed payment is the manual retry. VietQR payments get a
/// background watcher that settles them from the bank feed or fails them at expiry.
///
/// # Errors
///
/// Returns `404` if the caller may not pay for the booking, `400` if it is not payable
/// and `409` while another payment is pending.
pub async fn start_payment(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
    Path(id): Path<BookingId>,
    Json(req): Json<StartPaymentRequest>,
) -> Result<(StatusCode, Json<StartedPayment>), AppError> {
    let (booking, salon) = BookingService::new(state.pool(), &state.config().booking)
        .load(id)
        .await?;
    let phone = req.phone.as_deref().map(PhoneNumber::parse).transpose()?;
    if !may_pay(&booking, &salon, user.as_ref(), phone.as_ref()) {
        return Err(AppError::NotFound(format!("booking {id}")));
    }

    let (payment, qr) = PaymentService::new(state.pool(), &state.config().payment)
        .start(&booking, req.method)
        .await?;
    if payment.method == PaymentMethod::VietQr {
        state.watcher().spawn(&payment);
        info!(payment_id = %payment.id, "Payment watcher started");
    }

    let started = StartedPayment {
        payment: payment.view(chrono::Utc::now()),
        qr,
    };
    Ok((StatusCode::CREATED, Json(started)))
}
