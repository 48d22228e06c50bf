//! In-app notifications for booking and payment events.
//!
//! Delivery is best effort: a failed insert is logged and never fails the booking or
//! payment operation that triggered it.

use chrono::NaiveDateTime;
use sqlx::PgPool;

use barberly_core::{BookingId, NotificationId, NotificationKind, Price, UserId};

use crate::db::RepositoryError;
use crate::db::notifications::NotificationRepository;
use crate::models::{Booking, Notification, Salon};

/// Facts about a booking quoted in notification text.
#[derive(Debug, Clone)]
pub struct BookingFacts<'a> {
    pub booking_id: BookingId,
    pub salon_name: &'a str,
    pub customer_name: &'a str,
    /// Appointment start on the salon's wall clock.
    pub start_local: NaiveDateTime,
    pub amount: Price,
}

impl<'a> BookingFacts<'a> {
    /// Facts for `booking` at `salon`.
    #[must_use]
    pub fn of(booking: &'a Booking, salon: &'a Salon) -> Self {
        Self {
            booking_id: booking.id,
            salon_name: &salon.name,
            customer_name: &booking.customer_name,
            start_local: booking.start_at.with_timezone(&salon.offset()).naive_local(),
            amount: booking.total_price,
        }
    }
}

/// Title and body for a notification kind.
#[must_use]
pub fn render(kind: NotificationKind, facts: &BookingFacts<'_>) -> (String, String) {
    let when = facts.start_local.format("%H:%M %d/%m/%Y");
    let id = facts.booking_id;
    match kind {
        NotificationKind::BookingCreated => (
            "New booking".to_owned(),
            format!(
                "{} booked #{id} at {} for {when}.",
                facts.customer_name, facts.salon_name
            ),
        ),
        NotificationKind::BookingConfirmed => (
            "Booking confirmed".to_owned(),
            format!("Your booking #{id} at {} on {when} is confirmed.", facts.salon_name),
        ),
        NotificationKind::BookingCancelled => (
            "Booking cancelled".to_owned(),
            format!("Booking #{id} at {} on {when} was cancelled.", facts.salon_name),
        ),
        NotificationKind::BookingCompleted => (
            "Thanks for visiting".to_owned(),
            format!("Booking #{id} at {} is complete.", facts.salon_name),
        ),
        NotificationKind::PaymentReceived => (
            "Payment received".to_owned(),
            format!("We received {} for booking #{id}.", facts.amount),
        ),
        NotificationKind::PaymentFailed => (
            "Payment not received".to_owned(),
            format!(
                "The transfer of {} for booking #{id} was not confirmed in time. You can try again.",
                facts.amount
            ),
        ),
    }
}

/// Notification service.
pub struct NotificationService<'a> {
    notifications: NotificationRepository<'a>,
}

impl<'a> NotificationService<'a> {
    /// Create a new notification service.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            notifications: NotificationRepository::new(pool),
        }
    }

    /// Notify `user` about a booking event, logging instead of failing.
    pub async fn notify(&self, user: UserId, kind: NotificationKind, facts: &BookingFacts<'_>) {
        let (title, body) = render(kind, facts);
        if let Err(e) = self
            .notifications
            .create(user, kind, &title, &body, Some(facts.booking_id))
            .await
        {
            tracing::warn!(
                error = %e,
                user_id = %user,
                booking_id = %facts.booking_id,
                ?kind,
                "Failed to store notification"
            );
        }
    }

    /// Notify each present recipient once.
    pub async fn notify_all(
        &self,
        recipients: &[Option<UserId>],
        kind: NotificationKind,
        facts: &BookingFacts<'_>,
    ) {
        let mut seen: Vec<UserId> = Vec::with_capacity(recipients.len());
        for user in recipients.iter().flatten() {
            if !seen.contains(user) {
                seen.push(*user);
                self.notify(*user, kind, facts).await;
            }
        }
    }

    /// List a user's notifications.
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
        self.notifications.list(user, unread_only, limit).await
    }

    /// Mark one notification read.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if it is not the user's notification.
    pub async fn mark_read(
        &self,
        user: UserId,
        id: NotificationId,
    ) -> Result<Notification, RepositoryError> {
        self.notifications.mark_read(user, id).await
    }

    /// Mark every notification read.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn mark_all_read(&self, user: UserId) -> Result<u64, RepositoryError> {
        self.notifications.mark_all_read(user).await
    }
}
