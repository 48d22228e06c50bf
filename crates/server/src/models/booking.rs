//! Booking domain types.

use chrono::{DateTime, FixedOffset, Utc};
use serde::Serialize;

use barberly_core::schedule::{Interval, ScheduleError};
use barberly_core::{BookingId, BookingStatus, PhoneNumber, Price, SalonId, ServiceId, StaffId, UserId};

/// A reservation of one staff member's time.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Booking {
    pub id: BookingId,
    pub salon_id: SalonId,
    pub staff_id: StaffId,
    /// `None` for guest bookings.
    pub customer_id: Option<UserId>,
    pub customer_name: String,
    pub customer_phone: PhoneNumber,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub status: BookingStatus,
    pub total_price: Price,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    /// The booked interval on the salon's wall clock.
    ///
    /// # Errors
    ///
    /// Returns [`ScheduleError::EmptyInterval`] if the stored interval is empty.
    pub fn local_interval(&self, offset: FixedOffset) -> Result<Interval, ScheduleError> {
        Interval::new(
            self.start_at.with_timezone(&offset).naive_local(),
            self.end_at.with_timezone(&offset).naive_local(),
        )
    }

    /// Whether `user` booked this appointment.
    #[must_use]
    pub fn is_customer(&self, user: UserId) -> bool {
        self.customer_id == Some(user)
    }
}

/// A service line captured at booking time.
///
/// Name, price and duration are copied so later catalogue edits do not
/// rewrite history.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct BookingLine {
    pub booking_id: BookingId,
    pub service_id: ServiceId,
    pub name: String,
    pub price: Price,
    pub duration_minutes: i32,
}

/// A booking together with its line items.
#[derive(Debug, Clone, Serialize)]
pub struct BookingDetail {
    #[serde(flatten)]
    pub booking: Booking,
    pub services: Vec<BookingLine>,
}
