//! Booking repository.
//!
//! Overlap protection lives in the schema: inserting a slot-holding booking that
//! overlaps another one for the same staff member fails with an exclusion violation,
//! reported as [`RepositoryError::Conflict`].

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use barberly_core::{BookingId, BookingStatus, PhoneNumber, Price, SalonId, StaffId, UserId};

use super::payments::PAYMENT_COLUMNS;
use super::{RepositoryError, map_write_error};
use crate::models::{Booking, BookingLine, Payment, Service};

pub(super) const BOOKING_COLUMNS: &str = "id, salon_id, staff_id, customer_id, customer_name, \
     customer_phone, start_at, end_at, status, total_price, note, created_at, updated_at";

/// Message attached to a double-booking conflict.
pub const SLOT_TAKEN: &str = "slot already booked";

/// Fields for a new booking.
#[derive(Debug, Clone)]
pub struct NewBooking<'a> {
    pub salon_id: SalonId,
    pub staff_id: StaffId,
    pub customer_id: Option<UserId>,
    pub customer_name: &'a str,
    pub customer_phone: &'a PhoneNumber,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub total_price: Price,
    pub note: Option<&'a str>,
}

/// Repository for bookings.
pub struct BookingRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> BookingRepository<'a> {
    /// Create a new booking repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Insert a booking and its line items in one transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the staff member already holds an
    /// overlapping booking.
    pub async fn create(
        &self,
        new: &NewBooking<'_>,
        services: &[Service],
    ) -> Result<Booking, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let booking = sqlx::query_as::<_, Booking>(&format!(
            "INSERT INTO bookings (salon_id, staff_id, customer_id, customer_name, customer_phone,
                                   start_at, end_at, total_price, note)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             RETURNING {BOOKING_COLUMNS}"
        ))
        .bind(new.salon_id)
        .bind(new.staff_id)
        .bind(new.customer_id)
        .bind(new.customer_name)
        .bind(new.customer_phone)
        .bind(new.start_at)
        .bind(new.end_at)
        .bind(new.total_price)
        .bind(new.note)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_write_error(e, SLOT_TAKEN))?;

        for service in services {
            sqlx::query(
                "INSERT INTO booking_services (booking_id, service_id, name, price, duration_minutes)
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(booking.id)
            .bind(service.id)
            .bind(&service.name)
            .bind(service.price)
            .bind(service.duration_minutes)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_write_error(e, "service listed twice"))?;
        }

        tx.commit().await?;
        Ok(booking)
    }

    /// Get a booking by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: BookingId) -> Result<Option<Booking>, RepositoryError> {
        let booking = sqlx::query_as::<_, Booking>(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        Ok(booking)
    }

    /// Line items of a booking.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn lines(&self, id: BookingId) -> Result<Vec<BookingLine>, RepositoryError> {
        let lines = sqlx::query_as::<_, BookingLine>(
            "SELECT booking_id, service_id, name, price, duration_minutes
             FROM booking_services WHERE booking_id = $1 ORDER BY service_id",
        )
        .bind(id)
        .fetch_all(self.pool)
        .await?;
        Ok(lines)
    }

    /// Slot-holding bookings of the given staff members that overlap `[from, to)`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn holding_between(
        &self,
        staff: &[StaffId],
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Booking>, RepositoryError> {
        let raw: Vec<i32> = staff.iter().map(StaffId::as_i32).collect();
        let bookings = sqlx::query_as::<_, Booking>(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings
             WHERE staff_id = ANY($1)
               AND status IN ('pending', 'confirmed')
               AND start_at < $3 AND end_at > $2
             ORDER BY start_at"
        ))
        .bind(&raw)
        .bind(from)
        .bind(to)
        .fetch_all(self.pool)
        .await?;
        Ok(bookings)
    }

    /// Move a booking from `from` to `to` if it is still in `from`.
    ///
    /// Returns `None` when the booking has moved on concurrently.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn transition(
        &self,
        id: BookingId,
        from: BookingStatus,
        to: BookingStatus,
    ) -> Result<Option<Booking>, RepositoryError> {
        let booking = sqlx::query_as::<_, Booking>(&format!(
            "UPDATE bookings SET status = $3, updated_at = now()
             WHERE id = $1 AND status = $2
             RETURNING {BOOKING_COLUMNS}"
        ))
        .bind(id)
        .bind(from)
        .bind(to)
        .fetch_optional(self.pool)
        .await?;
        Ok(booking)
    }

    /// Cancel a booking still in `from` and fail its pending payments with `reason`,
    /// in one transaction.
    ///
    /// Returns `None` when the booking has moved on concurrently.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn cancel(
        &self,
        id: BookingId,
        from: BookingStatus,
        reason: &str,
    ) -> Result<Option<(Booking, Vec<Payment>)>, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let booking = sqlx::query_as::<_, Booking>(&format!(
            "UPDATE bookings SET status = 'cancelled', updated_at = now()
             WHERE id = $1 AND status = $2
             RETURNING {BOOKING_COLUMNS}"
        ))
        .bind(id)
        .bind(from)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(booking) = booking else {
            tx.rollback().await?;
            return Ok(None);
        };

        let failed = sqlx::query_as::<_, Payment>(&format!(
            "UPDATE payments
             SET status = 'failed', failure_reason = $2, updated_at = now()
             WHERE booking_id = $1 AND status = 'pending'
             RETURNING {PAYMENT_COLUMNS}"
        ))
        .bind(id)
        .bind(reason)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some((booking, failed)))
    }

    /// Bookings made by a customer, latest appointment first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_customer(&self, customer: UserId) -> Result<Vec<Booking>, RepositoryError> {
        let bookings = sqlx::query_as::<_, Booking>(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings
             WHERE customer_id = $1
             ORDER BY start_at DESC"
        ))
        .bind(customer)
        .fetch_all(self.pool)
        .await?;
        Ok(bookings)
    }

    /// A salon's bookings starting in `[from, to)`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_salon(
        &self,
        salon: SalonId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Booking>, RepositoryError> {
        let bookings = sqlx::query_as::<_, Booking>(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings
             WHERE salon_id = $1 AND start_at >= $2 AND start_at < $3
             ORDER BY start_at, staff_id"
        ))
        .bind(salon)
        .bind(from)
        .bind(to)
        .fetch_all(self.pool)
        .await?;
        Ok(bookings)
    }

    /// All bookings, optionally filtered by status, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_by_status(
        &self,
        status: Option<BookingStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Booking>, RepositoryError> {
        let bookings = sqlx::query_as::<_, Booking>(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings
             WHERE ($1::booking_status IS NULL OR status = $1)
             ORDER BY created_at DESC, id DESC
             LIMIT $2 OFFSET $3"
        ))
        .bind(status)
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool)
        .await?;
        Ok(bookings)
    }

    /// Number of bookings per status.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn count_by_status(&self) -> Result<Vec<(BookingStatus, i64)>, RepositoryError> {
        let counts = sqlx::query_as::<_, (BookingStatus, i64)>(
            "SELECT status, COUNT(*) FROM bookings GROUP BY status ORDER BY status",
        )
        .fetch_all(self.pool)
        .await?;
        Ok(counts)
    }
}
