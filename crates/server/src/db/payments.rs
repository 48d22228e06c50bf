//! Payment repository.
//!
//! Status changes are compare-and-set on `status = 'pending'`, so a payment settles at
//! most once no matter how many watchers, webhooks or admins race on it.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use barberly_core::{BookingId, PaymentId, PaymentMethod, Price};

use super::{RepositoryError, map_write_error};
use super::bookings::BOOKING_COLUMNS;
use crate::models::{Booking, Payment};

pub(super) const PAYMENT_COLUMNS: &str = "id, booking_id, method, status, amount, reference, \
     transfer_content, bank_transaction_id, failure_reason, expires_at, paid_at, created_at, updated_at";

/// Message attached to a second pending payment for one booking.
pub const PAYMENT_IN_PROGRESS: &str = "a payment is already in progress for this booking";

/// Fields for a new pending payment.
#[derive(Debug, Clone)]
pub struct NewPayment<'a> {
    pub booking_id: BookingId,
    pub method: PaymentMethod,
    pub amount: Price,
    pub reference: &'a str,
    pub transfer_content: &'a str,
    pub expires_at: DateTime<Utc>,
}

/// A payment settled as paid.
#[derive(Debug, Clone)]
pub struct Paid {
    pub payment: Payment,
    /// The booking, if this payment moved it from pending to confirmed.
    pub confirmed: Option<Booking>,
}

/// Repository for payments.
pub struct PaymentRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> PaymentRepository<'a> {
    /// Create a new payment repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Insert a pending payment.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the booking already has a pending payment
    /// or the reference collides.
    pub async fn create(&self, new: &NewPayment<'_>) -> Result<Payment, RepositoryError> {
        sqlx::query_as::<_, Payment>(&format!(
            "INSERT INTO payments (booking_id, method, amount, reference, transfer_content, expires_at)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {PAYMENT_COLUMNS}"
        ))
        .bind(new.booking_id)
        .bind(new.method)
        .bind(new.amount)
        .bind(new.reference)
        .bind(new.transfer_content)
        .bind(new.expires_at)
        .fetch_one(self.pool)
        .await
        .map_err(|e| map_write_error(e, PAYMENT_IN_PROGRESS))
    }

    /// Get a payment by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: PaymentId) -> Result<Option<Payment>, RepositoryError> {
        let payment = sqlx::query_as::<_, Payment>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        Ok(payment)
    }

    /// All payments of a booking, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_booking(&self, booking: BookingId) -> Result<Vec<Payment>, RepositoryError> {
        let payments = sqlx::query_as::<_, Payment>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE booking_id = $1 ORDER BY id DESC"
        ))
        .bind(booking)
        .fetch_all(self.pool)
        .await?;
        Ok(payments)
    }

    /// Pending payments, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_pending(&self) -> Result<Vec<Payment>, RepositoryError> {
        let payments = sqlx::query_as::<_, Payment>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE status = 'pending' ORDER BY id"
        ))
        .fetch_all(self.pool)
        .await?;
        Ok(payments)
    }

    /// The pending payment carrying `reference`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_pending_by_reference(
        &self,
        reference: &str,
    ) -> Result<Option<Payment>, RepositoryError> {
        let payment = sqlx::query_as::<_, Payment>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE reference = $1 AND status = 'pending'"
        ))
        .bind(reference)
        .fetch_optional(self.pool)
        .await?;
        Ok(payment)
    }

    /// Settle a pending payment as paid and confirm its booking, in one transaction.
    ///
    /// The booking row is locked first, the same order cancellation uses, so a
    /// booking is never cancelled and paid at once. Returns `None` if the payment was
    /// not pending or its booking no longer holds a slot.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the bank transaction was already
    /// applied to another payment.
    pub async fn mark_paid(
        &self,
        id: PaymentId,
        bank_transaction_id: Option<&str>,
    ) -> Result<Option<Paid>, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "SELECT b.id FROM bookings b
             JOIN payments p ON p.booking_id = b.id
             WHERE p.id = $1
             FOR UPDATE OF b",
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;

        let payment = sqlx::query_as::<_, Payment>(&format!(
            "UPDATE payments
             SET status = 'paid', paid_at = now(), bank_transaction_id = $2, updated_at = now()
             WHERE id = $1 AND status = 'pending'
               AND EXISTS (SELECT 1 FROM bookings b
                           WHERE b.id = payments.booking_id
                             AND b.status IN ('pending', 'confirmed'))
             RETURNING {PAYMENT_COLUMNS}"
        ))
        .bind(id)
        .bind(bank_transaction_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| map_write_error(e, "bank transaction already applied"))?;

        let Some(payment) = payment else {
            tx.rollback().await?;
            return Ok(None);
        };

        let confirmed = sqlx::query_as::<_, Booking>(&format!(
            "UPDATE bookings SET status = 'confirmed', updated_at = now()
             WHERE id = $1 AND status = 'pending'
             RETURNING {BOOKING_COLUMNS}"
        ))
        .bind(payment.booking_id)
        .fetch_optional(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(Paid { payment, confirmed }))
    }

    /// Settle a pending payment as failed.
    ///
    /// Returns `None` if the payment was not pending.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn mark_failed(
        &self,
        id: PaymentId,
        reason: &str,
    ) -> Result<Option<Payment>, RepositoryError> {
        let payment = sqlx::query_as::<_, Payment>(&format!(
            "UPDATE payments
             SET status = 'failed', failure_reason = $2, updated_at = now()
             WHERE id = $1 AND status = 'pending'
             RETURNING {PAYMENT_COLUMNS}"
        ))
        .bind(id)
        .bind(reason)
        .fetch_optional(self.pool)
        .await?;
        Ok(payment)
    }

    /// Total amount collected.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn total_paid(&self) -> Result<Price, RepositoryError> {
        let total: Option<Price> =
            sqlx::query_scalar("SELECT SUM(amount) FROM payments WHERE status = 'paid'")
                .fetch_one(self.pool)
                .await?;
        Ok(total.unwrap_or(Price::ZERO))
    }
}
