//! Payments: VietQR bank transfers confirmed by polling, and cash at the counter.
//!
//! A payment starts `pending` with a random reference the payer copies into the
//! transfer content. It settles exactly once, to `paid` (bank feed match, webhook or
//! manual confirmation) or to `failed` (confirmation window closed, booking cancelled).
//! A failed payment is retried by starting a new one.

pub mod poll;
pub mod watcher;

use chrono::{DateTime, Utc};
use rand::seq::IndexedRandom;
use serde::Serialize;
use sqlx::PgPool;
use tracing::{info, instrument};

use barberly_core::vietqr::{QuickLink, VietQr, VietQrError, transfer_content};
use barberly_core::{NotificationKind, PaymentId, PaymentMethod, PaymentStatus, Price};

use crate::bank::BankTransfer;
use crate::config::PaymentConfig;
use crate::db::RepositoryError;
use crate::db::bookings::BookingRepository;
use crate::db::payments::{NewPayment, Paid, PaymentRepository};
use crate::db::salons::SalonRepository;
use crate::error::AppError;
use crate::models::{Booking, Payment, PaymentView, QrPaymentDescriptor};
use crate::services::notification::{BookingFacts, NotificationService};

/// Length of a payment reference.
pub const REFERENCE_LENGTH: usize = 8;

/// Reference alphabet: uppercase letters and digits without look-alikes (0/O, 1/I).
const REFERENCE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Failure reason recorded when the confirmation window closes.
pub const TIMED_OUT: &str = "timed out";

/// Failure reason recorded when the booking is cancelled.
pub const BOOKING_CANCELLED: &str = "booking cancelled";

/// Generate a random payment reference.
#[must_use]
pub fn generate_reference() -> String {
    let mut rng = rand::rng();
    (0..REFERENCE_LENGTH)
        .filter_map(|_| REFERENCE_ALPHABET.choose(&mut rng).copied().map(char::from))
        .collect()
}

/// Build the transfer screen for a pending VietQR payment.
///
/// # Errors
///
/// Returns `VietQrError` if the configured account or the payment cannot be encoded.
pub fn qr_descriptor(
    config: &PaymentConfig,
    payment: &Payment,
    now: DateTime<Utc>,
) -> Result<QrPaymentDescriptor, VietQrError> {
    let amount = payment.amount.as_dong().unwrap_or(0);

    let qr_payload = VietQr {
        bank_bin: config.bank_bin.clone(),
        account_number: config.account_number.clone(),
        amount: Some(amount),
        purpose: payment.transfer_content.clone(),
    }
    .encode()?;

    let qr_image_url = QuickLink {
        bank: &config.bank_code,
        account_number: &config.account_number,
        template: &config.qr_template,
        amount: Some(amount),
        purpose: &payment.transfer_content,
        account_name: Some(&config.account_name),
    }
    .url()?;

    Ok(QrPaymentDescriptor {
        payment_id: payment.id,
        bank_bin: config.bank_bin.clone(),
        bank_code: config.bank_code.clone(),
        account_number: config.account_number.clone(),
        account_name: config.account_name.clone(),
        amount: payment.amount,
        transfer_content: payment.transfer_content.clone(),
        qr_payload,
        qr_image_url: qr_image_url.to_string(),
        expires_at: payment.expires_at,
        seconds_remaining: payment.seconds_remaining(now),
    })
}

/// References that a transfer content could be carrying.
///
/// The token following the configured prefix comes first, then any standalone token of
/// reference length.
#[must_use]
pub fn reference_candidates(content: &str, prefix: &str) -> Vec<String> {
    let mut candidates: Vec<String> = Vec::new();
    let mut push = |candidate: String| {
        if candidate.len() == REFERENCE_LENGTH && !candidates.contains(&candidate) {
            candidates.push(candidate);
        }
    };

    let squashed: String = content
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_uppercase())
        .collect();
    let prefix: String = prefix
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_uppercase())
        .collect();

    if !prefix.is_empty() {
        for (at, _) in squashed.match_indices(&prefix) {
            let rest = squashed.get(at + prefix.len()..).unwrap_or_default();
            push(rest.chars().take(REFERENCE_LENGTH).collect());
        }
    }

    for token in content.split(|c: char| !c.is_ascii_alphanumeric()) {
        push(token.to_ascii_uppercase());
    }

    candidates
}

/// A started payment and, for VietQR, its transfer screen.
#[derive(Debug, Clone, Serialize)]
pub struct StartedPayment {
    pub payment: PaymentView,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qr: Option<QrPaymentDescriptor>,
}

/// Check that `booking`, with its `existing` payments, can take a new payment.
///
/// # Errors
///
/// Returns `AppError::BadRequest` if the booking is cancelled or completed, costs
/// nothing or is already paid.
pub fn check_payable(booking: &Booking, existing: &[Payment]) -> Result<(), AppError> {
    if !booking.status.holds_slot() {
        return Err(AppError::BadRequest(format!(
            "cannot pay for a {} booking",
            booking.status
        )));
    }
    if booking.total_price <= Price::ZERO {
        return Err(AppError::BadRequest("nothing to pay".to_string()));
    }
    if existing.iter().any(|p| p.status == PaymentStatus::Paid) {
        return Err(AppError::BadRequest("booking is already paid".to_string()));
    }
    Ok(())
}

/// How a transfer relates to a pending payment whose reference it carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferMatch {
    /// Pays the payment in full within its window.
    Pays,
    /// Less than the amount due.
    Short,
    /// The confirmation window closed before the transfer was applied.
    Expired,
}

/// Decide what `transfer` does to the pending `payment` at `now`.
#[must_use]
pub fn match_transfer(payment: &Payment, transfer: &BankTransfer, now: DateTime<Utc>) -> TransferMatch {
    if payment.is_overdue(now) {
        return TransferMatch::Expired;
    }
    let amount = payment.amount.as_dong().unwrap_or(i64::MAX);
    if transfer.pays(&payment.reference, amount) {
        TransferMatch::Pays
    } else {
        TransferMatch::Short
    }
}

/// Settles pending payments and runs the follow-up on the booking.
pub struct Settlement<'a> {
    pool: &'a PgPool,
}

impl<'a> Settlement<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Mark a pending payment paid, confirm its booking and notify both parties.
    ///
    /// Returns `None` if the payment was no longer pending or its booking was
    /// cancelled or completed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the update fails.
    #[instrument(skip(self), fields(payment_id = %id))]
    pub async fn pay(
        &self,
        id: PaymentId,
        bank_transaction_id: Option<&str>,
    ) -> Result<Option<Payment>, RepositoryError> {
        let Some(Paid { payment, confirmed }) = PaymentRepository::new(self.pool)
            .mark_paid(id, bank_transaction_id)
            .await?
        else {
            return Ok(None);
        };
        let was_confirmed = confirmed.is_some();
        info!(booking_id = %payment.booking_id, was_confirmed, "Payment received");

        let booking = match confirmed {
            Some(booking) => Some(booking),
            None => BookingRepository::new(self.pool).get(payment.booking_id).await?,
        };
        if let Some(booking) = booking
            && let Some(salon) = SalonRepository::new(self.pool).get(booking.salon_id).await?
        {
            let facts = BookingFacts::of(&booking, &salon);
            let notifications = NotificationService::new(self.pool);
            notifications
                .notify_all(
                    &[booking.customer_id, Some(salon.owner_id)],
                    NotificationKind::PaymentReceived,
                    &facts,
                )
                .await;
            if let Some(customer) = booking.customer_id.filter(|_| was_confirmed) {
                notifications
                    .notify(customer, NotificationKind::BookingConfirmed, &facts)
                    .await;
            }
        }

        Ok(Some(payment))
    }

    /// Mark a pending payment failed and tell the customer.
    ///
    /// Returns `None` if the payment was no longer pending.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the update fails.
    #[instrument(skip(self), fields(payment_id = %id))]
    pub async fn fail(&self, id: PaymentId, reason: &str) -> Result<Option<Payment>, RepositoryError> {
        let Some(payment) = PaymentRepository::new(self.pool)
            .mark_failed(id, reason)
            .await?
        else {
            return Ok(None);
        };
        info!(booking_id = %payment.booking_id, reason, "Payment failed");

        self.notify_failed(&payment).await?;
        Ok(Some(payment))
    }

    async fn notify_failed(&self, payment: &Payment) -> Result<(), RepositoryError> {
        let Some(booking) = BookingRepository::new(self.pool).get(payment.booking_id).await? else {
            return Ok(());
        };
        let Some(customer) = booking.customer_id else {
            return Ok(());
        };
        if let Some(salon) = SalonRepository::new(self.pool).get(booking.salon_id).await? {
            let mut facts = BookingFacts::of(&booking, &salon);
            facts.amount = payment.amount;
            NotificationService::new(self.pool)
                .notify(customer, NotificationKind::PaymentFailed, &facts)
                .await;
        }
        Ok(())
    }
}

/// Payment service.
pub struct PaymentService<'a> {
    pool: &'a PgPool,
    config: &'a PaymentConfig,
}

impl<'a> PaymentService<'a> {
    /// Create a new payment service.
    #[must_use]
    pub const fn new(pool: &'a PgPool, config: &'a PaymentConfig) -> Self {
        Self { pool, config }
    }

    /// Start a payment for `booking`.
    ///
    /// VietQR payments expire after the confirmation timeout. Cash is collected at the
    /// visit, so a cash payment stays open until the appointment ends.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` if [`check_payable`] refuses the booking and
    /// `AppError::Conflict` if a payment is already pending.
    #[instrument(skip(self, booking), fields(booking_id = %booking.id))]
    pub async fn start(
        &self,
        booking: &Booking,
        method: PaymentMethod,
    ) -> Result<(Payment, Option<QrPaymentDescriptor>), AppError> {
        let payments = PaymentRepository::new(self.pool);
        let existing = payments.list_for_booking(booking.id).await?;
        check_payable(booking, &existing)?;

        let now = Utc::now();
        let expires_at = match method {
            PaymentMethod::VietQr => {
                now + chrono::Duration::from_std(self.config.confirmation_timeout)
                    .map_err(|e| AppError::Internal(format!("confirmation timeout: {e}")))?
            }
            PaymentMethod::Cash => booking.end_at.max(now),
        };

        let reference = generate_reference();
        let content = transfer_content(&self.config.transfer_prefix, &reference);
        let payment = payments
            .create(&NewPayment {
                booking_id: booking.id,
                method,
                amount: booking.total_price,
                reference: &reference,
                transfer_content: &content,
                expires_at,
            })
            .await?;
        info!(payment_id = %payment.id, "Payment started");

        let qr = match method {
            PaymentMethod::VietQr => Some(
                qr_descriptor(self.config, &payment, now)
                    .map_err(|e| AppError::Internal(format!("QR encoding failed: {e}")))?,
            ),
            PaymentMethod::Cash => None,
        };
        Ok((payment, qr))
    }

    /// Current state of a payment. An overdue pending payment is failed on read.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the payment does not exist.
    pub async fn status(&self, id: PaymentId) -> Result<Payment, AppError> {
        let payment = self.get(id).await?;
        if !payment.is_overdue(Utc::now()) {
            return Ok(payment);
        }

        match Settlement::new(self.pool).fail(id, TIMED_OUT).await? {
            Some(failed) => Ok(failed),
            // Settled concurrently; report whatever won.
            None => self.get(id).await,
        }
    }

    /// Confirm a pending payment by hand (cash received, transfer checked in the
    /// banking app).
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the payment does not exist and
    /// `AppError::Conflict` if it is no longer pending or its window has closed. An
    /// overdue payment is failed.
    #[instrument(skip(self), fields(payment_id = %id))]
    pub async fn confirm_manually(&self, id: PaymentId) -> Result<Payment, AppError> {
        let payment = self.get(id).await?;
        let settlement = Settlement::new(self.pool);
        if payment.is_overdue(Utc::now()) {
            settlement.fail(id, TIMED_OUT).await?;
            return Err(AppError::Conflict("payment has expired".to_string()));
        }
        settlement
            .pay(id, None)
            .await?
            .ok_or_else(|| AppError::Conflict("payment is not pending".to_string()))
    }

    /// Apply a transfer reported by the bank webhook.
    ///
    /// Returns the payment it settled, or `None` if no pending payment matches. A
    /// payment whose window has closed is failed instead of paid.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Database` if a query fails.
    #[instrument(skip(self, transfer), fields(transaction_id = %transfer.id))]
    pub async fn apply_transfer(&self, transfer: &BankTransfer) -> Result<Option<Payment>, AppError> {
        let payments = PaymentRepository::new(self.pool);

        for reference in reference_candidates(&transfer.content, &self.config.transfer_prefix) {
            let Some(payment) = payments.find_pending_by_reference(&reference).await? else {
                continue;
            };
            let settlement = Settlement::new(self.pool);
            match match_transfer(&payment, transfer, Utc::now()) {
                TransferMatch::Pays => {
                    return Ok(settlement.pay(payment.id, Some(&transfer.id)).await?);
                }
                TransferMatch::Short => {
                    tracing::warn!(
                        payment_id = %payment.id,
                        received = transfer.amount,
                        expected = payment.amount.as_dong(),
                        "Transfer matched a reference but not the amount"
                    );
                }
                TransferMatch::Expired => {
                    tracing::warn!(payment_id = %payment.id, "Transfer arrived after the payment expired");
                    settlement.fail(payment.id, TIMED_OUT).await?;
                }
            }
        }

        info!("Transfer did not match any pending payment");
        Ok(None)
    }

    async fn get(&self, id: PaymentId) -> Result<Payment, AppError> {
        PaymentRepository::new(self.pool)
            .get(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("payment {id}")))
    }
}
