//! Background confirmation of VietQR payments.
//!
//! Each pending VietQR payment gets one task that polls the ledger and the bank feed
//! until the payment settles or its window closes, then fails it with
//! [`TIMED_OUT`](super::TIMED_OUT). Tasks are resumed at startup for payments that
//! were pending when the server stopped.

use std::future::Future;
use std::time::Duration;

use chrono::Utc;
use sqlx::PgPool;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{Instrument, info, info_span};

use barberly_core::{PaymentId, PaymentMethod, PaymentStatus};

use super::poll::{PaymentProbe, PollOutcome, PollSchedule, poll_until_settled};
use super::{Settlement, TIMED_OUT};
use crate::bank::{BankFeedClient, BankFeedError, BankTransfer};
use crate::db::RepositoryError;
use crate::db::payments::PaymentRepository;
use crate::models::Payment;

/// Where payments are read and settled.
pub trait Ledger: Send + Sync {
    fn payment(
        &self,
        id: PaymentId,
    ) -> impl Future<Output = Result<Option<Payment>, RepositoryError>> + Send;

    fn settle_paid(
        &self,
        id: PaymentId,
        transaction_id: &str,
    ) -> impl Future<Output = Result<Option<Payment>, RepositoryError>> + Send;

    fn settle_failed(
        &self,
        id: PaymentId,
        reason: &str,
    ) -> impl Future<Output = Result<Option<Payment>, RepositoryError>> + Send;
}

/// Where incoming transfers are looked up.
pub trait TransferSource: Send + Sync {
    fn find(
        &self,
        reference: &str,
        amount: i64,
    ) -> impl Future<Output = Result<Option<BankTransfer>, BankFeedError>> + Send;
}

impl TransferSource for BankFeedClient {
    async fn find(&self, reference: &str, amount: i64) -> Result<Option<BankTransfer>, BankFeedError> {
        self.find_transfer(reference, amount).await
    }
}

/// No feed configured: payments settle only through the webhook or by hand.
impl<T: TransferSource> TransferSource for Option<T> {
    async fn find(&self, reference: &str, amount: i64) -> Result<Option<BankTransfer>, BankFeedError> {
        match self {
            Some(source) => source.find(reference, amount).await,
            None => Ok(None),
        }
    }
}

/// The ledger backed by `PostgreSQL`.
#[derive(Clone)]
pub struct PgLedger {
    pool: PgPool,
}

impl PgLedger {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl Ledger for PgLedger {
    async fn payment(&self, id: PaymentId) -> Result<Option<Payment>, RepositoryError> {
        PaymentRepository::new(&self.pool).get(id).await
    }

    async fn settle_paid(
        &self,
        id: PaymentId,
        transaction_id: &str,
    ) -> Result<Option<Payment>, RepositoryError> {
        Settlement::new(&self.pool).pay(id, Some(transaction_id)).await
    }

    async fn settle_failed(&self, id: PaymentId, reason: &str) -> Result<Option<Payment>, RepositoryError> {
        Settlement::new(&self.pool).fail(id, reason).await
    }
}

/// A failed watch probe.
#[derive(Debug, Error)]
pub enum WatchError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Feed(#[from] BankFeedError),

    #[error("payment {0} no longer exists")]
    Missing(PaymentId),
}

struct WatchProbe<'a, L, T> {
    ledger: &'a L,
    transfers: &'a T,
    payment_id: PaymentId,
}

impl<L: Ledger, T: TransferSource> PaymentProbe for WatchProbe<'_, L, T> {
    type Error = WatchError;

    async fn probe(&mut self) -> Result<PaymentStatus, WatchError> {
        let payment = self
            .ledger
            .payment(self.payment_id)
            .await?
            .ok_or(WatchError::Missing(self.payment_id))?;
        if payment.status != PaymentStatus::Pending {
            return Ok(payment.status);
        }

        let amount = payment.amount.as_dong().unwrap_or(i64::MAX);
        if let Some(transfer) = self.transfers.find(&payment.reference, amount).await?
            && let Some(paid) = self.ledger.settle_paid(payment.id, &transfer.id).await?
        {
            return Ok(paid.status);
        }
        Ok(PaymentStatus::Pending)
    }
}

/// Watch one payment until it settles, failing it when the schedule runs out.
pub async fn watch<L: Ledger, T: TransferSource>(
    ledger: &L,
    transfers: &T,
    payment_id: PaymentId,
    schedule: PollSchedule,
) -> PollOutcome {
    let mut probe = WatchProbe {
        ledger,
        transfers,
        payment_id,
    };

    match poll_until_settled(&mut probe, schedule).await {
        PollOutcome::TimedOut => match ledger.settle_failed(payment_id, TIMED_OUT).await {
            Ok(Some(_)) => PollOutcome::TimedOut,
            // Settled between the last probe and the deadline.
            Ok(None) => match ledger.payment(payment_id).await {
                Ok(Some(payment)) if payment.status.is_settled() => {
                    PollOutcome::Settled(payment.status)
                }
                _ => PollOutcome::TimedOut,
            },
            Err(e) => {
                tracing::error!(error = %e, "Failed to expire payment");
                PollOutcome::TimedOut
            }
        },
        settled => settled,
    }
}

/// Spawns and resumes payment watch tasks.
#[derive(Clone)]
pub struct PaymentWatcher {
    ledger: PgLedger,
    feed: Option<BankFeedClient>,
    interval: Duration,
}

impl PaymentWatcher {
    #[must_use]
    pub const fn new(pool: PgPool, feed: Option<BankFeedClient>, interval: Duration) -> Self {
        Self {
            ledger: PgLedger::new(pool),
            feed,
            interval,
        }
    }

    /// Start watching `payment` in the background.
    pub fn spawn(&self, payment: &Payment) -> JoinHandle<()> {
        let remaining = (payment.expires_at - Utc::now())
            .to_std()
            .unwrap_or(Duration::ZERO);
        let schedule = PollSchedule::new(self.interval, remaining);
        let watcher = self.clone();
        let payment_id = payment.id;

        tokio::spawn(
            async move {
                let outcome = watch(&watcher.ledger, &watcher.feed, payment_id, schedule).await;
                info!(?outcome, "Payment watch finished");
            }
            .instrument(info_span!("payment_watch", payment_id = %payment_id)),
        )
    }

    /// Resume watching every pending VietQR payment. Returns how many were resumed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the pending payments cannot be listed.
    pub async fn resume(&self) -> Result<usize, RepositoryError> {
        let pending = PaymentRepository::new(&self.ledger.pool).list_pending().await?;
        let mut resumed = 0;
        for payment in pending.iter().filter(|p| p.method == PaymentMethod::VietQr) {
            self.spawn(payment);
            resumed += 1;
        }
        info!(resumed, "Resumed payment watchers");
        Ok(resumed)
    }
}
