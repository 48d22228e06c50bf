//! Pending VietQR payments settling through the webhook or timing out.
//!
//! The server-side watcher and a client polling the status endpoint run against one
//! in-memory ledger on a paused clock.

#![allow(clippy::unwrap_used)]

use std::convert::Infallible;
use std::sync::Mutex;
use std::time::Duration;

use chrono::Utc;
use secrecy::SecretString;

use barberly_core::{BookingId, PaymentId, PaymentMethod, PaymentStatus, Price};
use barberly_server::bank::{BankFeedClient, BankTransfer, sign_webhook, verify_webhook};
use barberly_server::db::RepositoryError;
use barberly_server::models::Payment;
use barberly_server::services::payment::poll::{
    PaymentProbe, PollOutcome, PollSchedule, poll_until_settled,
};
use barberly_server::services::payment::watcher::{Ledger, watch};
use barberly_server::services::payment::{TIMED_OUT, reference_candidates};

const PAYMENT: PaymentId = PaymentId::new(7);
const PRICE: i64 = 180_000;

/// One payment held in memory, settled at most once.
struct MemoryLedger {
    payment: Mutex<Payment>,
}

impl MemoryLedger {
    fn pending() -> Self {
        let now = Utc::now();
        Self {
            payment: Mutex::new(Payment {
                id: PAYMENT,
                booking_id: BookingId::new(3),
                method: PaymentMethod::VietQr,
                status: PaymentStatus::Pending,
                amount: Price::from_dong(PRICE),
                reference: "R4TW8PZN".to_owned(),
                transfer_content: "BARBERLY R4TW8PZN".to_owned(),
                bank_transaction_id: None,
                failure_reason: None,
                expires_at: now + chrono::Duration::seconds(60),
                paid_at: None,
                created_at: now,
                updated_at: now,
            }),
        }
    }

    fn current(&self) -> Payment {
        self.payment.lock().unwrap().clone()
    }

    fn settle(&self, to: PaymentStatus, transaction: Option<&str>, reason: Option<&str>) -> Option<Payment> {
        let mut payment = self.payment.lock().unwrap();
        if payment.status.is_settled() {
            return None;
        }
        payment.status = to;
        payment.bank_transaction_id = transaction.map(str::to_owned);
        payment.failure_reason = reason.map(str::to_owned);
        if to == PaymentStatus::Paid {
            payment.paid_at = Some(Utc::now());
        }
        Some(payment.clone())
    }
}

impl Ledger for MemoryLedger {
    async fn payment(&self, _id: PaymentId) -> Result<Option<Payment>, RepositoryError> {
        Ok(Some(self.current()))
    }

    async fn settle_paid(
        &self,
        _id: PaymentId,
        transaction_id: &str,
    ) -> Result<Option<Payment>, RepositoryError> {
        Ok(self.settle(PaymentStatus::Paid, Some(transaction_id), None))
    }

    async fn settle_failed(
        &self,
        _id: PaymentId,
        reason: &str,
    ) -> Result<Option<Payment>, RepositoryError> {
        Ok(self.settle(PaymentStatus::Failed, None, Some(reason)))
    }
}

/// A client refreshing the payment status, as the CLI watch command does over HTTP.
struct StatusPage<'a> {
    ledger: &'a MemoryLedger,
    refreshes: u32,
}

impl PaymentProbe for StatusPage<'_> {
    type Error = Infallible;

    async fn probe(&mut self) -> Result<PaymentStatus, Infallible> {
        self.refreshes += 1;
        Ok(self.ledger.current().status)
    }
}

/// No bank feed: only the webhook or a manual confirmation settles payments.
const fn no_feed() -> Option<BankFeedClient> {
    None
}

fn watcher_schedule() -> PollSchedule {
    PollSchedule::new(Duration::from_secs(5), Duration::from_secs(60))
}

/// Deliver a signed bank webhook after `delay`, settling the payment it references.
async fn deliver_webhook(ledger: &MemoryLedger, delay: Duration, amount: i64) -> bool {
    tokio::time::sleep(delay).await;

    let secret = SecretString::from("whsec_integration".to_owned());
    let transfer = BankTransfer {
        id: "FT26293118".to_owned(),
        amount,
        content: "MBVCB.4410.BARBERLY R4TW8PZN.CT tu 0071000".to_owned(),
        received_at: Some(Utc::now()),
    };
    let body = serde_json::to_vec(&transfer).unwrap();
    let now = Utc::now();
    let signature = sign_webhook(&secret, now.timestamp(), &body).unwrap();

    verify_webhook(&secret, &now.timestamp().to_string(), &signature, &body, now).unwrap();
    let received: BankTransfer = serde_json::from_slice(&body).unwrap();

    let payment = ledger.current();
    let referenced = reference_candidates(&received.content, "BARBERLY").contains(&payment.reference);
    if !referenced || !received.pays(&payment.reference, PRICE) {
        return false;
    }
    ledger.settle_paid(payment.id, &received.id).await.unwrap().is_some()
}

#[tokio::test(start_paused = true)]
async fn test_webhook_settles_payment_while_watched() {
    let ledger = MemoryLedger::pending();
    let feed = no_feed();

    let (outcome, delivered) = tokio::join!(
        watch(&ledger, &feed, PAYMENT, watcher_schedule()),
        deliver_webhook(&ledger, Duration::from_secs(12), PRICE),
    );

    assert!(delivered);
    assert_eq!(outcome, PollOutcome::Settled(PaymentStatus::Paid));
    let payment = ledger.current();
    assert_eq!(payment.bank_transaction_id.as_deref(), Some("FT26293118"));
    assert!(payment.paid_at.is_some());
    assert_eq!(payment.seconds_remaining(Utc::now()), 0);
}

#[tokio::test(start_paused = true)]
async fn test_underpaid_webhook_leaves_payment_to_time_out() {
    let ledger = MemoryLedger::pending();
    let feed = no_feed();

    let (outcome, delivered) = tokio::join!(
        watch(&ledger, &feed, PAYMENT, watcher_schedule()),
        deliver_webhook(&ledger, Duration::from_secs(12), PRICE - 1_000),
    );

    assert!(!delivered);
    assert_eq!(outcome, PollOutcome::TimedOut);
    let payment = ledger.current();
    assert_eq!(payment.status, PaymentStatus::Failed);
    assert_eq!(payment.failure_reason.as_deref(), Some(TIMED_OUT));
}

#[tokio::test(start_paused = true)]
async fn test_client_sees_failure_once_watcher_gives_up() {
    let ledger = MemoryLedger::pending();
    let feed = no_feed();
    let mut page = StatusPage {
        ledger: &ledger,
        refreshes: 0,
    };
    let client_schedule = PollSchedule::new(Duration::from_secs(3), Duration::from_secs(300));

    let (watched, seen) = tokio::join!(
        watch(&ledger, &feed, PAYMENT, watcher_schedule()),
        poll_until_settled(&mut page, client_schedule),
    );

    assert_eq!(watched, PollOutcome::TimedOut);
    assert_eq!(seen, PollOutcome::Settled(PaymentStatus::Failed));
    // Refreshes every 3s and notices within one interval of the 60s deadline.
    let refreshes = page.refreshes;
    assert!((21..=22).contains(&refreshes), "refreshes = {refreshes}");
}

#[tokio::test(start_paused = true)]
async fn test_late_confirmation_after_timeout_is_ignored() {
    let ledger = MemoryLedger::pending();
    let feed = no_feed();

    let outcome = watch(&ledger, &feed, PAYMENT, watcher_schedule()).await;
    assert_eq!(outcome, PollOutcome::TimedOut);

    let late = ledger.settle_paid(PAYMENT, "FT-LATE").await.unwrap();

    assert!(late.is_none());
    assert_eq!(ledger.current().status, PaymentStatus::Failed);
}

#[tokio::test(start_paused = true)]
async fn test_client_gives_up_at_its_own_deadline() {
    let ledger = MemoryLedger::pending();
    let mut page = StatusPage {
        ledger: &ledger,
        refreshes: 0,
    };

    let outcome = poll_until_settled(
        &mut page,
        PollSchedule::new(Duration::from_secs(3), Duration::from_secs(10)),
    )
    .await;

    assert_eq!(outcome, PollOutcome::TimedOut);
    assert_eq!(ledger.current().status, PaymentStatus::Pending);
    assert_eq!(page.refreshes, 4);
}
