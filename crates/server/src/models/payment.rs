//! Payment domain types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use barberly_core::{BookingId, PaymentId, PaymentMethod, PaymentStatus, Price};

/// A payment attempt for a booking.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Payment {
    pub id: PaymentId,
    pub booking_id: BookingId,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    pub amount: Price,
    /// Random code the payer copies into the transfer content.
    pub reference: String,
    pub transfer_content: String,
    pub bank_transaction_id: Option<String>,
    pub failure_reason: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    /// Whole seconds left before the confirmation window closes, zero once expired
    /// or settled.
    #[must_use]
    pub fn seconds_remaining(&self, now: DateTime<Utc>) -> i64 {
        if self.status.is_settled() {
            return 0;
        }
        (self.expires_at - now).num_seconds().max(0)
    }

    /// Whether the payment is still pending after its window closed.
    #[must_use]
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.status == PaymentStatus::Pending && now >= self.expires_at
    }

    /// Public view without the transfer reference.
    #[must_use]
    pub fn view(&self, now: DateTime<Utc>) -> PaymentView {
        PaymentView {
            id: self.id,
            booking_id: self.booking_id,
            method: self.method,
            status: self.status,
            amount: self.amount,
            expires_at: self.expires_at,
            seconds_remaining: self.seconds_remaining(now),
            paid_at: self.paid_at,
            failure_reason: self.failure_reason.clone(),
        }
    }
}

/// Payment status as exposed to anyone holding the payment id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentView {
    pub id: PaymentId,
    pub booking_id: BookingId,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    pub amount: Price,
    pub expires_at: DateTime<Utc>,
    pub seconds_remaining: i64,
    pub paid_at: Option<DateTime<Utc>>,
    pub failure_reason: Option<String>,
}

/// Everything a client needs to render a VietQR transfer screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QrPaymentDescriptor {
    pub payment_id: PaymentId,
    pub bank_bin: String,
    pub bank_code: String,
    pub account_number: String,
    pub account_name: String,
    pub amount: Price,
    /// Text the payer must put in the transfer content.
    pub transfer_content: String,
    /// EMVCo payload to render as a QR code.
    pub qr_payload: String,
    /// Pre-rendered QR image.
    pub qr_image_url: String,
    pub expires_at: DateTime<Utc>,
    pub seconds_remaining: i64,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn payment(status: PaymentStatus, expires_at: DateTime<Utc>) -> Payment {
        Payment {
            id: PaymentId::new(1),
            booking_id: BookingId::new(7),
            method: PaymentMethod::VietQr,
            status,
            amount: Price::from_dong(150_000),
            reference: "K7Q2M9XA".to_owned(),
            transfer_content: "BARBERLY K7Q2M9XA".to_owned(),
            bank_transaction_id: None,
            failure_reason: None,
            expires_at,
            paid_at: None,
            created_at: expires_at - Duration::minutes(5),
            updated_at: expires_at - Duration::minutes(5),
        }
    }

    #[test]
    fn test_countdown() {
        let now = Utc::now();
        let p = payment(PaymentStatus::Pending, now + Duration::seconds(90));
        assert_eq!(p.seconds_remaining(now), 90);
        assert!(!p.is_overdue(now));

        let later = now + Duration::seconds(120);
        assert_eq!(p.seconds_remaining(later), 0);
        assert!(p.is_overdue(later));
    }

    #[test]
    fn test_settled_has_no_countdown() {
        let now = Utc::now();
        let p = payment(PaymentStatus::Paid, now + Duration::seconds(90));
        assert_eq!(p.seconds_remaining(now), 0);
        assert!(!p.is_overdue(now + Duration::hours(1)));
    }

    #[test]
    fn test_view_hides_reference() {
        let now = Utc::now();
        let view = payment(PaymentStatus::Pending, now + Duration::seconds(30)).view(now);
        let json = serde_json::to_string(&view).unwrap();
        assert!(!json.contains("K7Q2M9XA"));
        assert!(json.contains("\"status\":\"PENDING\""));
    }
}
