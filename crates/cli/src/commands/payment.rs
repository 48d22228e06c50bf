//! Follow a payment from the terminal.
//!
//! Polls `GET {base_url}/payments/{id}` with the same confirmation loop the server's
//! watchers use and logs the countdown on every probe.

use std::time::Duration;

use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;
use url::Url;

use barberly_core::PaymentStatus;
use barberly_server::services::payment::poll::{
    PaymentProbe, PollOutcome, PollSchedule, poll_until_settled,
};

/// The fields of `GET /payments/{id}` the watch needs.
#[derive(Debug, Deserialize)]
struct StatusResponse {
    status: PaymentStatus,
    seconds_remaining: i64,
    #[serde(default)]
    failure_reason: Option<String>,
}

/// Errors from one status request.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("status endpoint answered {0}")]
    Status(StatusCode),
}

/// Probe that asks the API for the payment's status.
pub struct HttpProbe {
    client: reqwest::Client,
    url: Url,
}

impl HttpProbe {
    /// Build a probe for `payment_id` under `base_url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the status URL cannot be built.
    pub fn new(base_url: &Url, payment_id: i32) -> Result<Self, url::ParseError> {
        Ok(Self {
            client: reqwest::Client::new(),
            url: status_url(base_url, payment_id)?,
        })
    }
}

fn status_url(base_url: &Url, payment_id: i32) -> Result<Url, url::ParseError> {
    let mut base = base_url.clone();
    if !base.path().ends_with('/') {
        base.set_path(&format!("{}/", base.path()));
    }
    base.join(&format!("payments/{payment_id}"))
}

impl PaymentProbe for HttpProbe {
    type Error = ProbeError;

    async fn probe(&mut self) -> Result<PaymentStatus, ProbeError> {
        let response = self.client.get(self.url.clone()).send().await?;
        if !response.status().is_success() {
            return Err(ProbeError::Status(response.status()));
        }
        let body: StatusResponse = response.json().await?;
        match (&body.status, &body.failure_reason) {
            (PaymentStatus::Failed, Some(reason)) => {
                tracing::info!("Payment failed: {reason}");
            }
            (PaymentStatus::Pending, _) => tracing::info!(
                "Waiting for transfer... {}:{:02} left",
                body.seconds_remaining / 60,
                body.seconds_remaining % 60
            ),
            _ => {}
        }
        Ok(body.status)
    }
}

/// Poll until the payment settles or `timeout` elapses.
///
/// # Errors
///
/// Returns an error if the status URL is invalid or the payment failed. Individual
/// request errors are logged and retried.
pub async fn watch(
    base_url: &Url,
    payment_id: i32,
    interval: Duration,
    timeout: Duration,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut probe = HttpProbe::new(base_url, payment_id)?;
    tracing::info!(url = %probe.url, "Watching payment");

    match poll_until_settled(&mut probe, PollSchedule::new(interval, timeout)).await {
        PollOutcome::Settled(PaymentStatus::Paid) => {
            tracing::info!("Payment {payment_id} received");
            Ok(())
        }
        PollOutcome::Settled(status) => Err(format!("payment {payment_id} is {status:?}").into()),
        PollOutcome::TimedOut => {
            tracing::warn!("Stopped watching payment {payment_id}: still pending");
            Ok(())
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_status_url_keeps_base_path() {
        let base = Url::parse("https://api.barberly.vn/v1").unwrap();
        assert_eq!(
            status_url(&base, 42).unwrap().as_str(),
            "https://api.barberly.vn/v1/payments/42"
        );

        let root = Url::parse("http://localhost:8080").unwrap();
        assert_eq!(
            status_url(&root, 7).unwrap().as_str(),
            "http://localhost:8080/payments/7"
        );
    }

    #[test]
    fn test_status_response_parses_payment_view() {
        let body = r#"{
            "id": 42, "booking_id": 3, "method": "VIETQR", "status": "FAILED",
            "amount": "150000", "expires_at": "2026-10-20T02:35:00Z",
            "seconds_remaining": 0, "paid_at": null, "failure_reason": "timed out"
        }"#;
        let parsed: StatusResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.status, PaymentStatus::Failed);
        assert_eq!(parsed.failure_reason.as_deref(), Some("timed out"));
    }
}
