//! Incoming bank transfers.
//!
//! Two ways a transfer reaches the platform:
//!
//! - **Feed**: [`BankFeedClient`] polls an HTTP endpoint listing recent incoming
//!   transfers for the receiving account. Responses are cached for a few seconds so
//!   every payment watcher shares one upstream request per cache window.
//! - **Webhook**: the bank (or an aggregator) posts a [`BankTransfer`] to
//!   `/payments/webhook`, signed with [`verify_webhook`].

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use moka::future::Cache;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;
use tracing::{debug, instrument};
use url::Url;

use barberly_core::vietqr::content_matches;

use crate::config::BankFeedConfig;

/// How long a feed response is reused.
const FEED_CACHE_TTL: Duration = Duration::from_secs(3);

/// Number of transfers requested from the feed.
const FEED_PAGE_SIZE: u32 = 50;

/// Accepted clock skew for webhook timestamps, in seconds.
pub const WEBHOOK_TOLERANCE_SECS: i64 = 300;

type HmacSha256 = Hmac<Sha256>;

/// An incoming transfer to the salon account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankTransfer {
    /// Bank-side transaction id.
    pub id: String,
    /// Amount in dong.
    pub amount: i64,
    /// Free-text transfer content typed by the payer.
    pub content: String,
    #[serde(default)]
    pub received_at: Option<DateTime<Utc>>,
}

impl BankTransfer {
    /// Whether this transfer pays `amount` for `reference`.
    #[must_use]
    pub fn pays(&self, reference: &str, amount: i64) -> bool {
        self.amount >= amount && content_matches(&self.content, reference)
    }
}

/// Pick the first transfer that pays `amount` for `reference`.
#[must_use]
pub fn select_transfer<'a>(
    transfers: &'a [BankTransfer],
    reference: &str,
    amount: i64,
) -> Option<&'a BankTransfer> {
    transfers.iter().find(|t| t.pays(reference, amount))
}

#[derive(Debug, Deserialize)]
struct FeedResponse {
    transactions: Vec<BankTransfer>,
}

/// Errors from the transfer feed.
#[derive(Debug, Error)]
pub enum BankFeedError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The feed answered with a non-success status.
    #[error("feed returned HTTP {0}")]
    Status(reqwest::StatusCode),

    /// The feed body was not the expected JSON.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// A failed fetch reported to every caller waiting on it.
    #[error("{0}")]
    Shared(Arc<BankFeedError>),
}

/// Client for the bank transfer feed.
#[derive(Clone)]
pub struct BankFeedClient {
    inner: Arc<BankFeedClientInner>,
}

struct BankFeedClientInner {
    client: reqwest::Client,
    url: Url,
    token: SecretString,
    account_number: String,
    cache: Cache<String, Arc<Vec<BankTransfer>>>,
}

impl BankFeedClient {
    /// Create a feed client for the receiving account.
    #[must_use]
    pub fn new(config: &BankFeedConfig, account_number: &str) -> Self {
        let cache = Cache::builder()
            .max_capacity(16)
            .time_to_live(FEED_CACHE_TTL)
            .build();

        Self {
            inner: Arc::new(BankFeedClientInner {
                client: reqwest::Client::new(),
                url: config.url.clone(),
                token: config.token.clone(),
                account_number: account_number.to_owned(),
                cache,
            }),
        }
    }

    /// Recent incoming transfers, newest first as the feed returns them.
    ///
    /// # Errors
    ///
    /// Returns `BankFeedError` if the request fails or the body cannot be parsed.
    pub async fn recent_transfers(&self) -> Result<Arc<Vec<BankTransfer>>, BankFeedError> {
        let key = self.inner.account_number.clone();
        self.inner
            .cache
            .try_get_with(key, self.fetch())
            .await
            .map_err(BankFeedError::Shared)
    }

    #[instrument(skip(self), fields(account = %self.inner.account_number))]
    async fn fetch(&self) -> Result<Arc<Vec<BankTransfer>>, BankFeedError> {
        let limit = FEED_PAGE_SIZE.to_string();
        let response = self
            .inner
            .client
            .get(self.inner.url.clone())
            .query(&[
                ("account_number", self.inner.account_number.as_str()),
                ("limit", limit.as_str()),
            ])
            .bearer_auth(self.inner.token.expose_secret())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(status = %status, "Bank feed returned non-success status");
            return Err(BankFeedError::Status(status));
        }

        let body = response.text().await?;
        let feed: FeedResponse = serde_json::from_str(&body)?;
        debug!(count = feed.transactions.len(), "Fetched bank transfers");
        Ok(Arc::new(feed.transactions))
    }

    /// Find a transfer paying `amount` for `reference`.
    ///
    /// # Errors
    ///
    /// Returns `BankFeedError` if the feed cannot be read.
    pub async fn find_transfer(
        &self,
        reference: &str,
        amount: i64,
    ) -> Result<Option<BankTransfer>, BankFeedError> {
        let transfers = self.recent_transfers().await?;
        Ok(select_transfer(&transfers, reference, amount).cloned())
    }
}

/// Webhook signature failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WebhookError {
    #[error("missing signature headers")]
    MissingHeaders,

    #[error("invalid timestamp")]
    InvalidTimestamp,

    #[error("timestamp outside the accepted window")]
    Stale,

    #[error("signature mismatch")]
    BadSignature,
}

/// Signature for a webhook body: `v1=` followed by hex HMAC-SHA256 of
/// `v1:{timestamp}:{body}`.
///
/// # Errors
///
/// Returns `WebhookError::BadSignature` if the secret cannot key the MAC.
pub fn sign_webhook(
    secret: &SecretString,
    timestamp: i64,
    body: &[u8],
) -> Result<String, WebhookError> {
    let mac = webhook_mac(secret, timestamp, body)?;
    Ok(format!("v1={}", hex::encode(mac.finalize().into_bytes())))
}

fn webhook_mac(
    secret: &SecretString,
    timestamp: i64,
    body: &[u8],
) -> Result<HmacSha256, WebhookError> {
    let mut mac = HmacSha256::new_from_slice(secret.expose_secret().as_bytes())
        .map_err(|_| WebhookError::BadSignature)?;
    mac.update(format!("v1:{timestamp}:").as_bytes());
    mac.update(body);
    Ok(mac)
}

/// Check a webhook signature and its timestamp against `now`.
///
/// # Errors
///
/// Returns `WebhookError` describing why the request is rejected.
pub fn verify_webhook(
    secret: &SecretString,
    timestamp: &str,
    signature: &str,
    body: &[u8],
    now: DateTime<Utc>,
) -> Result<(), WebhookError> {
    let ts: i64 = timestamp
        .trim()
        .parse()
        .map_err(|_| WebhookError::InvalidTimestamp)?;

    let skew = now
        .timestamp()
        .checked_sub(ts)
        .map(i64::unsigned_abs)
        .ok_or(WebhookError::Stale)?;
    if skew > WEBHOOK_TOLERANCE_SECS.unsigned_abs() {
        return Err(WebhookError::Stale);
    }

    let provided = signature
        .trim()
        .strip_prefix("v1=")
        .and_then(|h| hex::decode(h).ok())
        .ok_or(WebhookError::BadSignature)?;

    webhook_mac(secret, ts, body)?
        .verify_slice(&provided)
        .map_err(|_| WebhookError::BadSignature)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn secret() -> SecretString {
        SecretString::from("whsec-test-secret")
    }

    fn transfer(id: &str, amount: i64, content: &str) -> BankTransfer {
        BankTransfer {
            id: id.to_owned(),
            amount,
            content: content.to_owned(),
            received_at: None,
        }
    }

    #[test]
    fn test_select_transfer_requires_reference_and_amount() {
        let transfers = vec![
            transfer("T1", 150_000, "BARBERLY ZZZZ1111"),
            transfer("T2", 100_000, "BARBERLY K7Q2M9XA"),
            transfer("T3", 150_000, "MBVCB.123.barberly k7q2-m9xa.CT tu 0011"),
        ];
        let found = select_transfer(&transfers, "K7Q2M9XA", 150_000).unwrap();
        assert_eq!(found.id, "T3");
        assert!(select_transfer(&transfers, "NOPE0000", 1).is_none());
    }

    #[test]
    fn test_overpayment_is_accepted() {
        let t = transfer("T1", 200_000, "BARBERLY K7Q2M9XA");
        assert!(t.pays("K7Q2M9XA", 150_000));
    }

    #[test]
    fn test_feed_response_parses() {
        let json = r#"{"transactions":[{"id":"FT1","amount":150000,"content":"BARBERLY K7Q2M9XA","received_at":"2026-10-20T02:30:00Z"},{"id":"FT2","amount":5000,"content":"x"}]}"#;
        let feed: FeedResponse = serde_json::from_str(json).unwrap();
        assert_eq!(feed.transactions.len(), 2);
        assert!(feed.transactions[0].received_at.is_some());
        assert!(feed.transactions[1].received_at.is_none());
    }

    #[test]
    fn test_webhook_signature_roundtrip() {
        let now = Utc::now();
        let ts = now.timestamp();
        let body = br#"{"id":"FT1","amount":150000,"content":"BARBERLY K7Q2M9XA"}"#;
        let sig = sign_webhook(&secret(), ts, body).unwrap();
        assert!(sig.starts_with("v1="));
        assert_eq!(
            verify_webhook(&secret(), &ts.to_string(), &sig, body, now),
            Ok(())
        );
    }

    #[test]
    fn test_webhook_rejects_tampered_body() {
        let now = Utc::now();
        let ts = now.timestamp();
        let sig = sign_webhook(&secret(), ts, b"amount=150000").unwrap();
        assert_eq!(
            verify_webhook(&secret(), &ts.to_string(), &sig, b"amount=999999", now),
            Err(WebhookError::BadSignature)
        );
        assert_eq!(
            verify_webhook(&secret(), &ts.to_string(), "v0=abcd", b"amount=150000", now),
            Err(WebhookError::BadSignature)
        );
    }

    #[test]
    fn test_webhook_rejects_extreme_timestamps() {
        let now = Utc::now();
        for ts in [i64::MIN, i64::MAX, i64::MIN + 1] {
            assert_eq!(
                verify_webhook(&secret(), &ts.to_string(), "v1=00", b"{}", now),
                Err(WebhookError::Stale),
                "timestamp {ts}"
            );
        }
    }

    #[test]
    fn test_webhook_rejects_stale_timestamp() {
        let now = Utc::now();
        let ts = now.timestamp() - WEBHOOK_TOLERANCE_SECS - 1;
        let sig = sign_webhook(&secret(), ts, b"{}").unwrap();
        assert_eq!(
            verify_webhook(&secret(), &ts.to_string(), &sig, b"{}", now),
            Err(WebhookError::Stale)
        );
        assert_eq!(
            verify_webhook(&secret(), "yesterday", &sig, b"{}", now),
            Err(WebhookError::InvalidTimestamp)
        );
    }
}
