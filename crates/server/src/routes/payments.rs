//! Payment status and bank webhook handlers.

use axum::{
    Json,
    body::Bytes,
    extract::{Path, State},
    http::HeaderMap,
};
use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use barberly_core::PaymentId;

use crate::bank::{BankTransfer, WebhookError, verify_webhook};
use crate::error::AppError;
use crate::models::PaymentView;
use crate::services::payment::PaymentService;
use crate::state::AppState;

/// Unix timestamp the sender signed with.
pub const TIMESTAMP_HEADER: &str = "x-barberly-timestamp";

/// `v1=<hex hmac>` over `v1:{timestamp}:{body}`.
pub const SIGNATURE_HEADER: &str = "x-barberly-signature";

/// Webhook acknowledgement.
#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    pub matched: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_id: Option<PaymentId>,
}

fn signature_headers(headers: &HeaderMap) -> Result<(&str, &str), WebhookError> {
    let get = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());
    match (get(TIMESTAMP_HEADER), get(SIGNATURE_HEADER)) {
        (Some(ts), Some(sig)) => Ok((ts, sig)),
        _ => Err(WebhookError::MissingHeaders),
    }
}

/// GET /payments/{id}
///
/// Exposes status, amount and countdown only; the transfer reference stays with the
/// payer's QR screen. An overdue pending payment is failed by this read.
///
/// # Errors
///
/// Returns `404` for unknown payments.
pub async fn show(
    State(state): State<AppState>,
    Path(id): Path<PaymentId>,
) -> Result<Json<PaymentView>, AppError> {
    let payment = PaymentService::new(state.pool(), &state.config().payment)
        .status(id)
        .await?;
    Ok(Json(payment.view(Utc::now())))
}

/// POST /payments/webhook
///
/// Unmatched transfers are acknowledged with `matched: false` so the bank does not
/// retry them forever.
///
/// # Errors
///
/// Returns `404` when no webhook secret is configured, `401` for a bad signature and
/// `400` for a body that is not a transfer.
pub async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookResponse>, AppError> {
    let Some(secret) = state.config().webhook_secret.as_ref() else {
        return Err(AppError::NotFound("webhook not configured".to_string()));
    };

    let (timestamp, signature) = signature_headers(&headers)?;
    if let Err(err) = verify_webhook(secret, timestamp, signature, &body, Utc::now()) {
        warn!(error = %err, "Rejected bank webhook");
        return Err(err.into());
    }

    let transfer: BankTransfer = serde_json::from_slice(&body)
        .map_err(|e| AppError::BadRequest(format!("invalid transfer: {e}")))?;
    info!(transaction_id = %transfer.id, amount = transfer.amount, "Bank webhook received");

    let settled = PaymentService::new(state.pool(), &state.config().payment)
        .apply_transfer(&transfer)
        .await?;
    Ok(Json(WebhookResponse {
        matched: settled.is_some(),
        payment_id: settled.map(|p| p.id),
    }))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn test_signature_headers_present() {
        let mut headers = HeaderMap::new();
        headers.insert(TIMESTAMP_HEADER, HeaderValue::from_static("1790000000"));
        headers.insert(SIGNATURE_HEADER, HeaderValue::from_static("v1=abcd"));
        assert_eq!(
            signature_headers(&headers).unwrap(),
            ("1790000000", "v1=abcd")
        );
    }

    #[test]
    fn test_signature_headers_missing() {
        let mut headers = HeaderMap::new();
        headers.insert(SIGNATURE_HEADER, HeaderValue::from_static("v1=abcd"));
        assert_eq!(
            signature_headers(&headers).unwrap_err(),
            WebhookError::MissingHeaders
        );
    }
}
