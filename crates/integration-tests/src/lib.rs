//! Integration tests for Barberly.
//!
//! # Running Tests
//!
//! ```bash
//! # Scheduling, QR and payment-poll tests run without external services
//! cargo test -p barberly-integration-tests
//!
//! # HTTP tests need a migrated database and a running server
//! cargo run -p barberly-cli -- migrate
//! cargo run -p barberly-server &
//! cargo test -p barberly-integration-tests -- --ignored
//! ```
//!
//! # Test Files
//!
//! - `slot_generation` - Availability grids across hours, shifts and bookings
//! - `booking_overlap` - Double-booking rejection and staff assignment
//! - `vietqr_payload` - QR payload layout and checksum
//! - `payment_polling` - Pending payments settling or timing out
//! - `booking_cancellation` - Cancelling a booking fails its open payment

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use barberly_server::config::DEFAULT_PORT;

/// Base URL of a running server (configurable via environment).
///
/// Defaults to the port the server listens on when `SERVER_PORT` is unset.
#[must_use]
pub fn server_base_url() -> String {
    std::env::var("BARBERLY_BASE_URL").unwrap_or_else(|_| default_base_url())
}

fn default_base_url() -> String {
    format!("http://localhost:{DEFAULT_PORT}")
}

/// A fixed Tuesday used as the reference day.
///
/// # Panics
///
/// Never; the date is a valid constant.
#[must_use]
#[allow(clippy::expect_used)]
pub fn tuesday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 20).expect("valid date")
}

/// Wall-clock time of day.
///
/// # Panics
///
/// Panics if `h:m` is not a valid time.
#[must_use]
#[allow(clippy::expect_used)]
pub fn time(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).expect("valid time")
}

/// `h:m` on [`tuesday`].
///
/// # Panics
///
/// Panics if `h:m` is not a valid time.
#[must_use]
pub fn at(h: u32, m: u32) -> NaiveDateTime {
    tuesday().and_time(time(h, m))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_base_url_targets_server_default_port() {
        assert_eq!(default_base_url(), "http://localhost:8080");
    }
}
