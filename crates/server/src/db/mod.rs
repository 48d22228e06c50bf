//! Database operations for the booking platform.
//!
//! # Tables
//!
//! - `users` - Customers, salon owners and admins (password auth)
//! - `salons`, `services`, `staff`, `staff_shifts` - Salon catalogue
//! - `bookings`, `booking_services` - Reservations and their line items
//! - `payments` - VietQR and cash payments
//! - `notifications` - In-app messages
//! - `tower_sessions.session` - Session storage (created by the session store)
//!
//! Double-booking is prevented by the `bookings_no_overlap` exclusion constraint and a
//! booking can have at most one pending payment (`payments_one_pending_per_booking`).
//! Both surface here as [`RepositoryError::Conflict`].
//!
//! # Migrations
//!
//! Migrations are stored in `crates/server/migrations/`, embedded in [`MIGRATOR`], and run via:
//! ```bash
//! barberly migrate
//! # or
//! barberly-server --migrate
//! ```

pub mod bookings;
pub mod notifications;
pub mod payments;
pub mod salons;
pub mod services;
pub mod staff;
pub mod users;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

/// Embedded schema migrations.
pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// SQLSTATE raised when an exclusion constraint rejects a row.
const EXCLUSION_VIOLATION: &str = "23P01";

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database query failed.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in database is invalid or corrupted.
    #[error("data integrity error: {0}")]
    DataCorruption(String),

    /// Requested record was not found.
    #[error("record not found")]
    NotFound,

    /// A uniqueness or exclusion constraint rejected the write.
    #[error("conflict: {0}")]
    Conflict(String),

    /// A check constraint rejected a written value.
    #[error("invalid value")]
    Invalid,
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Run all pending migrations.
///
/// # Errors
///
/// Returns the migration error if any script fails.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    MIGRATOR.run(pool).await
}

/// Translate constraint violations on writes into [`RepositoryError::Conflict`].
///
/// Foreign key violations mean a referenced row is missing and become
/// [`RepositoryError::NotFound`]; check violations become [`RepositoryError::Invalid`].
pub(crate) fn map_write_error(e: sqlx::Error, conflict: &str) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = e {
        if db_err.is_unique_violation() || db_err.code().as_deref() == Some(EXCLUSION_VIOLATION) {
            return RepositoryError::Conflict(conflict.to_owned());
        }
        if db_err.is_foreign_key_violation() {
            return RepositoryError::NotFound;
        }
        if db_err.is_check_violation() {
            return RepositoryError::Invalid;
        }
    }
    RepositoryError::Database(e)
}

/// Clamp client-supplied paging to sane bounds.
#[must_use]
pub fn page(limit: Option<i64>, offset: Option<i64>) -> (i64, i64) {
    (limit.unwrap_or(50).clamp(1, 200), offset.unwrap_or(0).max(0))
}

#[cfg(test)]
mod tests {
    use std::borrow::Cow;
    use std::fmt;

    use sqlx::error::{DatabaseError, ErrorKind};

    use super::*;

    /// A server-side rejection carrying only a SQLSTATE.
    #[derive(Debug)]
    struct Rejected(&'static str);

    impl fmt::Display for Rejected {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "rejected with SQLSTATE {}", self.0)
        }
    }

    impl std::error::Error for Rejected {}

    impl DatabaseError for Rejected {
        fn message(&self) -> &str {
            "rejected"
        }

        fn code(&self) -> Option<Cow<'_, str>> {
            Some(Cow::Borrowed(self.0))
        }

        fn as_error(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn std::error::Error + Send + Sync + 'static> {
            self
        }

        fn kind(&self) -> ErrorKind {
            match self.0 {
                "23505" => ErrorKind::UniqueViolation,
                "23503" => ErrorKind::ForeignKeyViolation,
                "23514" => ErrorKind::CheckViolation,
                _ => ErrorKind::Other,
            }
        }
    }

    fn rejected(code: &'static str) -> sqlx::Error {
        sqlx::Error::Database(Box::new(Rejected(code)))
    }

    #[test]
    fn test_page_bounds() {
        assert_eq!(page(None, None), (50, 0));
        assert_eq!(page(Some(0), Some(-5)), (1, 0));
        assert_eq!(page(Some(1000), Some(20)), (200, 20));
    }

    #[test]
    fn test_non_database_errors_pass_through() {
        let err = map_write_error(sqlx::Error::RowNotFound, "taken");
        assert!(matches!(err, RepositoryError::Database(sqlx::Error::RowNotFound)));
    }

    #[test]
    fn test_constraint_violations_are_classified() {
        assert!(matches!(
            map_write_error(rejected("23505"), "taken"),
            RepositoryError::Conflict(msg) if msg == "taken"
        ));
        assert!(matches!(
            map_write_error(rejected(EXCLUSION_VIOLATION), "slot already booked"),
            RepositoryError::Conflict(_)
        ));
        assert!(matches!(
            map_write_error(rejected("23503"), "taken"),
            RepositoryError::NotFound
        ));
        assert!(matches!(
            map_write_error(rejected("23514"), "taken"),
            RepositoryError::Invalid
        ));
        assert!(matches!(
            map_write_error(rejected("40001"), "taken"),
            RepositoryError::Database(_)
        ));
    }
}
