//! User domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use barberly_core::{PhoneNumber, UserId, UserRole};

/// A registered user.
///
/// The password hash is never loaded into this type; see
/// [`UserRepository::get_password_hash`](crate::db::users::UserRepository::get_password_hash).
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct User {
    /// Unique user ID.
    pub id: UserId,
    /// Login phone number.
    pub phone: PhoneNumber,
    /// Display name.
    pub name: String,
    /// Optional contact email.
    pub email: Option<String>,
    /// Permission level.
    pub role: UserRole,
    /// When the user registered.
    pub created_at: DateTime<Utc>,
    /// When the user was last updated.
    pub updated_at: DateTime<Utc>,
}
