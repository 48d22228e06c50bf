//! Salon repository.

use chrono::NaiveTime;
use serde::Deserialize;
use sqlx::PgPool;

use barberly_core::{PhoneNumber, SalonId, UserId};

use super::{RepositoryError, map_write_error};
use crate::models::Salon;

const SALON_COLUMNS: &str = "id, owner_id, name, address, phone, description, open_time, \
     close_time, slot_minutes, utc_offset_minutes, is_active, created_at, updated_at";

/// Editable salon fields.
#[derive(Debug, Clone, Deserialize)]
pub struct SalonInput {
    pub name: String,
    #[serde(default)]
    pub address: String,
    pub phone: Option<PhoneNumber>,
    pub description: Option<String>,
    pub open_time: NaiveTime,
    pub close_time: NaiveTime,
    #[serde(default = "default_slot_minutes")]
    pub slot_minutes: i32,
    #[serde(default = "default_utc_offset_minutes")]
    pub utc_offset_minutes: i32,
}

const fn default_slot_minutes() -> i32 {
    30
}

const fn default_utc_offset_minutes() -> i32 {
    7 * 60
}

/// Repository for salons.
pub struct SalonRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> SalonRepository<'a> {
    /// Create a new salon repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List active salons, optionally filtered by a case-insensitive name/address search.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_active(
        &self,
        search: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Salon>, RepositoryError> {
        let pattern = search
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(|q| format!("%{}%", escape_like(q)));

        let salons = sqlx::query_as::<_, Salon>(&format!(
            "SELECT {SALON_COLUMNS} FROM salons
             WHERE is_active
               AND ($1::text IS NULL OR name ILIKE $1 OR address ILIKE $1)
             ORDER BY name, id
             LIMIT $2 OFFSET $3"
        ))
        .bind(pattern)
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool)
        .await?;
        Ok(salons)
    }

    /// List salons owned by `owner`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_owned(&self, owner: UserId) -> Result<Vec<Salon>, RepositoryError> {
        let salons = sqlx::query_as::<_, Salon>(&format!(
            "SELECT {SALON_COLUMNS} FROM salons WHERE owner_id = $1 ORDER BY id"
        ))
        .bind(owner)
        .fetch_all(self.pool)
        .await?;
        Ok(salons)
    }

    /// Get a salon by ID, active or not.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: SalonId) -> Result<Option<Salon>, RepositoryError> {
        let salon = sqlx::query_as::<_, Salon>(&format!(
            "SELECT {SALON_COLUMNS} FROM salons WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        Ok(salon)
    }

    /// Create a salon.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the owner does not exist.
    pub async fn create(&self, owner: UserId, input: &SalonInput) -> Result<Salon, RepositoryError> {
        sqlx::query_as::<_, Salon>(&format!(
            "INSERT INTO salons (owner_id, name, address, phone, description, open_time,
                                 close_time, slot_minutes, utc_offset_minutes)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             RETURNING {SALON_COLUMNS}"
        ))
        .bind(owner)
        .bind(input.name.trim())
        .bind(input.address.trim())
        .bind(&input.phone)
        .bind(&input.description)
        .bind(input.open_time)
        .bind(input.close_time)
        .bind(input.slot_minutes)
        .bind(input.utc_offset_minutes)
        .fetch_one(self.pool)
        .await
        .map_err(|e| map_write_error(e, "salon already exists"))
    }

    /// Replace a salon's editable fields.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the salon does not exist.
    pub async fn update(&self, id: SalonId, input: &SalonInput) -> Result<Salon, RepositoryError> {
        sqlx::query_as::<_, Salon>(&format!(
            "UPDATE salons
             SET name = $2, address = $3, phone = $4, description = $5, open_time = $6,
                 close_time = $7, slot_minutes = $8, utc_offset_minutes = $9, updated_at = now()
             WHERE id = $1
             RETURNING {SALON_COLUMNS}"
        ))
        .bind(id)
        .bind(input.name.trim())
        .bind(input.address.trim())
        .bind(&input.phone)
        .bind(&input.description)
        .bind(input.open_time)
        .bind(input.close_time)
        .bind(input.slot_minutes)
        .bind(input.utc_offset_minutes)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)
    }

    /// Hide a salon from listings and stop accepting bookings.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the salon does not exist.
    pub async fn deactivate(&self, id: SalonId) -> Result<(), RepositoryError> {
        let result =
            sqlx::query("UPDATE salons SET is_active = FALSE, updated_at = now() WHERE id = $1")
                .bind(id)
                .execute(self.pool)
                .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Count active salons.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn count_active(&self) -> Result<i64, RepositoryError> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM salons WHERE is_active")
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }
}

/// Escape `LIKE` wildcards in user search input.
fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("cắt tóc"), "cắt tóc");
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
    }

    #[test]
    fn test_salon_input_defaults() {
        let input: SalonInput = serde_json::from_str(
            r#"{"name":"Barber 1975","open_time":"09:00:00","close_time":"20:00:00"}"#,
        )
        .unwrap();
        assert_eq!(input.slot_minutes, 30);
        assert_eq!(input.utc_offset_minutes, 420);
        assert!(input.address.is_empty());
        assert!(input.phone.is_none());
    }
}
