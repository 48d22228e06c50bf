//! Service catalogue repository.

use serde::Deserialize;
use sqlx::PgPool;

use barberly_core::{Price, SalonId, ServiceId};

use super::{RepositoryError, map_write_error};
use crate::models::Service;

const SERVICE_COLUMNS: &str =
    "id, salon_id, name, description, price, duration_minutes, is_active, created_at, updated_at";

/// Editable service fields.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceInput {
    pub name: String,
    pub description: Option<String>,
    pub price: Price,
    pub duration_minutes: i32,
}

/// Repository for salon services.
pub struct ServiceRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ServiceRepository<'a> {
    /// Create a new service repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List a salon's services.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        salon: SalonId,
        include_inactive: bool,
    ) -> Result<Vec<Service>, RepositoryError> {
        let services = sqlx::query_as::<_, Service>(&format!(
            "SELECT {SERVICE_COLUMNS} FROM services
             WHERE salon_id = $1 AND (is_active OR $2)
             ORDER BY name, id"
        ))
        .bind(salon)
        .bind(include_inactive)
        .fetch_all(self.pool)
        .await?;
        Ok(services)
    }

    /// Get a service by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: ServiceId) -> Result<Option<Service>, RepositoryError> {
        let service = sqlx::query_as::<_, Service>(&format!(
            "SELECT {SERVICE_COLUMNS} FROM services WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        Ok(service)
    }

    /// Fetch the given services, keeping only those that belong to `salon`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_many(
        &self,
        salon: SalonId,
        ids: &[ServiceId],
    ) -> Result<Vec<Service>, RepositoryError> {
        let raw: Vec<i32> = ids.iter().map(ServiceId::as_i32).collect();
        let services = sqlx::query_as::<_, Service>(&format!(
            "SELECT {SERVICE_COLUMNS} FROM services
             WHERE salon_id = $1 AND id = ANY($2)
             ORDER BY id"
        ))
        .bind(salon)
        .bind(&raw)
        .fetch_all(self.pool)
        .await?;
        Ok(services)
    }

    /// Create a service.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the salon does not exist.
    pub async fn create(
        &self,
        salon: SalonId,
        input: &ServiceInput,
    ) -> Result<Service, RepositoryError> {
        sqlx::query_as::<_, Service>(&format!(
            "INSERT INTO services (salon_id, name, description, price, duration_minutes)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {SERVICE_COLUMNS}"
        ))
        .bind(salon)
        .bind(input.name.trim())
        .bind(&input.description)
        .bind(input.price)
        .bind(input.duration_minutes)
        .fetch_one(self.pool)
        .await
        .map_err(|e| map_write_error(e, "service already exists"))
    }

    /// Replace a service's editable fields.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the service does not exist.
    pub async fn update(
        &self,
        id: ServiceId,
        input: &ServiceInput,
    ) -> Result<Service, RepositoryError> {
        sqlx::query_as::<_, Service>(&format!(
            "UPDATE services
             SET name = $2, description = $3, price = $4, duration_minutes = $5, updated_at = now()
             WHERE id = $1
             RETURNING {SERVICE_COLUMNS}"
        ))
        .bind(id)
        .bind(input.name.trim())
        .bind(&input.description)
        .bind(input.price)
        .bind(input.duration_minutes)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)
    }

    /// Stop offering a service. Existing bookings keep their line items.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the service does not exist.
    pub async fn deactivate(&self, id: ServiceId) -> Result<(), RepositoryError> {
        let result =
            sqlx::query("UPDATE services SET is_active = FALSE, updated_at = now() WHERE id = $1")
                .bind(id)
                .execute(self.pool)
                .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
