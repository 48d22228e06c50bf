//! Staff and weekly shift repository.

use chrono::NaiveTime;
use serde::Deserialize;
use sqlx::PgPool;

use barberly_core::{PhoneNumber, SalonId, StaffId};

use super::{RepositoryError, map_write_error};
use crate::models::{Staff, StaffShift};

const STAFF_COLUMNS: &str = "id, salon_id, name, phone, title, is_active, created_at, updated_at";

/// Editable staff fields.
#[derive(Debug, Clone, Deserialize)]
pub struct StaffInput {
    pub name: String,
    pub phone: Option<PhoneNumber>,
    pub title: Option<String>,
}

/// One entry of a weekly schedule replacement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ShiftInput {
    /// 0 = Monday .. 6 = Sunday.
    pub weekday: i16,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

/// Repository for staff members.
pub struct StaffRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> StaffRepository<'a> {
    /// Create a new staff repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List a salon's staff.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        salon: SalonId,
        include_inactive: bool,
    ) -> Result<Vec<Staff>, RepositoryError> {
        let staff = sqlx::query_as::<_, Staff>(&format!(
            "SELECT {STAFF_COLUMNS} FROM staff
             WHERE salon_id = $1 AND (is_active OR $2)
             ORDER BY id"
        ))
        .bind(salon)
        .bind(include_inactive)
        .fetch_all(self.pool)
        .await?;
        Ok(staff)
    }

    /// Get a staff member by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: StaffId) -> Result<Option<Staff>, RepositoryError> {
        let staff = sqlx::query_as::<_, Staff>(&format!(
            "SELECT {STAFF_COLUMNS} FROM staff WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        Ok(staff)
    }

    /// Add a staff member to a salon.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the salon does not exist.
    pub async fn create(&self, salon: SalonId, input: &StaffInput) -> Result<Staff, RepositoryError> {
        sqlx::query_as::<_, Staff>(&format!(
            "INSERT INTO staff (salon_id, name, phone, title)
             VALUES ($1, $2, $3, $4)
             RETURNING {STAFF_COLUMNS}"
        ))
        .bind(salon)
        .bind(input.name.trim())
        .bind(&input.phone)
        .bind(&input.title)
        .fetch_one(self.pool)
        .await
        .map_err(|e| map_write_error(e, "staff member already exists"))
    }

    /// Replace a staff member's editable fields.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the staff member does not exist.
    pub async fn update(&self, id: StaffId, input: &StaffInput) -> Result<Staff, RepositoryError> {
        sqlx::query_as::<_, Staff>(&format!(
            "UPDATE staff SET name = $2, phone = $3, title = $4, updated_at = now()
             WHERE id = $1
             RETURNING {STAFF_COLUMNS}"
        ))
        .bind(id)
        .bind(input.name.trim())
        .bind(&input.phone)
        .bind(&input.title)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)
    }

    /// Stop offering a staff member for new bookings.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the staff member does not exist.
    pub async fn deactivate(&self, id: StaffId) -> Result<(), RepositoryError> {
        let result =
            sqlx::query("UPDATE staff SET is_active = FALSE, updated_at = now() WHERE id = $1")
                .bind(id)
                .execute(self.pool)
                .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Weekly shifts of the given staff members.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn shifts_for(&self, staff: &[StaffId]) -> Result<Vec<StaffShift>, RepositoryError> {
        let raw: Vec<i32> = staff.iter().map(StaffId::as_i32).collect();
        let shifts = sqlx::query_as::<_, StaffShift>(
            "SELECT id, staff_id, weekday, start_time, end_time
             FROM staff_shifts
             WHERE staff_id = ANY($1)
             ORDER BY staff_id, weekday, start_time",
        )
        .bind(&raw)
        .fetch_all(self.pool)
        .await?;
        Ok(shifts)
    }

    /// Replace a staff member's whole weekly schedule.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the staff member does not exist.
    pub async fn replace_shifts(
        &self,
        staff: StaffId,
        shifts: &[ShiftInput],
    ) -> Result<Vec<StaffShift>, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM staff_shifts WHERE staff_id = $1")
            .bind(staff)
            .execute(&mut *tx)
            .await?;

        let mut saved = Vec::with_capacity(shifts.len());
        for shift in shifts {
            let row = sqlx::query_as::<_, StaffShift>(
                "INSERT INTO staff_shifts (staff_id, weekday, start_time, end_time)
                 VALUES ($1, $2, $3, $4)
                 RETURNING id, staff_id, weekday, start_time, end_time",
            )
            .bind(staff)
            .bind(shift.weekday)
            .bind(shift.start_time)
            .bind(shift.end_time)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| map_write_error(e, "duplicate shift"))?;
            saved.push(row);
        }

        tx.commit().await?;
        Ok(saved)
    }
}
