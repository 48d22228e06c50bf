//! Salon catalogue management: salons, services, staff and weekly shifts.
//!
//! Reads are public. Writes require the salon's owner or an admin.

use sqlx::PgPool;
use tracing::{info, instrument};

use barberly_core::schedule::{DailyHours, ScheduleError};
use barberly_core::{SalonId, ServiceId, StaffId};

use crate::db::salons::{SalonInput, SalonRepository};
use crate::db::services::{ServiceInput, ServiceRepository};
use crate::db::staff::{ShiftInput, StaffInput, StaffRepository};
use crate::error::AppError;
use crate::models::salon::weekday_from_index;
use crate::models::{CurrentUser, Salon, Service, Staff, StaffShift};

const MAX_NAME_LENGTH: usize = 120;

/// Offsets a salon clock may use, in minutes (UTC-12:00 to UTC+14:00).
const UTC_OFFSET_RANGE: std::ops::RangeInclusive<i32> = -720..=840;

fn check_name(name: &str, what: &str) -> Result<(), AppError> {
    let len = name.trim().chars().count();
    if len == 0 || len > MAX_NAME_LENGTH {
        return Err(AppError::BadRequest(format!(
            "{what} name must be 1 to {MAX_NAME_LENGTH} characters"
        )));
    }
    Ok(())
}

/// Validate salon fields.
///
/// # Errors
///
/// Returns `AppError::BadRequest` describing the first invalid field.
pub fn validate_salon(input: &SalonInput) -> Result<(), AppError> {
    check_name(&input.name, "salon")?;
    DailyHours::new(input.open_time, input.close_time)?;
    if !(5..=240).contains(&input.slot_minutes) {
        return Err(AppError::BadRequest(
            "slot_minutes must be between 5 and 240".to_string(),
        ));
    }
    if !UTC_OFFSET_RANGE.contains(&input.utc_offset_minutes) {
        return Err(AppError::BadRequest(
            "utc_offset_minutes is out of range".to_string(),
        ));
    }
    Ok(())
}

/// Validate service fields.
///
/// # Errors
///
/// Returns `AppError::BadRequest` describing the first invalid field.
pub fn validate_service(input: &ServiceInput) -> Result<(), AppError> {
    check_name(&input.name, "service")?;
    if input.price.is_negative() {
        return Err(AppError::BadRequest("price cannot be negative".to_string()));
    }
    if !(1..=24 * 60).contains(&input.duration_minutes) {
        return Err(AppError::BadRequest(
            "duration_minutes must be between 1 and 1440".to_string(),
        ));
    }
    Ok(())
}

/// Validate a weekly schedule.
///
/// # Errors
///
/// Returns `AppError::BadRequest` for an unknown weekday, an empty window, or two
/// windows overlapping on the same day.
pub fn validate_shifts(shifts: &[ShiftInput]) -> Result<(), AppError> {
    for (i, shift) in shifts.iter().enumerate() {
        if weekday_from_index(shift.weekday).is_none() {
            return Err(AppError::BadRequest(
                "weekday must be 0 (Monday) to 6 (Sunday)".to_string(),
            ));
        }
        if shift.start_time >= shift.end_time {
            return Err(ScheduleError::EmptyInterval.into());
        }
        let overlaps = shifts[..i].iter().any(|other| {
            other.weekday == shift.weekday
                && other.start_time < shift.end_time
                && shift.start_time < other.end_time
        });
        if overlaps {
            return Err(AppError::BadRequest(
                "shifts on the same day overlap".to_string(),
            ));
        }
    }
    Ok(())
}

/// Catalogue service.
pub struct CatalogService<'a> {
    pool: &'a PgPool,
}

impl<'a> CatalogService<'a> {
    /// Create a new catalogue service.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Load a salon, hiding deactivated ones.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the salon does not exist or is inactive.
    pub async fn salon(&self, id: SalonId) -> Result<Salon, AppError> {
        SalonRepository::new(self.pool)
            .get(id)
            .await?
            .filter(|s| s.is_active)
            .ok_or_else(|| AppError::NotFound(format!("salon {id}")))
    }

    /// Load a salon `user` manages.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` or `AppError::Forbidden`.
    pub async fn managed_salon(&self, id: SalonId, user: &CurrentUser) -> Result<Salon, AppError> {
        let salon = self.salon(id).await?;
        if !salon.is_managed_by(user) {
            return Err(AppError::Forbidden("you do not manage this salon".to_string()));
        }
        Ok(salon)
    }

    /// Create a salon owned by `owner`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Forbidden` for customers and `AppError::BadRequest` for invalid input.
    #[instrument(skip(self, owner, input), fields(user_id = %owner.id))]
    pub async fn create_salon(&self, owner: &CurrentUser, input: &SalonInput) -> Result<Salon, AppError> {
        if !owner.role.can_manage_salons() {
            return Err(AppError::Forbidden(
                "only salon owners can create salons".to_string(),
            ));
        }
        validate_salon(input)?;
        let salon = SalonRepository::new(self.pool).create(owner.id, input).await?;
        info!(salon_id = %salon.id, "Salon created");
        Ok(salon)
    }

    /// Update a managed salon.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound`, `AppError::Forbidden` or `AppError::BadRequest`.
    pub async fn update_salon(
        &self,
        id: SalonId,
        user: &CurrentUser,
        input: &SalonInput,
    ) -> Result<Salon, AppError> {
        self.managed_salon(id, user).await?;
        validate_salon(input)?;
        Ok(SalonRepository::new(self.pool).update(id, input).await?)
    }

    /// Deactivate a managed salon.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` or `AppError::Forbidden`.
    #[instrument(skip(self, user), fields(salon_id = %id, user_id = %user.id))]
    pub async fn deactivate_salon(&self, id: SalonId, user: &CurrentUser) -> Result<(), AppError> {
        self.managed_salon(id, user).await?;
        SalonRepository::new(self.pool).deactivate(id).await?;
        info!("Salon deactivated");
        Ok(())
    }

    /// Add a service to a managed salon.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound`, `AppError::Forbidden` or `AppError::BadRequest`.
    pub async fn create_service(
        &self,
        salon: SalonId,
        user: &CurrentUser,
        input: &ServiceInput,
    ) -> Result<Service, AppError> {
        self.managed_salon(salon, user).await?;
        validate_service(input)?;
        Ok(ServiceRepository::new(self.pool).create(salon, input).await?)
    }

    async fn managed_service(&self, id: ServiceId, user: &CurrentUser) -> Result<Service, AppError> {
        let service = ServiceRepository::new(self.pool)
            .get(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("service {id}")))?;
        self.managed_salon(service.salon_id, user).await?;
        Ok(service)
    }

    /// Update a service of a managed salon.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound`, `AppError::Forbidden` or `AppError::BadRequest`.
    pub async fn update_service(
        &self,
        id: ServiceId,
        user: &CurrentUser,
        input: &ServiceInput,
    ) -> Result<Service, AppError> {
        self.managed_service(id, user).await?;
        validate_service(input)?;
        Ok(ServiceRepository::new(self.pool).update(id, input).await?)
    }

    /// Withdraw a service. Existing bookings keep their line items.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` or `AppError::Forbidden`.
    pub async fn deactivate_service(&self, id: ServiceId, user: &CurrentUser) -> Result<(), AppError> {
        self.managed_service(id, user).await?;
        ServiceRepository::new(self.pool).deactivate(id).await?;
        Ok(())
    }

    /// Add a staff member to a managed salon.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound`, `AppError::Forbidden` or `AppError::BadRequest`.
    pub async fn create_staff(
        &self,
        salon: SalonId,
        user: &CurrentUser,
        input: &StaffInput,
    ) -> Result<Staff, AppError> {
        self.managed_salon(salon, user).await?;
        check_name(&input.name, "staff")?;
        Ok(StaffRepository::new(self.pool).create(salon, input).await?)
    }

    /// Load a staff member.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the staff member does not exist.
    pub async fn staff(&self, id: StaffId) -> Result<Staff, AppError> {
        StaffRepository::new(self.pool)
            .get(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("staff {id}")))
    }

    async fn managed_staff(&self, id: StaffId, user: &CurrentUser) -> Result<Staff, AppError> {
        let staff = self.staff(id).await?;
        self.managed_salon(staff.salon_id, user).await?;
        Ok(staff)
    }

    /// Update a staff member of a managed salon.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound`, `AppError::Forbidden` or `AppError::BadRequest`.
    pub async fn update_staff(
        &self,
        id: StaffId,
        user: &CurrentUser,
        input: &StaffInput,
    ) -> Result<Staff, AppError> {
        self.managed_staff(id, user).await?;
        check_name(&input.name, "staff")?;
        Ok(StaffRepository::new(self.pool).update(id, input).await?)
    }

    /// Deactivate a staff member. Their existing bookings are kept.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` or `AppError::Forbidden`.
    pub async fn deactivate_staff(&self, id: StaffId, user: &CurrentUser) -> Result<(), AppError> {
        self.managed_staff(id, user).await?;
        StaffRepository::new(self.pool).deactivate(id).await?;
        Ok(())
    }

    /// A staff member's weekly schedule.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the staff member does not exist.
    pub async fn shifts(&self, id: StaffId) -> Result<Vec<StaffShift>, AppError> {
        let staff = self.staff(id).await?;
        Ok(StaffRepository::new(self.pool).shifts_for(&[staff.id]).await?)
    }

    /// Replace a staff member's weekly schedule.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound`, `AppError::Forbidden` or `AppError::BadRequest`.
    #[instrument(skip(self, user, shifts), fields(staff_id = %id, count = shifts.len()))]
    pub async fn replace_shifts(
        &self,
        id: StaffId,
        user: &CurrentUser,
        shifts: &[ShiftInput],
    ) -> Result<Vec<StaffShift>, AppError> {
        self.managed_staff(id, user).await?;
        validate_shifts(shifts)?;
        Ok(StaffRepository::new(self.pool).replace_shifts(id, shifts).await?)
    }
}
