//! Open appointment slots for a salon.

use std::collections::HashMap;

use chrono::{Days, Duration, NaiveDate, NaiveDateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use tracing::instrument;

use barberly_core::schedule::{
    AvailabilityQuery, ScheduleError, Slot, StaffCalendar, available_slots,
};
use barberly_core::{SalonId, ServiceId, StaffId};

use crate::config::BookingConfig;
use crate::db::bookings::BookingRepository;
use crate::db::salons::SalonRepository;
use crate::db::services::ServiceRepository;
use crate::db::staff::StaffRepository;
use crate::error::AppError;
use crate::models::{Booking, Salon, Service, Staff, StaffShift};

/// What the customer wants to book.
#[derive(Debug, Clone)]
pub struct AvailabilityRequest {
    /// First salon-local day searched.
    pub date: NaiveDate,
    pub days: u32,
    pub service_ids: Vec<ServiceId>,
    pub staff_id: Option<StaffId>,
}

/// Open slots for a request.
#[derive(Debug, Clone, Serialize)]
pub struct Availability {
    pub salon_id: SalonId,
    pub date: NaiveDate,
    pub days: u32,
    pub duration_minutes: i64,
    pub slots: Vec<Slot>,
}

/// Resolve requested service ids against what the salon offers.
///
/// Duplicate ids are collapsed. Every remaining id must name an active service of
/// the salon.
///
/// # Errors
///
/// Returns `AppError::BadRequest` naming the first missing or inactive service.
pub fn selected_services(requested: &[ServiceId], found: Vec<Service>) -> Result<Vec<Service>, AppError> {
    if requested.is_empty() {
        return Err(AppError::BadRequest("choose at least one service".to_string()));
    }

    let mut by_id: HashMap<ServiceId, Service> = found.into_iter().map(|s| (s.id, s)).collect();
    let mut selected = Vec::with_capacity(requested.len());
    for id in requested {
        if selected.iter().any(|s: &Service| s.id == *id) {
            continue;
        }
        match by_id.remove(id) {
            Some(service) if service.is_active => selected.push(service),
            _ => {
                return Err(AppError::BadRequest(format!(
                    "service {id} is not offered by this salon"
                )));
            }
        }
    }
    Ok(selected)
}

/// Total appointment length for the selected services.
#[must_use]
pub fn total_length(services: &[Service]) -> Duration {
    Duration::minutes(services.iter().map(|s| i64::from(s.duration_minutes)).sum())
}

/// Build one calendar per staff member, in `staff` order.
///
/// Bookings are converted from UTC to the salon's wall clock.
///
/// # Errors
///
/// Returns `ScheduleError` if a stored shift or booking interval is empty.
pub fn build_calendars(
    salon: &Salon,
    staff: &[Staff],
    shifts: &[StaffShift],
    bookings: &[Booking],
) -> Result<Vec<StaffCalendar>, ScheduleError> {
    let offset = salon.offset();
    staff
        .iter()
        .map(|member| {
            let weekly = shifts
                .iter()
                .filter(|shift| shift.staff_id == member.id)
                .map(StaffShift::to_weekly)
                .collect::<Result<Vec<_>, _>>()?;
            let busy = bookings
                .iter()
                .filter(|b| b.staff_id == member.id && b.status.holds_slot())
                .map(|b| b.local_interval(offset))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(StaffCalendar {
                staff_id: member.id,
                shifts: weekly,
                busy,
            })
        })
        .collect()
}

/// Days to search from `from`, given `requested` days and salon-local `today`.
///
/// The request is clamped to `1..=max_days_ahead` and then cut so the range stops
/// before `today + max_days_ahead`, the first day a booking is refused. Zero means
/// `from` is already past that horizon.
#[must_use]
pub fn search_days(from: NaiveDate, requested: u32, today: NaiveDate, config: &BookingConfig) -> u32 {
    let days = requested.clamp(1, config.max_days_ahead.max(1));
    let horizon = today
        .checked_add_days(Days::new(u64::from(config.max_days_ahead)))
        .unwrap_or(NaiveDate::MAX);
    let left = u32::try_from((horizon - from).num_days().max(0)).unwrap_or(u32::MAX);
    days.min(left)
}

/// Bookable slots of `length` over `days` days from `from`, as seen at salon-local
/// `now`.
///
/// # Errors
///
/// Returns `AppError` if the salon's hours or slot grid are invalid.
pub fn open_slots(
    salon: &Salon,
    calendars: &[StaffCalendar],
    from: NaiveDate,
    days: u32,
    length: Duration,
    now: NaiveDateTime,
    config: &BookingConfig,
) -> Result<Vec<Slot>, AppError> {
    if days == 0 {
        return Ok(Vec::new());
    }
    let query = AvailabilityQuery {
        from,
        days,
        hours: salon.hours()?,
        step: Duration::minutes(i64::from(salon.slot_minutes)),
        length,
        not_before: now + Duration::minutes(i64::from(config.min_lead_minutes)),
    };
    Ok(available_slots(&query, calendars)?)
}

/// Availability service.
pub struct AvailabilityService<'a> {
    pool: &'a PgPool,
    config: &'a BookingConfig,
}

impl<'a> AvailabilityService<'a> {
    /// Create a new availability service.
    #[must_use]
    pub const fn new(pool: &'a PgPool, config: &'a BookingConfig) -> Self {
        Self { pool, config }
    }

    /// Open slots at `salon_id` for `request`.
    ///
    /// The day range is trimmed with [`search_days`]; the answer reports the days
    /// actually searched.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` for an unknown or inactive salon or staff member and
    /// `AppError::BadRequest` for an invalid service selection.
    #[instrument(skip(self, request), fields(salon_id = %salon_id, date = %request.date, days = request.days))]
    pub async fn find(
        &self,
        salon_id: SalonId,
        request: &AvailabilityRequest,
    ) -> Result<Availability, AppError> {
        let salon = SalonRepository::new(self.pool)
            .get(salon_id)
            .await?
            .filter(|s| s.is_active)
            .ok_or_else(|| AppError::NotFound(format!("salon {salon_id}")))?;

        let found = ServiceRepository::new(self.pool)
            .get_many(salon.id, &request.service_ids)
            .await?;
        let services = selected_services(&request.service_ids, found)?;
        let length = total_length(&services);

        let staff = active_staff(self.pool, &salon, request.staff_id).await?;
        let staff_ids: Vec<StaffId> = staff.iter().map(|s| s.id).collect();
        let shifts = StaffRepository::new(self.pool).shifts_for(&staff_ids).await?;

        let now = salon.local(Utc::now());
        let days = search_days(request.date, request.days, now.date(), self.config);
        let window_start = request.date.and_hms_opt(0, 0, 0).unwrap_or_default();
        let window_end = request
            .date
            .checked_add_days(Days::new(u64::from(days)))
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .ok_or_else(|| AppError::BadRequest("date out of range".to_string()))?;
        let bookings = BookingRepository::new(self.pool)
            .holding_between(&staff_ids, salon.to_utc(window_start), salon.to_utc(window_end))
            .await?;

        let calendars = build_calendars(&salon, &staff, &shifts, &bookings)?;
        let slots = open_slots(&salon, &calendars, request.date, days, length, now, self.config)?;

        Ok(Availability {
            salon_id: salon.id,
            date: request.date,
            days,
            duration_minutes: length.num_minutes(),
            slots,
        })
    }
}

/// Active staff of a salon, or just the requested member.
///
/// # Errors
///
/// Returns `AppError::NotFound` if the requested member is not active at the salon.
pub(crate) async fn active_staff(
    pool: &PgPool,
    salon: &Salon,
    requested: Option<StaffId>,
) -> Result<Vec<Staff>, AppError> {
    let staff = StaffRepository::new(pool).list(salon.id, false).await?;
    match requested {
        None => Ok(staff),
        Some(id) => {
            let member: Vec<Staff> = staff.into_iter().filter(|s| s.id == id).collect();
            if member.is_empty() {
                Err(AppError::NotFound(format!("staff {id}")))
            } else {
                Ok(member)
            }
        }
    }
}
