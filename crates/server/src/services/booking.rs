//! Booking lifecycle: reserve, confirm, complete, cancel.
//!
//! Validation here gives precise errors; the `bookings_no_overlap` constraint is what
//! actually guarantees a staff member is never double-booked, and its violation is
//! reported as `409 slot already booked`.

use chrono::{Days, Duration, NaiveDate, NaiveDateTime, Utc};
use serde::Deserialize;
use sqlx::PgPool;
use tracing::{info, instrument};

use barberly_core::schedule::{DailyHours, Interval, StaffCalendar};
use barberly_core::{
    BookingId, BookingStatus, NotificationKind, PhoneNumber, Price, SalonId, ServiceId, StaffId,
    UserId,
};

use crate::config::BookingConfig;
use crate::db::bookings::{BookingRepository, NewBooking, SLOT_TAKEN};
use crate::db::salons::SalonRepository;
use crate::db::services::ServiceRepository;
use crate::db::staff::StaffRepository;
use crate::error::AppError;
use crate::models::{Booking, BookingDetail, CurrentUser, Salon};
use crate::services::availability::{active_staff, build_calendars, selected_services, total_length};
use crate::services::notification::{BookingFacts, NotificationService};
use crate::services::payment::BOOKING_CANCELLED;

/// Maximum note length.
const MAX_NOTE_LENGTH: usize = 500;

/// A booking request. `start` is salon-local wall-clock time.
#[derive(Debug, Clone, Deserialize)]
pub struct BookingRequest {
    pub salon_id: SalonId,
    pub service_ids: Vec<ServiceId>,
    #[serde(default)]
    pub staff_id: Option<StaffId>,
    pub start: NaiveDateTime,
    /// Required for guests; defaults to the account name otherwise.
    #[serde(default)]
    pub customer_name: Option<String>,
    /// Required for guests; defaults to the account phone otherwise.
    #[serde(default)]
    pub customer_phone: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
}

/// Check that `slot` can be booked at `now` (salon local).
///
/// # Errors
///
/// Returns `AppError::BadRequest` if the slot is outside opening hours, too soon or
/// beyond the booking horizon.
pub fn check_slot(
    slot: &Interval,
    hours: &DailyHours,
    now: NaiveDateTime,
    config: &BookingConfig,
) -> Result<(), AppError> {
    if !hours.contains(slot) {
        return Err(AppError::BadRequest(
            "slot is outside the salon's opening hours".to_string(),
        ));
    }
    if slot.start() < now + Duration::minutes(i64::from(config.min_lead_minutes)) {
        return Err(AppError::BadRequest("slot is in the past".to_string()));
    }
    let horizon = now
        .date()
        .checked_add_days(Days::new(u64::from(config.max_days_ahead)))
        .unwrap_or(NaiveDate::MAX);
    if slot.start().date() >= horizon {
        return Err(AppError::BadRequest(format!(
            "bookings open {} days ahead",
            config.max_days_ahead
        )));
    }
    Ok(())
}

/// Pick the staff member for `slot`.
///
/// A requested member must work and be free; otherwise the first free member in
/// calendar order is taken.
///
/// # Errors
///
/// Returns `AppError::BadRequest` if the requested member is off shift and
/// `AppError::Conflict` if nobody can take the slot.
pub fn choose_staff(
    calendars: &[StaffCalendar],
    requested: Option<StaffId>,
    slot: &Interval,
) -> Result<StaffId, AppError> {
    match requested {
        Some(id) => {
            let calendar = calendars
                .iter()
                .find(|c| c.staff_id == id)
                .ok_or_else(|| AppError::NotFound(format!("staff {id}")))?;
            if !calendar.works(slot) {
                return Err(AppError::BadRequest(
                    "staff member is not working at that time".to_string(),
                ));
            }
            if !calendar.is_free(slot) {
                return Err(AppError::Conflict(SLOT_TAKEN.to_string()));
            }
            Ok(id)
        }
        None => calendars
            .iter()
            .find(|c| c.can_take(slot))
            .map(|c| c.staff_id)
            .ok_or_else(|| AppError::Conflict("no staff available for that slot".to_string())),
    }
}

/// Who is allowed to move a booking to `to`.
#[must_use]
pub fn may_transition(booking: &Booking, salon: &Salon, actor: &CurrentUser, to: BookingStatus) -> bool {
    match to {
        BookingStatus::Cancelled => booking.is_customer(actor.id) || salon.is_managed_by(actor),
        BookingStatus::Confirmed | BookingStatus::Completed => salon.is_managed_by(actor),
        BookingStatus::Pending => false,
    }
}

/// Booking service.
pub struct BookingService<'a> {
    pool: &'a PgPool,
    config: &'a BookingConfig,
}

impl<'a> BookingService<'a> {
    /// Create a new booking service.
    #[must_use]
    pub const fn new(pool: &'a PgPool, config: &'a BookingConfig) -> Self {
        Self { pool, config }
    }

    /// Reserve a slot. Guests pass `None` and must supply name and phone.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` for invalid input, `AppError::NotFound` for an
    /// unknown salon or staff member and `AppError::Conflict` when the slot is taken.
    #[instrument(skip(self, customer, request), fields(salon_id = %request.salon_id, start = %request.start))]
    pub async fn create(
        &self,
        customer: Option<&CurrentUser>,
        request: &BookingRequest,
    ) -> Result<BookingDetail, AppError> {
        let (name, phone) = contact(customer, request)?;
        let note = request
            .note
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty());
        if note.is_some_and(|n| n.chars().count() > MAX_NOTE_LENGTH) {
            return Err(AppError::BadRequest(format!(
                "note must be at most {MAX_NOTE_LENGTH} characters"
            )));
        }

        let salon = self.active_salon(request.salon_id).await?;

        let found = ServiceRepository::new(self.pool)
            .get_many(salon.id, &request.service_ids)
            .await?;
        let services = selected_services(&request.service_ids, found)?;
        let slot = Interval::starting_at(request.start, total_length(&services))?;
        check_slot(&slot, &salon.hours()?, salon.local(Utc::now()), self.config)?;

        let staff = active_staff(self.pool, &salon, request.staff_id).await?;
        let staff_ids: Vec<StaffId> = staff.iter().map(|s| s.id).collect();
        let shifts = StaffRepository::new(self.pool).shifts_for(&staff_ids).await?;
        let start_at = salon.to_utc(slot.start());
        let end_at = salon.to_utc(slot.end());
        let holding = BookingRepository::new(self.pool)
            .holding_between(&staff_ids, start_at, end_at)
            .await?;
        let calendars = build_calendars(&salon, &staff, &shifts, &holding)?;
        let staff_id = choose_staff(&calendars, request.staff_id, &slot)?;

        let total_price: Price = services.iter().map(|s| s.price).sum();
        let bookings = BookingRepository::new(self.pool);
        let booking = bookings
            .create(
                &NewBooking {
                    salon_id: salon.id,
                    staff_id,
                    customer_id: customer.map(|c| c.id),
                    customer_name: &name,
                    customer_phone: &phone,
                    start_at,
                    end_at,
                    total_price,
                    note,
                },
                &services,
            )
            .await?;
        info!(booking_id = %booking.id, staff_id = %staff_id, "Booking created");

        NotificationService::new(self.pool)
            .notify(
                salon.owner_id,
                NotificationKind::BookingCreated,
                &BookingFacts::of(&booking, &salon),
            )
            .await;

        let services = bookings.lines(booking.id).await?;
        Ok(BookingDetail { booking, services })
    }

    /// A booking with its line items, visible to its customer and the salon's managers.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the booking does not exist or is not visible.
    pub async fn detail(&self, id: BookingId, viewer: &CurrentUser) -> Result<BookingDetail, AppError> {
        let (booking, salon) = self.load(id).await?;
        if !booking.is_customer(viewer.id) && !salon.is_managed_by(viewer) {
            return Err(AppError::NotFound(format!("booking {id}")));
        }
        let services = BookingRepository::new(self.pool).lines(id).await?;
        Ok(BookingDetail { booking, services })
    }

    /// Cancel a booking. Any pending payment fails with it.
    ///
    /// # Errors
    ///
    /// See [`Self::transition`].
    pub async fn cancel(&self, id: BookingId, actor: &CurrentUser) -> Result<Booking, AppError> {
        self.transition(id, actor, BookingStatus::Cancelled).await
    }

    /// Confirm a pending booking.
    ///
    /// # Errors
    ///
    /// See [`Self::transition`].
    pub async fn confirm(&self, id: BookingId, actor: &CurrentUser) -> Result<Booking, AppError> {
        self.transition(id, actor, BookingStatus::Confirmed).await
    }

    /// Mark a confirmed booking completed.
    ///
    /// # Errors
    ///
    /// See [`Self::transition`].
    pub async fn complete(&self, id: BookingId, actor: &CurrentUser) -> Result<Booking, AppError> {
        self.transition(id, actor, BookingStatus::Completed).await
    }

    /// Move a booking to `to` and notify the people involved.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the booking does not exist or is not visible,
    /// `AppError::Forbidden` if `actor` may not make this change,
    /// `AppError::BadRequest` for a transition the lifecycle does not allow and
    /// `AppError::Conflict` if the booking changed concurrently.
    #[instrument(skip(self, actor), fields(booking_id = %id, user_id = %actor.id, to = %to))]
    pub async fn transition(
        &self,
        id: BookingId,
        actor: &CurrentUser,
        to: BookingStatus,
    ) -> Result<Booking, AppError> {
        let (booking, salon) = self.load(id).await?;
        if !booking.is_customer(actor.id) && !salon.is_managed_by(actor) {
            return Err(AppError::NotFound(format!("booking {id}")));
        }
        if !may_transition(&booking, &salon, actor, to) {
            return Err(AppError::Forbidden(format!("you cannot mark this booking {to}")));
        }
        if !booking.status.can_transition_to(to) {
            return Err(AppError::BadRequest(format!(
                "cannot move a {} booking to {to}",
                booking.status
            )));
        }

        let bookings = BookingRepository::new(self.pool);
        let changed = if to == BookingStatus::Cancelled {
            bookings.cancel(id, booking.status, BOOKING_CANCELLED).await?
        } else {
            bookings
                .transition(id, booking.status, to)
                .await?
                .map(|updated| (updated, Vec::new()))
        };
        let (updated, failed) = changed
            .ok_or_else(|| AppError::Conflict("booking was changed by someone else".to_string()))?;
        info!(from = %booking.status, failed_payments = failed.len(), "Booking status changed");

        let kind = match to {
            BookingStatus::Confirmed => NotificationKind::BookingConfirmed,
            BookingStatus::Completed => NotificationKind::BookingCompleted,
            BookingStatus::Cancelled | BookingStatus::Pending => NotificationKind::BookingCancelled,
        };
        let recipients = if to == BookingStatus::Cancelled {
            vec![updated.customer_id, Some(salon.owner_id)]
        } else {
            vec![updated.customer_id]
        };
        NotificationService::new(self.pool)
            .notify_all(&recipients, kind, &BookingFacts::of(&updated, &salon))
            .await;

        Ok(updated)
    }

    /// The user's own bookings.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Database` if the query fails.
    pub async fn list_mine(&self, user: UserId) -> Result<Vec<Booking>, AppError> {
        Ok(BookingRepository::new(self.pool).list_for_customer(user).await?)
    }

    /// A salon's bookings on one local day.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` for an unknown salon and `AppError::Forbidden` if
    /// `viewer` does not manage it.
    pub async fn list_for_salon(
        &self,
        salon_id: SalonId,
        date: NaiveDate,
        viewer: &CurrentUser,
    ) -> Result<Vec<Booking>, AppError> {
        let salon = SalonRepository::new(self.pool)
            .get(salon_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("salon {salon_id}")))?;
        if !salon.is_managed_by(viewer) {
            return Err(AppError::Forbidden("you do not manage this salon".to_string()));
        }

        let from = date.and_hms_opt(0, 0, 0).unwrap_or_default();
        let to = from + Duration::days(1);
        Ok(BookingRepository::new(self.pool)
            .list_for_salon(salon.id, salon.to_utc(from), salon.to_utc(to))
            .await?)
    }

    async fn active_salon(&self, id: SalonId) -> Result<Salon, AppError> {
        SalonRepository::new(self.pool)
            .get(id)
            .await?
            .filter(|s| s.is_active)
            .ok_or_else(|| AppError::NotFound(format!("salon {id}")))
    }

    /// Load a booking and its salon.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if either is missing.
    pub async fn load(&self, id: BookingId) -> Result<(Booking, Salon), AppError> {
        let booking = BookingRepository::new(self.pool)
            .get(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("booking {id}")))?;
        let salon = SalonRepository::new(self.pool)
            .get(booking.salon_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("salon {}", booking.salon_id)))?;
        Ok((booking, salon))
    }
}

/// Contact details for the booking: the account's, or the guest's.
fn contact(
    customer: Option<&CurrentUser>,
    request: &BookingRequest,
) -> Result<(String, PhoneNumber), AppError> {
    let name = request
        .customer_name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty());
    let phone = request
        .customer_phone
        .as_deref()
        .map(PhoneNumber::parse)
        .transpose()?;

    match (customer, name, phone) {
        (Some(user), name, phone) => Ok((
            name.map_or_else(|| user.name.clone(), str::to_owned),
            phone.unwrap_or_else(|| user.phone.clone()),
        )),
        (None, Some(name), Some(phone)) => Ok((name.to_owned(), phone)),
        (None, _, _) => Err(AppError::BadRequest(
            "guests must give a name and phone number".to_string(),
        )),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use barberly_core::UserRole;
    use barberly_core::schedule::WeeklyShift;
    use chrono::{NaiveTime, Weekday};

    use super::*;
    use crate::services::availability::tests::{booking, local, salon};

    fn slot(h: u32, m: u32, minutes: i64) -> Interval {
        Interval::starting_at(local(h, m), Duration::minutes(minutes)).unwrap()
    }

    fn user(id: i32, role: UserRole) -> CurrentUser {
        CurrentUser {
            id: UserId::new(id),
            phone: PhoneNumber::parse("0987654321").unwrap(),
            name: "Lan".to_owned(),
            role,
        }
    }

    fn request() -> BookingRequest {
        BookingRequest {
            salon_id: SalonId::new(1),
            service_ids: vec![ServiceId::new(1)],
            staff_id: None,
            start: local(9, 0),
            customer_name: None,
            customer_phone: None,
            note: None,
        }
    }

    #[test]
    fn test_check_slot_rules() {
        let hours = salon().hours().unwrap();
        let config = BookingConfig::default();
        let morning = local(8, 0);

        assert!(check_slot(&slot(9, 0, 30), &hours, morning, &config).is_ok());
        // Runs past closing at 12:00.
        assert!(check_slot(&slot(11, 45, 30), &hours, morning, &config).is_err());
        // Already started.
        assert!(check_slot(&slot(9, 0, 30), &hours, local(9, 10), &config).is_err());

        let lead = BookingConfig {
            min_lead_minutes: 120,
            ..BookingConfig::default()
        };
        assert!(check_slot(&slot(9, 30, 30), &hours, morning, &lead).is_err());
        assert!(check_slot(&slot(10, 0, 30), &hours, morning, &lead).is_ok());
    }

    #[test]
    fn test_check_slot_horizon() {
        let hours = salon().hours().unwrap();
        let config = BookingConfig {
            max_days_ahead: 2,
            ..BookingConfig::default()
        };
        let tomorrow = Interval::starting_at(
            local(9, 0) + Duration::days(1),
            Duration::minutes(30),
        )
        .unwrap();
        let too_far = Interval::starting_at(
            local(9, 0) + Duration::days(2),
            Duration::minutes(30),
        )
        .unwrap();
        assert!(check_slot(&tomorrow, &hours, local(8, 0), &config).is_ok());
        assert!(check_slot(&too_far, &hours, local(8, 0), &config).is_err());
    }

    #[test]
    fn test_choose_staff_picks_first_free() {
        let mut busy = StaffCalendar::new(StaffId::new(1), vec![]);
        busy.busy.push(slot(9, 0, 60));
        let free = StaffCalendar::new(StaffId::new(2), vec![]);
        let calendars = vec![busy, free];

        assert_eq!(
            choose_staff(&calendars, None, &slot(9, 30, 30)).unwrap(),
            StaffId::new(2)
        );
        assert_eq!(
            choose_staff(&calendars, None, &slot(10, 0, 30)).unwrap(),
            StaffId::new(1)
        );
    }

    #[test]
    fn test_choose_requested_staff_rejects_overlap() {
        let mut calendar = StaffCalendar::new(StaffId::new(1), vec![]);
        calendar.busy.push(slot(9, 0, 60));

        let err = choose_staff(&[calendar], Some(StaffId::new(1)), &slot(9, 30, 30)).unwrap_err();
        assert!(matches!(err, AppError::Conflict(ref msg) if msg == SLOT_TAKEN));
    }

    #[test]
    fn test_choose_requested_staff_off_shift() {
        let shift = WeeklyShift::new(
            Weekday::Tue,
            NaiveTime::from_hms_opt(13, 0, 0).unwrap(),
            NaiveTime::from_hms_opt(18, 0, 0).unwrap(),
        )
        .unwrap();
        let calendar = StaffCalendar::new(StaffId::new(1), vec![shift]);
        let err = choose_staff(&[calendar], Some(StaffId::new(1)), &slot(9, 0, 30)).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[test]
    fn test_nobody_free_is_conflict() {
        let mut calendar = StaffCalendar::new(StaffId::new(1), vec![]);
        calendar.busy.push(slot(9, 0, 30));
        let err = choose_staff(&[calendar], None, &slot(9, 0, 30)).unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[test]
    fn test_transition_permissions() {
        let salon = salon();
        let mut b = booking(1, local(9, 0), 30, BookingStatus::Pending);
        b.customer_id = Some(UserId::new(5));

        let customer = user(5, UserRole::Customer);
        let owner = user(10, UserRole::SalonOwner);
        let stranger = user(6, UserRole::Customer);

        assert!(may_transition(&b, &salon, &customer, BookingStatus::Cancelled));
        assert!(!may_transition(&b, &salon, &customer, BookingStatus::Confirmed));
        assert!(may_transition(&b, &salon, &owner, BookingStatus::Confirmed));
        assert!(may_transition(&b, &salon, &owner, BookingStatus::Completed));
        assert!(!may_transition(&b, &salon, &stranger, BookingStatus::Cancelled));
    }

    #[test]
    fn test_guest_contact_required() {
        assert!(contact(None, &request()).is_err());

        let guest = BookingRequest {
            customer_name: Some("  Huy ".to_owned()),
            customer_phone: Some("+84 912 345 678".to_owned()),
            ..request()
        };
        let (name, phone) = contact(None, &guest).unwrap();
        assert_eq!(name, "Huy");
        assert_eq!(phone.as_str(), "0912345678");
    }

    #[test]
    fn test_account_contact_defaults() {
        let (name, phone) = contact(Some(&user(5, UserRole::Customer)), &request()).unwrap();
        assert_eq!(name, "Lan");
        assert_eq!(phone.as_str(), "0987654321");
    }
}
