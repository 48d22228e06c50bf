//! Salon catalogue: salons, services, staff and weekly shifts.

use chrono::{DateTime, FixedOffset, NaiveDateTime, NaiveTime, Offset, TimeDelta, Utc, Weekday};
use serde::Serialize;

use barberly_core::schedule::{DailyHours, ScheduleError, WeeklyShift};
use barberly_core::{PhoneNumber, Price, SalonId, ServiceId, ShiftId, StaffId, UserId};

use super::CurrentUser;

/// A bookable salon.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Salon {
    pub id: SalonId,
    pub owner_id: UserId,
    pub name: String,
    pub address: String,
    pub phone: Option<PhoneNumber>,
    pub description: Option<String>,
    /// Local opening time.
    pub open_time: NaiveTime,
    /// Local closing time.
    pub close_time: NaiveTime,
    /// Slot grid granularity.
    pub slot_minutes: i32,
    /// Offset of the salon's wall clock from UTC.
    pub utc_offset_minutes: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Salon {
    /// Opening hours as a schedule value.
    ///
    /// # Errors
    ///
    /// Returns [`ScheduleError::InvalidHours`] if the stored hours are not ordered.
    pub fn hours(&self) -> Result<DailyHours, ScheduleError> {
        DailyHours::new(self.open_time, self.close_time)
    }

    /// The salon's wall-clock offset. Out-of-range values fall back to UTC.
    #[must_use]
    pub fn offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_minutes * 60).unwrap_or_else(|| Utc.fix())
    }

    /// Salon wall-clock time of a UTC instant.
    #[must_use]
    pub fn local(&self, at: DateTime<Utc>) -> NaiveDateTime {
        at.with_timezone(&self.offset()).naive_local()
    }

    /// UTC instant of a salon wall-clock time.
    #[must_use]
    pub fn to_utc(&self, local: NaiveDateTime) -> DateTime<Utc> {
        local.and_utc() - TimeDelta::seconds(i64::from(self.offset().local_minus_utc()))
    }

    /// Whether `user` owns this salon.
    #[must_use]
    pub fn is_owned_by(&self, user: UserId) -> bool {
        self.owner_id == user
    }

    /// Whether `user` may manage this salon: its owner or an admin.
    #[must_use]
    pub fn is_managed_by(&self, user: &CurrentUser) -> bool {
        user.is_admin() || self.is_owned_by(user.id)
    }
}

/// A service offered by a salon.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Service {
    pub id: ServiceId,
    pub salon_id: SalonId,
    pub name: String,
    pub description: Option<String>,
    pub price: Price,
    pub duration_minutes: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A stylist working at a salon.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Staff {
    pub id: StaffId,
    pub salon_id: SalonId,
    pub name: String,
    pub phone: Option<PhoneNumber>,
    pub title: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One weekly working window of a staff member.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct StaffShift {
    pub id: ShiftId,
    pub staff_id: StaffId,
    /// Day of week, 0 = Monday .. 6 = Sunday.
    pub weekday: i16,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

impl StaffShift {
    /// Convert to a schedule value.
    ///
    /// # Errors
    ///
    /// Returns [`ScheduleError::EmptyInterval`] if the stored window is empty. Rows with an
    /// out-of-range weekday are reported the same way.
    pub fn to_weekly(&self) -> Result<WeeklyShift, ScheduleError> {
        let weekday = weekday_from_index(self.weekday).ok_or(ScheduleError::EmptyInterval)?;
        WeeklyShift::new(weekday, self.start_time, self.end_time)
    }
}

/// Map a stored weekday index (0 = Monday) to a [`Weekday`].
#[must_use]
pub fn weekday_from_index(index: i16) -> Option<Weekday> {
    u8::try_from(index)
        .ok()
        .and_then(|i| Weekday::try_from(i).ok())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn salon(offset_minutes: i32) -> Salon {
        let now = Utc::now();
        Salon {
            id: SalonId::new(1),
            owner_id: UserId::new(1),
            name: "Barber 1975".to_owned(),
            address: String::new(),
            phone: None,
            description: None,
            open_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            close_time: NaiveTime::from_hms_opt(18, 0, 0).unwrap(),
            slot_minutes: 30,
            utc_offset_minutes: offset_minutes,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_local_and_utc_conversion() {
        let s = salon(420);
        let local = chrono::NaiveDate::from_ymd_opt(2026, 10, 20)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap();
        let utc = s.to_utc(local);
        assert_eq!(utc.to_rfc3339(), "2026-10-20T02:30:00+00:00");
        assert_eq!(s.local(utc), local);
    }

    #[test]
    fn test_managed_by_owner_or_admin() {
        let s = salon(420);
        let user = |id, role| CurrentUser {
            id: UserId::new(id),
            phone: barberly_core::PhoneNumber::parse("0912345678").unwrap(),
            name: "x".to_owned(),
            role,
        };
        assert!(s.is_managed_by(&user(1, barberly_core::UserRole::SalonOwner)));
        assert!(s.is_managed_by(&user(9, barberly_core::UserRole::Admin)));
        assert!(!s.is_managed_by(&user(9, barberly_core::UserRole::SalonOwner)));
        assert!(!s.is_managed_by(&user(9, barberly_core::UserRole::Customer)));
    }

    #[test]
    fn test_out_of_range_offset_falls_back_to_utc() {
        assert_eq!(salon(100_000).offset().local_minus_utc(), 0);
    }

    #[test]
    fn test_weekday_from_index() {
        assert_eq!(weekday_from_index(0), Some(Weekday::Mon));
        assert_eq!(weekday_from_index(6), Some(Weekday::Sun));
        assert_eq!(weekday_from_index(7), None);
        assert_eq!(weekday_from_index(-1), None);
    }

    #[test]
    fn test_shift_to_weekly() {
        let shift = StaffShift {
            id: ShiftId::new(1),
            staff_id: StaffId::new(1),
            weekday: 2,
            start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
        };
        let weekly = shift.to_weekly().unwrap();
        assert_eq!(weekly.weekday(), Weekday::Wed);

        let backwards = StaffShift {
            start_time: NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            ..shift
        };
        assert!(backwards.to_weekly().is_err());
    }
}
