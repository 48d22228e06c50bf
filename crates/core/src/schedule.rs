//! Time-slot arithmetic for salon availability.
//!
//! All times here are salon-local wall-clock times (`NaiveDateTime`). Callers convert
//! to and from UTC at the edges using the salon's offset.
//!
//! Availability is computed in three steps:
//!
//! 1. [`candidate_slots`] lays a fixed grid over the salon's opening hours.
//! 2. Each [`StaffCalendar`] decides whether its staff member works that slot and is
//!    not already booked.
//! 3. [`available_slots`] keeps the slots that at least one staff member can take.
//!
//! # Example
//!
//! ```
//! use barberly_core::schedule::{DailyHours, candidate_slots};
//! use chrono::{Duration, NaiveDate, NaiveTime};
//!
//! let hours = DailyHours::new(
//!     NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
//!     NaiveTime::from_hms_opt(11, 0, 0).unwrap(),
//! )
//! .unwrap();
//! let date = NaiveDate::from_ymd_opt(2026, 10, 20).unwrap();
//!
//! let slots = candidate_slots(date, hours, Duration::minutes(30), Duration::minutes(60)).unwrap();
//! assert_eq!(slots.len(), 3); // 09:00, 09:30, 10:00
//! ```

use chrono::{Datelike, Days, Duration, NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

use crate::types::StaffId;

/// Errors produced by schedule construction and slot queries.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ScheduleError {
    /// Opening hours where the salon closes at or before it opens.
    #[error("opening time {open} must be before closing time {close}")]
    InvalidHours {
        /// Opening time.
        open: NaiveTime,
        /// Closing time.
        close: NaiveTime,
    },
    /// An interval whose start is not before its end.
    #[error("interval start must be before its end")]
    EmptyInterval,
    /// A slot grid step of zero or less.
    #[error("slot step must be positive")]
    NonPositiveStep,
    /// A slot length of zero or less.
    #[error("slot length must be positive")]
    NonPositiveLength,
    /// A query covering no days.
    #[error("at least one day must be requested")]
    NoDays,
}

/// Daily opening hours of a salon, `open < close` on the same day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyHours {
    open: NaiveTime,
    close: NaiveTime,
}

impl DailyHours {
    /// Create opening hours.
    ///
    /// # Errors
    ///
    /// Returns [`ScheduleError::InvalidHours`] if `open >= close`. Overnight opening is
    /// not supported.
    pub fn new(open: NaiveTime, close: NaiveTime) -> Result<Self, ScheduleError> {
        if open >= close {
            return Err(ScheduleError::InvalidHours { open, close });
        }
        Ok(Self { open, close })
    }

    /// Opening time.
    #[must_use]
    pub const fn open(&self) -> NaiveTime {
        self.open
    }

    /// Closing time.
    #[must_use]
    pub const fn close(&self) -> NaiveTime {
        self.close
    }

    /// The opening window on a given date.
    #[must_use]
    pub fn window_on(&self, date: NaiveDate) -> Interval {
        Interval {
            start: date.and_time(self.open),
            end: date.and_time(self.close),
        }
    }

    /// Whether `slot` lies entirely inside the opening window of its start date.
    #[must_use]
    pub fn contains(&self, slot: &Interval) -> bool {
        self.window_on(slot.start.date()).contains(slot)
    }
}

/// A half-open time interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Interval {
    start: NaiveDateTime,
    end: NaiveDateTime,
}

impl Interval {
    /// Create an interval.
    ///
    /// # Errors
    ///
    /// Returns [`ScheduleError::EmptyInterval`] if `start >= end`.
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Result<Self, ScheduleError> {
        if start >= end {
            return Err(ScheduleError::EmptyInterval);
        }
        Ok(Self { start, end })
    }

    /// Create an interval of `length` starting at `start`.
    ///
    /// # Errors
    ///
    /// Returns [`ScheduleError::NonPositiveLength`] if `length` is not positive.
    pub fn starting_at(start: NaiveDateTime, length: Duration) -> Result<Self, ScheduleError> {
        if length <= Duration::zero() {
            return Err(ScheduleError::NonPositiveLength);
        }
        Self::new(start, start + length)
    }

    /// Inclusive start.
    #[must_use]
    pub const fn start(&self) -> NaiveDateTime {
        self.start
    }

    /// Exclusive end.
    #[must_use]
    pub const fn end(&self) -> NaiveDateTime {
        self.end
    }

    /// Length of the interval.
    #[must_use]
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// Whether the two intervals share any instant. Back-to-back intervals do not overlap.
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Whether `other` lies entirely inside `self`.
    #[must_use]
    pub fn contains(&self, other: &Self) -> bool {
        self.start <= other.start && other.end <= self.end
    }
}

/// A recurring weekly working window for a staff member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeeklyShift {
    weekday: Weekday,
    start: NaiveTime,
    end: NaiveTime,
}

impl WeeklyShift {
    /// Create a shift.
    ///
    /// # Errors
    ///
    /// Returns [`ScheduleError::EmptyInterval`] if `start >= end`.
    pub fn new(weekday: Weekday, start: NaiveTime, end: NaiveTime) -> Result<Self, ScheduleError> {
        if start >= end {
            return Err(ScheduleError::EmptyInterval);
        }
        Ok(Self {
            weekday,
            start,
            end,
        })
    }

    /// Day of week.
    #[must_use]
    pub const fn weekday(&self) -> Weekday {
        self.weekday
    }

    /// Shift start.
    #[must_use]
    pub const fn start(&self) -> NaiveTime {
        self.start
    }

    /// Shift end.
    #[must_use]
    pub const fn end(&self) -> NaiveTime {
        self.end
    }

    /// Whether `slot` falls on this shift's weekday and inside its hours.
    #[must_use]
    pub fn covers(&self, slot: &Interval) -> bool {
        let date = slot.start.date();
        if date.weekday() != self.weekday {
            return false;
        }
        let window = Interval {
            start: date.and_time(self.start),
            end: date.and_time(self.end),
        };
        window.contains(slot)
    }
}

/// Working pattern and existing bookings for one staff member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaffCalendar {
    /// The staff member.
    pub staff_id: StaffId,
    /// Weekly shifts. Empty means the staff member works whenever the salon is open.
    pub shifts: Vec<WeeklyShift>,
    /// Intervals already taken by slot-holding bookings.
    pub busy: Vec<Interval>,
}

impl StaffCalendar {
    /// Create a calendar with no bookings.
    #[must_use]
    pub const fn new(staff_id: StaffId, shifts: Vec<WeeklyShift>) -> Self {
        Self {
            staff_id,
            shifts,
            busy: Vec::new(),
        }
    }

    /// Whether the staff member is scheduled to work during `slot`.
    #[must_use]
    pub fn works(&self, slot: &Interval) -> bool {
        self.shifts.is_empty() || self.shifts.iter().any(|shift| shift.covers(slot))
    }

    /// Whether `slot` is free of existing bookings.
    #[must_use]
    pub fn is_free(&self, slot: &Interval) -> bool {
        first_conflict(slot, &self.busy).is_none()
    }

    /// Whether the staff member can take `slot`.
    #[must_use]
    pub fn can_take(&self, slot: &Interval) -> bool {
        self.works(slot) && self.is_free(slot)
    }
}

/// Return the first existing interval that overlaps `candidate`.
#[must_use]
pub fn first_conflict<'a>(candidate: &Interval, existing: &'a [Interval]) -> Option<&'a Interval> {
    existing.iter().find(|taken| taken.overlaps(candidate))
}

/// Lay a grid of slots of `length` over the opening hours of `date`.
///
/// Slots start at opening time and every `step` after it; a slot is produced only if
/// it ends at or before closing time.
///
/// # Errors
///
/// Returns [`ScheduleError::NonPositiveStep`] or [`ScheduleError::NonPositiveLength`]
/// if either duration is zero or negative.
pub fn candidate_slots(
    date: NaiveDate,
    hours: DailyHours,
    step: Duration,
    length: Duration,
) -> Result<Vec<Interval>, ScheduleError> {
    if step <= Duration::zero() {
        return Err(ScheduleError::NonPositiveStep);
    }
    if length <= Duration::zero() {
        return Err(ScheduleError::NonPositiveLength);
    }

    let window = hours.window_on(date);
    let mut slots = Vec::new();
    let mut start = window.start;
    while start + length <= window.end {
        slots.push(Interval {
            start,
            end: start + length,
        });
        start += step;
    }
    Ok(slots)
}

/// Parameters for an availability search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AvailabilityQuery {
    /// First day searched.
    pub from: NaiveDate,
    /// Number of consecutive days searched.
    pub days: u32,
    /// Salon opening hours.
    pub hours: DailyHours,
    /// Grid granularity.
    pub step: Duration,
    /// Length of the requested appointment.
    pub length: Duration,
    /// Slots starting before this instant are not offered.
    pub not_before: NaiveDateTime,
}

/// An open appointment slot and the staff who can take it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    /// Slot start (salon local time).
    pub start: NaiveDateTime,
    /// Slot end (salon local time).
    pub end: NaiveDateTime,
    /// Staff members free for the whole slot, in calendar order.
    pub staff: Vec<StaffId>,
}

/// Compute the open slots for `query` across `calendars`.
///
/// # Errors
///
/// Returns [`ScheduleError::NoDays`] if `query.days` is zero, or any error from
/// [`candidate_slots`].
pub fn available_slots(
    query: &AvailabilityQuery,
    calendars: &[StaffCalendar],
) -> Result<Vec<Slot>, ScheduleError> {
    if query.days == 0 {
        return Err(ScheduleError::NoDays);
    }

    let mut open = Vec::new();
    for offset in 0..query.days {
        let Some(date) = query.from.checked_add_days(Days::new(u64::from(offset))) else {
            break;
        };

        for slot in candidate_slots(date, query.hours, query.step, query.length)? {
            if slot.start < query.not_before {
                continue;
            }

            let staff: Vec<StaffId> = calendars
                .iter()
                .filter(|calendar| calendar.can_take(&slot))
                .map(|calendar| calendar.staff_id)
                .collect();

            if !staff.is_empty() {
                open.push(Slot {
                    start: slot.start,
                    end: slot.end,
                    staff,
                });
            }
        }
    }

    Ok(open)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn time(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn day() -> NaiveDate {
        // A Tuesday.
        NaiveDate::from_ymd_opt(2026, 10, 20).unwrap()
    }

    fn at(h: u32, m: u32) -> NaiveDateTime {
        day().and_time(time(h, m))
    }

    fn hours(open: (u32, u32), close: (u32, u32)) -> DailyHours {
        DailyHours::new(time(open.0, open.1), time(close.0, close.1)).unwrap()
    }

    #[test]
    fn test_hours_reject_inverted() {
        assert!(matches!(
            DailyHours::new(time(18, 0), time(9, 0)),
            Err(ScheduleError::InvalidHours { .. })
        ));
        assert!(DailyHours::new(time(9, 0), time(9, 0)).is_err());
    }

    #[test]
    fn test_candidate_slots_spacing() {
        let slots = candidate_slots(
            day(),
            hours((9, 0), (12, 0)),
            Duration::minutes(30),
            Duration::minutes(45),
        )
        .unwrap();

        let starts: Vec<_> = slots.iter().map(Interval::start).collect();
        assert_eq!(
            starts,
            vec![at(9, 0), at(9, 30), at(10, 0), at(10, 30), at(11, 0)]
        );
        assert!(slots.iter().all(|s| s.duration() == Duration::minutes(45)));
        assert_eq!(slots.last().unwrap().end(), at(11, 45));
    }

    #[test]
    fn test_candidate_slots_exact_fit_at_close() {
        let slots = candidate_slots(
            day(),
            hours((9, 0), (10, 0)),
            Duration::minutes(20),
            Duration::minutes(20),
        )
        .unwrap();
        assert_eq!(slots.len(), 3);
        assert_eq!(slots.last().unwrap().end(), at(10, 0));
    }

    #[test]
    fn test_candidate_slots_too_long_is_empty() {
        let slots = candidate_slots(
            day(),
            hours((9, 0), (10, 0)),
            Duration::minutes(15),
            Duration::minutes(90),
        )
        .unwrap();
        assert!(slots.is_empty());
    }

    #[test]
    fn test_candidate_slots_rejects_zero_durations() {
        let h = hours((9, 0), (10, 0));
        assert_eq!(
            candidate_slots(day(), h, Duration::zero(), Duration::minutes(30)),
            Err(ScheduleError::NonPositiveStep)
        );
        assert_eq!(
            candidate_slots(day(), h, Duration::minutes(30), Duration::minutes(-5)),
            Err(ScheduleError::NonPositiveLength)
        );
    }

    #[test]
    fn test_interval_overlap_is_half_open() {
        let a = Interval::new(at(9, 0), at(10, 0)).unwrap();
        let b = Interval::new(at(10, 0), at(11, 0)).unwrap();
        let c = Interval::new(at(9, 59), at(10, 30)).unwrap();

        assert!(!a.overlaps(&b));
        assert!(!b.overlaps(&a));
        assert!(a.overlaps(&c));
        assert!(c.overlaps(&b));
        assert!(a.overlaps(&a));
    }

    #[test]
    fn test_interval_rejects_empty() {
        assert_eq!(
            Interval::new(at(10, 0), at(10, 0)),
            Err(ScheduleError::EmptyInterval)
        );
        assert_eq!(
            Interval::starting_at(at(10, 0), Duration::zero()),
            Err(ScheduleError::NonPositiveLength)
        );
    }

    #[test]
    fn test_first_conflict() {
        let taken = vec![
            Interval::new(at(9, 0), at(9, 30)).unwrap(),
            Interval::new(at(10, 0), at(11, 0)).unwrap(),
        ];
        let wanted = Interval::new(at(10, 30), at(11, 15)).unwrap();
        assert_eq!(first_conflict(&wanted, &taken), taken.get(1));

        let free = Interval::new(at(9, 30), at(10, 0)).unwrap();
        assert_eq!(first_conflict(&free, &taken), None);
    }

    #[test]
    fn test_shift_covers_only_its_weekday() {
        let shift = WeeklyShift::new(Weekday::Tue, time(13, 0), time(17, 0)).unwrap();
        let afternoon = Interval::new(at(14, 0), at(15, 0)).unwrap();
        let morning = Interval::new(at(10, 0), at(11, 0)).unwrap();
        let straddling = Interval::new(at(16, 30), at(17, 30)).unwrap();

        assert!(shift.covers(&afternoon));
        assert!(!shift.covers(&morning));
        assert!(!shift.covers(&straddling));

        let wednesday = WeeklyShift::new(Weekday::Wed, time(13, 0), time(17, 0)).unwrap();
        assert!(!wednesday.covers(&afternoon));
    }

    #[test]
    fn test_available_slots_excludes_busy_and_off_shift() {
        let alice = StaffCalendar {
            staff_id: StaffId::new(1),
            shifts: vec![WeeklyShift::new(Weekday::Tue, time(9, 0), time(11, 0)).unwrap()],
            busy: vec![Interval::new(at(9, 30), at(10, 0)).unwrap()],
        };
        let bob = StaffCalendar {
            staff_id: StaffId::new(2),
            shifts: vec![WeeklyShift::new(Weekday::Tue, time(10, 0), time(12, 0)).unwrap()],
            busy: vec![],
        };

        let query = AvailabilityQuery {
            from: day(),
            days: 1,
            hours: hours((9, 0), (12, 0)),
            step: Duration::minutes(30),
            length: Duration::minutes(30),
            not_before: at(0, 0),
        };

        let slots = available_slots(&query, &[alice, bob]).unwrap();
        let view: Vec<_> = slots
            .iter()
            .map(|s| (s.start, s.staff.iter().map(|id| id.as_i32()).collect::<Vec<_>>()))
            .collect();

        assert_eq!(
            view,
            vec![
                (at(9, 0), vec![1]),
                (at(10, 0), vec![1, 2]),
                (at(10, 30), vec![1, 2]),
                (at(11, 0), vec![2]),
                (at(11, 30), vec![2]),
            ]
        );
    }

    #[test]
    fn test_available_slots_respects_not_before_and_days() {
        let calendar = StaffCalendar::new(StaffId::new(7), vec![]);
        let query = AvailabilityQuery {
            from: day(),
            days: 2,
            hours: hours((9, 0), (10, 0)),
            step: Duration::minutes(30),
            length: Duration::minutes(30),
            not_before: at(9, 15),
        };

        let slots = available_slots(&query, &[calendar]).unwrap();
        let starts: Vec<_> = slots.iter().map(|s| s.start).collect();
        let next_day = day().succ_opt().unwrap();
        assert_eq!(
            starts,
            vec![
                at(9, 30),
                next_day.and_time(time(9, 0)),
                next_day.and_time(time(9, 30)),
            ]
        );
    }

    #[test]
    fn test_available_slots_requires_days() {
        let query = AvailabilityQuery {
            from: day(),
            days: 0,
            hours: hours((9, 0), (10, 0)),
            step: Duration::minutes(30),
            length: Duration::minutes(30),
            not_before: at(0, 0),
        };
        assert_eq!(available_slots(&query, &[]), Err(ScheduleError::NoDays));
    }

    #[test]
    fn test_no_staff_means_no_slots() {
        let query = AvailabilityQuery {
            from: day(),
            days: 1,
            hours: hours((9, 0), (10, 0)),
            step: Duration::minutes(30),
            length: Duration::minutes(30),
            not_before: at(0, 0),
        };
        assert!(available_slots(&query, &[]).unwrap().is_empty());
    }
}
