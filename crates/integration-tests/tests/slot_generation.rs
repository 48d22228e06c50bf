//! Availability across opening hours, staff shifts and existing bookings.
//!
//! Runs without a database: calendars are built in memory the same way the server
//! builds them from stored shifts and bookings.

#![allow(clippy::unwrap_used)]

use chrono::{Datelike, Duration, NaiveDateTime, Weekday};

use barberly_core::StaffId;
use barberly_core::schedule::{
    AvailabilityQuery, DailyHours, Interval, ScheduleError, StaffCalendar, WeeklyShift,
    available_slots, candidate_slots,
};
use barberly_integration_tests::{at, time, tuesday};

fn morning() -> DailyHours {
    DailyHours::new(time(9, 0), time(12, 0)).unwrap()
}

fn query(length_minutes: i64) -> AvailabilityQuery {
    AvailabilityQuery {
        from: tuesday(),
        days: 1,
        hours: morning(),
        step: Duration::minutes(30),
        length: Duration::minutes(length_minutes),
        not_before: at(0, 0),
    }
}

fn starts(slots: &[barberly_core::schedule::Slot]) -> Vec<NaiveDateTime> {
    slots.iter().map(|slot| slot.start).collect()
}

#[test]
fn test_grid_stops_before_closing_time() {
    let slots = candidate_slots(
        tuesday(),
        morning(),
        Duration::minutes(30),
        Duration::minutes(45),
    )
    .unwrap();

    let starts: Vec<_> = slots.iter().map(Interval::start).collect();
    assert_eq!(
        starts,
        vec![at(9, 0), at(9, 30), at(10, 0), at(10, 30), at(11, 0)]
    );
    assert!(slots.iter().all(|slot| slot.end() <= at(12, 0)));
}

#[test]
fn test_shifts_and_bookings_narrow_the_staff_list() {
    let short_shift = StaffCalendar::new(
        StaffId::new(1),
        vec![WeeklyShift::new(Weekday::Tue, time(9, 0), time(10, 30)).unwrap()],
    );
    let mut all_day = StaffCalendar::new(StaffId::new(2), Vec::new());
    all_day
        .busy
        .push(Interval::new(at(10, 0), at(11, 0)).unwrap());

    let slots = available_slots(&query(30), &[short_shift, all_day]).unwrap();

    let summary: Vec<_> = slots
        .iter()
        .map(|slot| (slot.start, slot.staff.clone()))
        .collect();
    assert_eq!(
        summary,
        vec![
            (at(9, 0), vec![StaffId::new(1), StaffId::new(2)]),
            (at(9, 30), vec![StaffId::new(1), StaffId::new(2)]),
            (at(10, 0), vec![StaffId::new(1)]),
            (at(11, 0), vec![StaffId::new(2)]),
            (at(11, 30), vec![StaffId::new(2)]),
        ]
    );
}

#[test]
fn test_back_to_back_booking_leaves_next_slot_open() {
    let mut calendar = StaffCalendar::new(StaffId::new(1), Vec::new());
    calendar
        .busy
        .push(Interval::new(at(9, 0), at(9, 30)).unwrap());

    let slots = available_slots(&query(30), &[calendar]).unwrap();

    assert_eq!(starts(&slots).first(), Some(&at(9, 30)));
}

#[test]
fn test_slots_before_now_are_hidden() {
    let calendar = StaffCalendar::new(StaffId::new(1), Vec::new());
    let query = AvailabilityQuery {
        not_before: at(10, 15),
        ..query(30)
    };

    let slots = available_slots(&query, &[calendar]).unwrap();

    assert_eq!(starts(&slots), vec![at(10, 30), at(11, 0), at(11, 30)]);
}

#[test]
fn test_weekly_shift_limits_multi_day_search() {
    let tuesdays_only = StaffCalendar::new(
        StaffId::new(1),
        vec![WeeklyShift::new(Weekday::Tue, time(9, 0), time(12, 0)).unwrap()],
    );
    let query = AvailabilityQuery {
        days: 7,
        ..query(60)
    };

    let slots = available_slots(&query, &[tuesdays_only]).unwrap();

    assert_eq!(slots.len(), 5);
    assert!(slots.iter().all(|slot| slot.start.weekday() == Weekday::Tue));
}

#[test]
fn test_no_staff_means_no_slots() {
    let slots = available_slots(&query(30), &[]).unwrap();
    assert!(slots.is_empty());
}

#[test]
fn test_empty_search_window_is_rejected() {
    let query = AvailabilityQuery {
        days: 0,
        ..query(30)
    };
    assert_eq!(
        available_slots(&query, &[]).unwrap_err(),
        ScheduleError::NoDays
    );
}
