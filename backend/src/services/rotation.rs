//! Stateless on-duty rotation.
//!
//! The member for a date is derived from the number of active working days
//! between a fixed Monday epoch and that date, so the same inputs always give
//! the same assignment and no rotation cursor is persisted between runs.
//!
//! The count runs over absolute elapsed working days. Changing the set of
//! active weekdays therefore shifts every later assignment, and short windows
//! are not guaranteed to be balanced per calendar week.

use chrono::{Datelike, NaiveDate};

use crate::db::models::{TeamMember, WorkingHours};

/// Reference Monday from which working days are counted.
pub fn rotation_epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(2000, 1, 3).expect("2000-01-03 is a valid date")
}

/// Weekday as 0 = Monday .. 6 = Sunday.
pub fn weekday_number(date: NaiveDate) -> i64 {
    i64::from(date.weekday().num_days_from_monday())
}

/// Set of weekdays that currently produce shifts, indexed 0 = Monday.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActiveWeekdays([bool; 7]);

impl ActiveWeekdays {
    pub fn from_working_hours(hours: &[WorkingHours]) -> Self {
        let mut days = [false; 7];
        for h in hours.iter().filter(|h| h.active) {
            if let Some(slot) = usize::try_from(h.day_of_week)
                .ok()
                .and_then(|d| days.get_mut(d))
            {
                *slot = true;
            }
        }
        Self(days)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.0[date.weekday().num_days_from_monday() as usize]
    }

    pub fn len(&self) -> usize {
        self.0.iter().filter(|active| **active).count()
    }
}

/// Active working days in `[rotation_epoch(), date)`; zero for dates on or before the epoch.
pub fn working_days_since_epoch(date: NaiveDate, active: &ActiveWeekdays) -> u64 {
    let elapsed = (date - rotation_epoch()).num_days();
    if elapsed <= 0 {
        return 0;
    }
    let elapsed = elapsed as u64;

    // The epoch is a Monday, so offset `d` within a week is weekday `d`.
    let full_weeks = elapsed / 7;
    let remainder = (elapsed % 7) as usize;
    let partial = active.0[..remainder].iter().filter(|a| **a).count() as u64;

    full_weeks * active.len() as u64 + partial
}

/// Index into `member_count` members for `date`.
pub fn member_index(date: NaiveDate, active: &ActiveWeekdays, member_count: usize) -> Option<usize> {
    if member_count == 0 {
        return None;
    }
    Some((working_days_since_epoch(date, active) % member_count as u64) as usize)
}

/// Member on duty for `date`, taken from `members` in the order given.
pub fn assign<'a>(
    date: NaiveDate,
    members: &'a [TeamMember],
    working_days: &[WorkingHours],
) -> Option<&'a TeamMember> {
    let active = ActiveWeekdays::from_working_hours(working_days);
    member_index(date, &active, members.len()).and_then(|i| members.get(i))
}
