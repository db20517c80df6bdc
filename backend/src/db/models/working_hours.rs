use serde::{Deserialize, Serialize};
use sqlx::FromRow;

pub const DAY_NAMES: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

/// Shift configuration for one weekday. `day_of_week` is 0 = Monday .. 6 = Sunday.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct WorkingHours {
    pub id: i64,
    pub day_of_week: i64,
    pub start_time: String,
    pub end_time: String,
    pub active: bool,
}

impl WorkingHours {
    pub fn day_name(&self) -> &'static str {
        day_name(self.day_of_week)
    }
}

pub fn day_name(day_of_week: i64) -> &'static str {
    usize::try_from(day_of_week)
        .ok()
        .and_then(|d| DAY_NAMES.get(d).copied())
        .unwrap_or("Unknown")
}

pub fn is_valid_day_of_week(day_of_week: i64) -> bool {
    (0..=6).contains(&day_of_week)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkingHoursForm {
    pub day_of_week: i64,
    pub start_time: String,
    pub end_time: String,
    pub active: bool,
}

impl WorkingHoursForm {
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if !is_valid_day_of_week(self.day_of_week) {
            errors.push("Day of week must be between 0 (Monday) and 6 (Sunday)".to_string());
        }

        // Times only matter for days that produce shifts
        if self.active {
            errors.extend(validate_shift_times(&self.start_time, &self.end_time));
        }

        errors
    }
}

/// Validates a start/end pair in `HH:MM` form with start strictly before end.
pub fn validate_shift_times(start: &str, end: &str) -> Vec<String> {
    let mut errors = Vec::new();
    let start_minutes = time_to_minutes(start.trim());
    let end_minutes = time_to_minutes(end.trim());

    if start_minutes.is_none() {
        errors.push("Start time must be in HH:MM format (e.g., 09:00)".to_string());
    }
    if end_minutes.is_none() {
        errors.push("End time must be in HH:MM format (e.g., 17:00)".to_string());
    }
    if let (Some(s), Some(e)) = (start_minutes, end_minutes) {
        if s >= e {
            errors.push("Start time must be before end time".to_string());
        }
    }

    errors
}

pub fn is_valid_time_format(value: &str) -> bool {
    time_to_minutes(value).is_some()
}

/// Minutes since midnight for a strict `HH:MM` string.
fn time_to_minutes(value: &str) -> Option<u32> {
    let (hours, minutes) = value.split_once(':')?;
    if hours.len() != 2 || minutes.len() != 2 {
        return None;
    }
    if !hours.bytes().chain(minutes.bytes()).all(|b| b.is_ascii_digit()) {
        return None;
    }
    let h: u32 = hours.parse().ok()?;
    let m: u32 = minutes.parse().ok()?;
    (h <= 23 && m <= 59).then_some(h * 60 + m)
}
