use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::working_hours::validate_shift_times;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

// ============================================================================
// Schedule entries
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct ScheduleEntry {
    pub id: i64,
    pub date: NaiveDate,
    pub team_member_id: i64,
    pub start_time: String,
    pub end_time: String,
    pub is_manual_override: bool,
    /// The auto-assigned member an override replaced.
    pub original_team_member_id: Option<i64>,
    /// Joined from `team_members`.
    #[sqlx(default)]
    pub team_member_name: Option<String>,
    #[sqlx(default)]
    pub team_member_slack_handle: Option<String>,
}

impl ScheduleEntry {
    pub fn formatted_date(&self) -> String {
        self.date.format(DATE_FORMAT).to_string()
    }

    pub fn is_auto(&self) -> bool {
        !self.is_manual_override
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewScheduleEntry {
    pub date: NaiveDate,
    pub team_member_id: i64,
    pub start_time: String,
    pub end_time: String,
    pub is_manual_override: bool,
    pub original_team_member_id: Option<i64>,
}

impl NewScheduleEntry {
    /// An entry produced by the rotation rather than by a person.
    pub fn auto(date: NaiveDate, team_member_id: i64, start_time: &str, end_time: &str) -> Self {
        Self {
            date,
            team_member_id,
            start_time: start_time.to_string(),
            end_time: end_time.to_string(),
            is_manual_override: false,
            original_team_member_id: None,
        }
    }
}

/// Singleton row tracking when the schedule was last generated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleState {
    pub id: i64,
    pub last_generation_date: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct ScheduleStateRow {
    pub id: i64,
    pub last_generation_date: NaiveDateTime,
}

impl From<ScheduleStateRow> for ScheduleState {
    fn from(row: ScheduleStateRow) -> Self {
        Self {
            id: row.id,
            last_generation_date: DateTime::<Utc>::from_naive_utc_and_offset(
                row.last_generation_date,
                Utc,
            ),
        }
    }
}

// ============================================================================
// Generation
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    #[serde(default = "default_force")]
    pub force: bool,
}

fn default_force() -> bool {
    true
}

/// Outcome of a generation run. `success = false` is a business failure
/// (nothing to schedule), not a system error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationResult {
    pub success: bool,
    pub message: String,
    pub entries_created: usize,
    pub generation_date: Option<DateTime<Utc>>,
    pub next_generation_due: Option<DateTime<Utc>>,
}

impl GenerationResult {
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            entries_created: 0,
            generation_date: None,
            next_generation_due: None,
        }
    }
}

// ============================================================================
// Forms
// ============================================================================

/// Payload for manual overrides and entry edits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleEntryForm {
    /// `YYYY-MM-DD`
    pub date: String,
    pub team_member_id: i64,
    /// `HH:MM`
    pub start_time: String,
    pub end_time: String,
}

impl ScheduleEntryForm {
    pub fn parsed_date(&self) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(self.date.trim(), DATE_FORMAT).ok()
    }

    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.date.trim().is_empty() {
            errors.push("Date is required".to_string());
        } else if self.parsed_date().is_none() {
            errors.push("Date must be in YYYY-MM-DD format".to_string());
        }

        if self.team_member_id <= 0 {
            errors.push("Team member must be selected".to_string());
        }

        errors.extend(validate_shift_times(&self.start_time, &self.end_time));
        errors
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TakeoverForm {
    pub schedule_entry_id: i64,
    pub new_team_member_id: i64,
    #[serde(default)]
    pub reason: Option<String>,
}

impl TakeoverForm {
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.schedule_entry_id <= 0 {
            errors.push("Please select a schedule entry to take over".to_string());
        }
        if self.new_team_member_id <= 0 {
            errors.push("Please select a team member to take over the shift".to_string());
        }
        errors
    }
}

// ============================================================================
// Views
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct DayView {
    pub date: NaiveDate,
    pub entries: Vec<ScheduleEntry>,
    pub is_today: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct WeekView {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub days: Vec<DayView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardData {
    pub current_week: Vec<ScheduleEntry>,
    pub next_weeks: Vec<ScheduleEntry>,
    pub team_count: i64,
    pub active_days: usize,
    /// `None` until the first generation run.
    pub last_generated: Option<DateTime<Utc>>,
}
