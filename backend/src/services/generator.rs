use std::sync::Arc;

use chrono::{Datelike, Duration, Months, NaiveDate};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::db::models::{
    GenerationResult, NewScheduleEntry, ScheduleEntry, TeamMember, WorkingHours,
};
use crate::db::{ScheduleRepository, TeamRepository, WorkingHoursRepository};
use crate::error::AppError;
use crate::services::clock::Clock;
use crate::services::rotation::{assign, weekday_number};

/// Minimum time between two unforced generation runs.
pub const REGENERATION_INTERVAL_DAYS: i64 = 7;
/// How far ahead the schedule is generated.
pub const HORIZON_MONTHS: u32 = 3;

pub const UP_TO_DATE_MESSAGE: &str = "Schedule is up to date";

/// `today` plus [`HORIZON_MONTHS`]. Days past the end of the target month roll
/// into the following one, so Nov 30 gives Mar 2 (Mar 1 in leap years).
pub fn horizon_end(today: NaiveDate) -> Option<NaiveDate> {
    today
        .with_day(1)?
        .checked_add_months(Months::new(HORIZON_MONTHS))?
        .checked_add_signed(Duration::days(i64::from(today.day0())))
}

/// System failures during a generation run. Business failures (nothing to
/// schedule) are reported through an unsuccessful [`GenerationResult`] instead.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("failed to get schedule state: {0}")]
    State(#[source] AppError),

    #[error("failed to get existing entries: {0}")]
    ExistingEntries(#[source] AppError),

    #[error("failed to delete existing entry {id}: {source}")]
    Delete { id: i64, source: AppError },

    #[error("failed to check existing entries for date {date}: {source}")]
    DateLookup { date: NaiveDate, source: AppError },

    #[error("failed to create schedule entry for {date}: {source}")]
    Create { date: NaiveDate, source: AppError },

    #[error("failed to update schedule state: {0}")]
    UpdateState(#[source] AppError),

    #[error("generation horizon starting {0} is out of range")]
    Horizon(NaiveDate),
}

impl From<GenerationError> for AppError {
    fn from(err: GenerationError) -> Self {
        AppError::Internal(anyhow::Error::new(err))
    }
}

/// A calendar date in scope for generation, with the shift it should get.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkingDate {
    pub date: NaiveDate,
    pub hours: WorkingHours,
}

/// Builds the rolling on-duty schedule.
///
/// - Skips the run when the last generation is less than a week old (unless forced).
/// - Deletes auto-generated entries from tomorrow to the end of the horizon,
///   leaving manual overrides alone.
/// - Creates one auto entry per active working day that has no override,
///   with the member chosen by [`crate::services::rotation`].
pub struct ScheduleGenerator {
    team: Arc<dyn TeamRepository>,
    hours: Arc<dyn WorkingHoursRepository>,
    schedule: Arc<dyn ScheduleRepository>,
    clock: Arc<dyn Clock>,
    run_lock: Mutex<()>,
}

impl ScheduleGenerator {
    pub fn new(
        team: Arc<dyn TeamRepository>,
        hours: Arc<dyn WorkingHoursRepository>,
        schedule: Arc<dyn ScheduleRepository>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            team,
            hours,
            schedule,
            clock,
            run_lock: Mutex::new(()),
        }
    }

    /// Runs a generation pass. Concurrent calls are serialised.
    pub async fn generate(&self, force: bool) -> Result<GenerationResult, GenerationError> {
        let _guard = self.run_lock.lock().await;
        info!("Starting schedule generation (force={})", force);

        let (members, working_days) = match self.validate_preconditions().await {
            Ok(inputs) => inputs,
            Err(message) => {
                warn!("Schedule generation not possible: {}", message);
                return Ok(GenerationResult::failed(message));
            }
        };

        let now = self.clock.now();
        let mut state = self
            .schedule
            .get_state(now)
            .await
            .map_err(GenerationError::State)?;

        let interval = Duration::days(REGENERATION_INTERVAL_DAYS);
        if !force && now - state.last_generation_date < interval {
            debug!(
                "Schedule generated at {}; next run due {}",
                state.last_generation_date,
                state.last_generation_date + interval
            );
            return Ok(GenerationResult {
                success: true,
                message: UP_TO_DATE_MESSAGE.to_string(),
                entries_created: 0,
                generation_date: Some(state.last_generation_date),
                next_generation_due: Some(state.last_generation_date + interval),
            });
        }

        let today = now.date_naive();
        let horizon_end = horizon_end(today).ok_or(GenerationError::Horizon(today))?;

        let deleted = self.cleanup_existing_entries(today, horizon_end).await?;
        let dates = self
            .collect_working_dates(today, horizon_end, &working_days)
            .await?;

        let mut entries_created = 0usize;
        for WorkingDate { date, hours } in dates {
            let Some(member) = assign(date, &members, &working_days) else {
                continue;
            };

            let entry = NewScheduleEntry::auto(date, member.id, &hours.start_time, &hours.end_time);
            self.schedule
                .create(&entry)
                .await
                .map_err(|source| GenerationError::Create { date, source })?;
            entries_created += 1;
        }

        state.last_generation_date = now;
        self.schedule
            .update_state(&state)
            .await
            .map_err(GenerationError::UpdateState)?;

        info!(
            "Generated {} schedule entries through {} ({} stale entries removed)",
            entries_created, horizon_end, deleted
        );

        Ok(GenerationResult {
            success: true,
            message: format!(
                "Successfully generated schedule with {} entries",
                entries_created
            ),
            entries_created,
            generation_date: Some(now),
            next_generation_due: Some(now + interval),
        })
    }

    /// Like `generate(false)`, but forces the run when no generation has ever
    /// been recorded so a fresh database gets a schedule right away.
    pub async fn generate_if_due(&self) -> Result<GenerationResult, GenerationError> {
        let never_generated = self
            .schedule
            .find_state()
            .await
            .map_err(GenerationError::State)?
            .is_none();
        self.generate(never_generated).await
    }

    /// Loads the rotation inputs, or a user-facing reason why there is nothing to schedule.
    pub async fn validate_preconditions(
        &self,
    ) -> Result<(Vec<TeamMember>, Vec<WorkingHours>), String> {
        let members = self
            .team
            .list_active()
            .await
            .map_err(|e| format!("failed to get active team members: {}", e))?;
        if members.is_empty() {
            return Err(
                "no active team members found. Add team members before generating schedule"
                    .to_string(),
            );
        }

        let working_days = self
            .hours
            .list_active()
            .await
            .map_err(|e| format!("failed to get active working days: {}", e))?;
        if working_days.is_empty() {
            return Err(
                "no active working days found. Configure working hours before generating schedule"
                    .to_string(),
            );
        }

        Ok((members, working_days))
    }

    /// Deletes auto entries in `[tomorrow, horizon_end]`. Today's entry and
    /// all overrides are kept. Returns the number of deleted entries.
    async fn cleanup_existing_entries(
        &self,
        today: NaiveDate,
        horizon_end: NaiveDate,
    ) -> Result<usize, GenerationError> {
        let tomorrow = today + Duration::days(1);
        let existing = self
            .schedule
            .find_by_date_range(tomorrow, horizon_end)
            .await
            .map_err(GenerationError::ExistingEntries)?;

        let mut deleted = 0;
        for entry in existing.iter().filter(|e| e.is_auto()) {
            self.schedule
                .delete(entry.id)
                .await
                .map_err(|source| GenerationError::Delete {
                    id: entry.id,
                    source,
                })?;
            debug!("Removed auto entry {} on {}", entry.id, entry.date);
            deleted += 1;
        }

        Ok(deleted)
    }

    /// Dates in `[start, horizon_end)` that fall on an active working day and
    /// carry no manual override, in chronological order. `start` is today,
    /// or tomorrow when today already has an entry of any kind.
    pub async fn collect_working_dates(
        &self,
        today: NaiveDate,
        horizon_end: NaiveDate,
        working_days: &[WorkingHours],
    ) -> Result<Vec<WorkingDate>, GenerationError> {
        let today_entries = self.entries_on(today).await?;
        let mut date = if today_entries.is_empty() {
            today
        } else {
            today + Duration::days(1)
        };

        let mut dates = Vec::new();
        while date < horizon_end {
            let weekday = weekday_number(date);
            let matched = working_days
                .iter()
                .find(|h| h.active && h.day_of_week == weekday);

            if let Some(hours) = matched {
                let has_override = self
                    .entries_on(date)
                    .await?
                    .iter()
                    .any(|e| e.is_manual_override);

                if has_override {
                    debug!("Keeping manual override on {}", date);
                } else {
                    dates.push(WorkingDate {
                        date,
                        hours: hours.clone(),
                    });
                }
            }

            date += Duration::days(1);
        }

        Ok(dates)
    }

    async fn entries_on(&self, date: NaiveDate) -> Result<Vec<ScheduleEntry>, GenerationError> {
        self.schedule
            .find_by_date(date)
            .await
            .map_err(|source| GenerationError::DateLookup { date, source })
    }
}
