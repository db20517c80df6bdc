use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{Datelike, Duration, NaiveDate};
use tracing::info;

use crate::db::models::{
    DashboardData, DayView, NewScheduleEntry, ScheduleEntry, ScheduleEntryForm, TakeoverForm,
    WeekView,
};
use crate::db::{ScheduleRepository, TeamRepository, WorkingHoursRepository};
use crate::error::{AppError, AppResult};
use crate::services::clock::Clock;
use crate::services::rotation::weekday_number;

/// Upper bound for `upcoming_entries`.
pub const MAX_UPCOMING_DAYS: i64 = 366;

/// Read side of the schedule plus the manual override workflow.
pub struct ScheduleService {
    schedule: Arc<dyn ScheduleRepository>,
    team: Arc<dyn TeamRepository>,
    hours: Arc<dyn WorkingHoursRepository>,
    clock: Arc<dyn Clock>,
}

fn check_entry_id(id: i64) -> AppResult<()> {
    if id <= 0 {
        return Err(AppError::BadRequest(format!(
            "invalid schedule entry ID: {}",
            id
        )));
    }
    Ok(())
}

/// Returns the parsed date of a valid form.
fn check_form(form: &ScheduleEntryForm) -> AppResult<NaiveDate> {
    let errors = form.validate();
    if !errors.is_empty() {
        return Err(AppError::Validation(errors.join(", ")));
    }
    form.parsed_date()
        .ok_or_else(|| AppError::Validation("Date must be in YYYY-MM-DD format".to_string()))
}

/// Monday of the week containing `date`.
pub fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.weekday().num_days_from_monday()))
}

impl ScheduleService {
    pub fn new(
        schedule: Arc<dyn ScheduleRepository>,
        team: Arc<dyn TeamRepository>,
        hours: Arc<dyn WorkingHoursRepository>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            schedule,
            team,
            hours,
            clock,
        }
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    pub async fn entries_in_range(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> AppResult<Vec<ScheduleEntry>> {
        if from > to {
            return Err(AppError::BadRequest(format!(
                "invalid date range: {} is after {}",
                from, to
            )));
        }
        self.schedule.find_by_date_range(from, to).await
    }

    pub async fn get_entry(&self, id: i64) -> AppResult<ScheduleEntry> {
        check_entry_id(id)?;
        self.schedule
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("schedule entry with ID {} not found", id)))
    }

    /// Entries from today through `days` days ahead.
    pub async fn upcoming_entries(&self, days: i64) -> AppResult<Vec<ScheduleEntry>> {
        if !(1..=MAX_UPCOMING_DAYS).contains(&days) {
            return Err(AppError::BadRequest(format!(
                "days must be between 1 and {}",
                MAX_UPCOMING_DAYS
            )));
        }
        let today = self.clock.today();
        self.schedule
            .find_by_date_range(today, today + Duration::days(days))
            .await
    }

    /// Seven consecutive days starting at `start`.
    pub async fn week_view(&self, start: NaiveDate) -> AppResult<WeekView> {
        let end = start + Duration::days(6);
        let today = self.clock.today();

        let mut by_date: BTreeMap<NaiveDate, Vec<ScheduleEntry>> = BTreeMap::new();
        for entry in self.schedule.find_by_date_range(start, end).await? {
            by_date.entry(entry.date).or_default().push(entry);
        }

        let days = (0..7)
            .map(|offset| {
                let date = start + Duration::days(offset);
                DayView {
                    date,
                    entries: by_date.remove(&date).unwrap_or_default(),
                    is_today: date == today,
                }
            })
            .collect();

        Ok(WeekView {
            start_date: start,
            end_date: end,
            days,
        })
    }

    pub async fn dashboard(&self) -> AppResult<DashboardData> {
        let monday = week_start(self.clock.today());
        let sunday = monday + Duration::days(6);
        let next_start = sunday + Duration::days(1);
        let next_end = next_start + Duration::days(13);

        let current_week = self.schedule.find_by_date_range(monday, sunday).await?;
        let next_weeks = self
            .schedule
            .find_by_date_range(next_start, next_end)
            .await?;
        let team_count = self.team.count().await?;
        let active_days = self.hours.list_active().await?.len();
        let last_generated = self
            .schedule
            .find_state()
            .await?
            .map(|s| s.last_generation_date);

        Ok(DashboardData {
            current_week,
            next_weeks,
            team_count,
            active_days,
            last_generated,
        })
    }

    /// Replaces entry `entry_id` with a manual override.
    ///
    /// The member the rotation chose is kept in `original_team_member_id` so
    /// [`Self::remove_manual_override`] can restore it, including when an
    /// existing override is replaced.
    pub async fn create_manual_override(
        &self,
        entry_id: i64,
        form: &ScheduleEntryForm,
    ) -> AppResult<ScheduleEntry> {
        check_entry_id(entry_id)?;
        let date = check_form(form)?;
        self.ensure_member_exists(form.team_member_id).await?;

        let existing = self.get_entry(entry_id).await?;
        if date != existing.date {
            return Err(AppError::BadRequest(format!(
                "override date {} does not match entry date {}",
                date, existing.date
            )));
        }
        let original_team_member_id = if existing.is_auto() {
            Some(existing.team_member_id)
        } else {
            existing.original_team_member_id
        };

        self.schedule.delete(existing.id).await?;

        let created = self
            .schedule
            .create(&NewScheduleEntry {
                date,
                team_member_id: form.team_member_id,
                start_time: form.start_time.trim().to_string(),
                end_time: form.end_time.trim().to_string(),
                is_manual_override: true,
                original_team_member_id,
            })
            .await?;

        info!(
            "Manual override on {}: member {} replaces {:?}",
            created.date, created.team_member_id, original_team_member_id
        );
        Ok(created)
    }

    /// Hands an existing shift to another member, keeping its date and times.
    pub async fn takeover(&self, form: &TakeoverForm) -> AppResult<ScheduleEntry> {
        let errors = form.validate();
        if !errors.is_empty() {
            return Err(AppError::Validation(errors.join(", ")));
        }

        let entry = self.get_entry(form.schedule_entry_id).await?;
        if let Some(reason) = form.reason.as_deref().filter(|r| !r.trim().is_empty()) {
            info!("Takeover of entry {} requested: {}", entry.id, reason.trim());
        }

        let override_form = ScheduleEntryForm {
            date: entry.formatted_date(),
            team_member_id: form.new_team_member_id,
            start_time: entry.start_time.clone(),
            end_time: entry.end_time.clone(),
        };
        self.create_manual_override(entry.id, &override_form).await
    }

    /// Edits an entry in place. Any edit turns it into a manual override.
    pub async fn update_entry(&self, id: i64, form: &ScheduleEntryForm) -> AppResult<ScheduleEntry> {
        check_entry_id(id)?;
        let date = check_form(form)?;

        let mut entry = self.get_entry(id).await?;
        self.ensure_member_exists(form.team_member_id).await?;
        if date != entry.date && !self.schedule.find_by_date(date).await?.is_empty() {
            return Err(AppError::Conflict(format!(
                "a schedule entry already exists on {}",
                date
            )));
        }

        if entry.is_auto() {
            entry.original_team_member_id = Some(entry.team_member_id);
        }
        entry.date = date;
        entry.team_member_id = form.team_member_id;
        entry.start_time = form.start_time.trim().to_string();
        entry.end_time = form.end_time.trim().to_string();
        entry.is_manual_override = true;

        self.schedule.update(&entry).await?;
        self.get_entry(id).await
    }

    /// Deletes an override and puts the original member back on that date.
    pub async fn remove_manual_override(&self, id: i64) -> AppResult<ScheduleEntry> {
        let entry = self.get_entry(id).await?;
        if entry.is_auto() {
            return Err(AppError::BadRequest(
                "can only remove manual overrides".to_string(),
            ));
        }
        let original = entry.original_team_member_id.ok_or_else(|| {
            AppError::BadRequest("missing original team member ID".to_string())
        })?;

        let day = weekday_number(entry.date);
        let hours = self.hours.find_by_day(day).await?.ok_or_else(|| {
            AppError::NotFound(format!("working hours for day {} not found", day))
        })?;

        self.schedule.delete(entry.id).await?;
        let restored = self
            .schedule
            .create(&NewScheduleEntry::auto(
                entry.date,
                original,
                &hours.start_time,
                &hours.end_time,
            ))
            .await?;

        info!(
            "Removed override {} on {}; member {} restored",
            id, entry.date, original
        );
        Ok(restored)
    }

    async fn ensure_member_exists(&self, id: i64) -> AppResult<()> {
        if self.team.find_by_id(id).await?.is_none() {
            return Err(AppError::NotFound(format!(
                "team member with ID {} not found",
                id
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{ScheduleState, TeamMember};
    use crate::db::repository::test_pool;
    use crate::db::{SqliteScheduleRepository, SqliteTeamRepository, SqliteWorkingHoursRepository};
    use crate::services::clock::FixedClock;
    use chrono::{TimeZone, Utc};

    struct Fixture {
        svc: ScheduleService,
        schedule: Arc<SqliteScheduleRepository>,
        alice: TeamMember,
        bob: TeamMember,
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    /// Today is Wednesday 2024-01-10.
    async fn fixture() -> Fixture {
        let pool = test_pool().await;
        let team = Arc::new(SqliteTeamRepository::new(pool.clone()));
        let schedule = Arc::new(SqliteScheduleRepository::new(pool.clone()));
        let alice = team.create("Alice", Some("@alice"), true).await.unwrap();
        let bob = team.create("Bob", None, true).await.unwrap();

        let svc = ScheduleService::new(
            schedule.clone(),
            team,
            Arc::new(SqliteWorkingHoursRepository::new(pool)),
            Arc::new(FixedClock(Utc.with_ymd_and_hms(2024, 1, 10, 8, 0, 0).unwrap())),
        );
        Fixture {
            svc,
            schedule,
            alice,
            bob,
        }
    }

    async fn auto_entry(f: &Fixture, on: NaiveDate, member: i64) -> ScheduleEntry {
        f.schedule
            .create(&NewScheduleEntry::auto(on, member, "09:00", "17:00"))
            .await
            .unwrap()
    }

    fn entry_form(on: NaiveDate, member: i64, start: &str, end: &str) -> ScheduleEntryForm {
        ScheduleEntryForm {
            date: on.format("%Y-%m-%d").to_string(),
            team_member_id: member,
            start_time: start.to_string(),
            end_time: end.to_string(),
        }
    }

    #[test]
    fn week_start_is_monday() {
        assert_eq!(week_start(date(2024, 1, 10)), date(2024, 1, 8));
        assert_eq!(week_start(date(2024, 1, 8)), date(2024, 1, 8));
        assert_eq!(week_start(date(2024, 1, 14)), date(2024, 1, 8));
    }

    #[tokio::test]
    async fn override_records_the_auto_member_and_restores_it() {
        let f = fixture().await;
        let auto = auto_entry(&f, date(2024, 1, 11), f.alice.id).await;

        let over = f
            .svc
            .create_manual_override(
                auto.id,
                &entry_form(date(2024, 1, 11), f.bob.id, "10:00", "15:00"),
            )
            .await
            .unwrap();

        assert!(over.is_manual_override);
        assert_eq!(over.team_member_id, f.bob.id);
        assert_eq!(over.original_team_member_id, Some(f.alice.id));
        assert_eq!(over.team_member_name.as_deref(), Some("Bob"));
        assert!(f.schedule.find_by_id(auto.id).await.unwrap().is_none());

        let restored = f.svc.remove_manual_override(over.id).await.unwrap();
        assert!(restored.is_auto());
        assert_eq!(restored.team_member_id, f.alice.id);
        // Thursday's default hours, not the override's.
        assert_eq!((restored.start_time.as_str(), restored.end_time.as_str()), ("09:00", "17:00"));

        let on_day = f.svc.entries_in_range(date(2024, 1, 11), date(2024, 1, 11)).await.unwrap();
        assert_eq!(on_day.len(), 1);
    }

    #[tokio::test]
    async fn replacing_an_override_keeps_the_original_member() {
        let f = fixture().await;
        let auto = auto_entry(&f, date(2024, 1, 12), f.alice.id).await;
        let first = f
            .svc
            .create_manual_override(auto.id, &entry_form(date(2024, 1, 12), f.bob.id, "09:00", "17:00"))
            .await
            .unwrap();

        let second = f
            .svc
            .create_manual_override(first.id, &entry_form(date(2024, 1, 12), f.alice.id, "12:00", "17:00"))
            .await
            .unwrap();

        assert_eq!(second.original_team_member_id, Some(f.alice.id));
        let on_day = f.svc.entries_in_range(date(2024, 1, 12), date(2024, 1, 12)).await.unwrap();
        assert_eq!(on_day.len(), 1);
    }

    #[tokio::test]
    async fn override_requires_valid_form_and_member() {
        let f = fixture().await;
        let auto = auto_entry(&f, date(2024, 1, 11), f.alice.id).await;

        let err = f
            .svc
            .create_manual_override(auto.id, &entry_form(date(2024, 1, 11), f.bob.id, "17:00", "09:00"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let err = f
            .svc
            .create_manual_override(auto.id, &entry_form(date(2024, 1, 11), 999, "09:00", "17:00"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        // Nothing was touched.
        assert!(f.schedule.find_by_id(auto.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn takeover_keeps_date_and_times() {
        let f = fixture().await;
        let auto = auto_entry(&f, date(2024, 1, 15), f.alice.id).await;

        let taken = f
            .svc
            .takeover(&TakeoverForm {
                schedule_entry_id: auto.id,
                new_team_member_id: f.bob.id,
                reason: Some("swap".to_string()),
            })
            .await
            .unwrap();

        assert_eq!(taken.date, date(2024, 1, 15));
        assert_eq!(taken.start_time, "09:00");
        assert_eq!(taken.team_member_id, f.bob.id);
        assert_eq!(taken.original_team_member_id, Some(f.alice.id));
    }

    #[tokio::test]
    async fn editing_an_entry_marks_it_as_override() {
        let f = fixture().await;
        let auto = auto_entry(&f, date(2024, 1, 16), f.alice.id).await;

        let edited = f
            .svc
            .update_entry(auto.id, &entry_form(date(2024, 1, 16), f.bob.id, "08:00", "12:00"))
            .await
            .unwrap();

        assert_eq!(edited.id, auto.id);
        assert!(edited.is_manual_override);
        assert_eq!(edited.original_team_member_id, Some(f.alice.id));
        assert_eq!(edited.start_time, "08:00");
    }

    #[tokio::test]
    async fn override_cannot_move_to_another_date() {
        let f = fixture().await;
        let thursday = auto_entry(&f, date(2024, 1, 11), f.alice.id).await;
        auto_entry(&f, date(2024, 1, 12), f.bob.id).await;

        let err = f
            .svc
            .create_manual_override(
                thursday.id,
                &entry_form(date(2024, 1, 12), f.bob.id, "09:00", "17:00"),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));

        assert!(f.schedule.find_by_id(thursday.id).await.unwrap().is_some());
        let friday = f.svc.entries_in_range(date(2024, 1, 12), date(2024, 1, 12)).await.unwrap();
        assert_eq!(friday.len(), 1);
    }

    #[tokio::test]
    async fn editing_onto_an_occupied_date_conflicts() {
        let f = fixture().await;
        let monday = auto_entry(&f, date(2024, 1, 15), f.alice.id).await;
        auto_entry(&f, date(2024, 1, 16), f.bob.id).await;

        let err = f
            .svc
            .update_entry(monday.id, &entry_form(date(2024, 1, 16), f.bob.id, "09:00", "17:00"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        // A free date is fine.
        let moved = f
            .svc
            .update_entry(monday.id, &entry_form(date(2024, 1, 17), f.bob.id, "09:00", "17:00"))
            .await
            .unwrap();
        assert_eq!(moved.date, date(2024, 1, 17));
    }

    #[tokio::test]
    async fn removing_a_non_override_is_refused() {
        let f = fixture().await;
        let auto = auto_entry(&f, date(2024, 1, 16), f.alice.id).await;

        assert!(matches!(
            f.svc.remove_manual_override(auto.id).await,
            Err(AppError::BadRequest(_))
        ));
        assert!(matches!(
            f.svc.remove_manual_override(0).await,
            Err(AppError::BadRequest(_))
        ));
        assert!(matches!(
            f.svc.get_entry(12345).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn week_view_groups_by_day() {
        let f = fixture().await;
        auto_entry(&f, date(2024, 1, 8), f.alice.id).await;
        auto_entry(&f, date(2024, 1, 10), f.bob.id).await;
        auto_entry(&f, date(2024, 1, 15), f.alice.id).await;

        let week = f.svc.week_view(date(2024, 1, 8)).await.unwrap();

        assert_eq!(week.end_date, date(2024, 1, 14));
        assert_eq!(week.days.len(), 7);
        assert_eq!(week.days[0].entries.len(), 1);
        assert!(week.days[1].entries.is_empty());
        assert!(week.days[2].is_today);
        assert_eq!(week.days[2].entries[0].team_member_id, f.bob.id);
        assert_eq!(week.days.iter().filter(|d| d.is_today).count(), 1);
    }

    #[tokio::test]
    async fn dashboard_splits_current_and_next_weeks() {
        let f = fixture().await;
        auto_entry(&f, date(2024, 1, 8), f.alice.id).await;
        auto_entry(&f, date(2024, 1, 14), f.bob.id).await;
        auto_entry(&f, date(2024, 1, 15), f.alice.id).await;
        auto_entry(&f, date(2024, 1, 28), f.bob.id).await;
        auto_entry(&f, date(2024, 1, 29), f.alice.id).await;

        let empty = f.svc.dashboard().await.unwrap();
        assert_eq!(empty.current_week.len(), 2);
        assert_eq!(empty.next_weeks.len(), 2);
        assert_eq!(empty.team_count, 2);
        assert_eq!(empty.active_days, 5);
        assert!(empty.last_generated.is_none());

        let generated = Utc.with_ymd_and_hms(2024, 1, 9, 6, 0, 0).unwrap();
        f.schedule
            .update_state(&ScheduleState {
                id: 1,
                last_generation_date: generated,
            })
            .await
            .unwrap();
        assert_eq!(f.svc.dashboard().await.unwrap().last_generated, Some(generated));
    }

    #[tokio::test]
    async fn range_queries() {
        let f = fixture().await;
        auto_entry(&f, date(2024, 1, 10), f.alice.id).await;
        auto_entry(&f, date(2024, 1, 17), f.bob.id).await;
        auto_entry(&f, date(2024, 1, 18), f.bob.id).await;

        assert_eq!(f.svc.upcoming_entries(7).await.unwrap().len(), 2);
        assert!(matches!(
            f.svc.upcoming_entries(0).await,
            Err(AppError::BadRequest(_))
        ));
        assert!(matches!(
            f.svc.entries_in_range(date(2024, 2, 1), date(2024, 1, 1)).await,
            Err(AppError::BadRequest(_))
        ));
    }
}
