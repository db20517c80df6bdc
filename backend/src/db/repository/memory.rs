//! In-memory repositories that record every call, for service tests.

use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};

use crate::db::models::{NewScheduleEntry, ScheduleEntry, ScheduleState, TeamMember, WorkingHours};
use crate::db::repository::{ScheduleRepository, TeamRepository, WorkingHoursRepository};
use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    ListActiveMembers,
    ListActiveDays,
    FindDay(i64),
    FindState,
    UpdateState(ScheduleState),
    FindByDateRange(NaiveDate, NaiveDate),
    FindByDate(NaiveDate),
    FindEntry(i64),
    Create(NewScheduleEntry),
    Update(i64),
    Delete(i64),
}

#[derive(Default)]
struct Inner {
    members: Vec<TeamMember>,
    hours: Vec<WorkingHours>,
    entries: Vec<ScheduleEntry>,
    state: Option<ScheduleState>,
    next_id: i64,
    calls: Vec<Call>,
    failures: HashSet<&'static str>,
}

#[derive(Default)]
pub struct InMemoryStore {
    inner: Mutex<Inner>,
}

fn epoch() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2020, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

impl InMemoryStore {
    pub fn new() -> Self {
        let store = Self::default();
        store.inner.lock().unwrap().next_id = 1000;
        store
    }

    pub fn add_member(&self, id: i64, name: &str, active: bool) {
        self.inner.lock().unwrap().members.push(TeamMember {
            id,
            name: name.to_string(),
            slack_handle: None,
            active,
            date_added: epoch(),
        });
    }

    /// Configures the given weekdays (0 = Monday) as active, 09:00-17:00.
    pub fn set_working_days(&self, days: &[i64]) {
        let mut inner = self.inner.lock().unwrap();
        inner.hours = (0..7)
            .map(|d| WorkingHours {
                id: d + 1,
                day_of_week: d,
                start_time: "09:00".to_string(),
                end_time: "17:00".to_string(),
                active: days.contains(&d),
            })
            .collect();
    }

    pub fn set_hours(&self, day_of_week: i64, start: &str, end: &str) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(h) = inner.hours.iter_mut().find(|h| h.day_of_week == day_of_week) {
            h.start_time = start.to_string();
            h.end_time = end.to_string();
        }
    }

    pub fn set_state(&self, state: ScheduleState) {
        self.inner.lock().unwrap().state = Some(state);
    }

    pub fn state(&self) -> Option<ScheduleState> {
        self.inner.lock().unwrap().state.clone()
    }

    /// Seeds an entry without recording a call.
    pub fn insert_entry(&self, id: i64, date: NaiveDate, member_id: i64, is_override: bool) {
        self.inner.lock().unwrap().entries.push(ScheduleEntry {
            id,
            date,
            team_member_id: member_id,
            start_time: "09:00".to_string(),
            end_time: "17:00".to_string(),
            is_manual_override: is_override,
            original_team_member_id: None,
            team_member_name: None,
            team_member_slack_handle: None,
        });
    }

    pub fn entries(&self) -> Vec<ScheduleEntry> {
        let mut entries = self.inner.lock().unwrap().entries.clone();
        entries.sort_by(|a, b| a.date.cmp(&b.date).then(a.start_time.cmp(&b.start_time)));
        entries
    }

    pub fn calls(&self) -> Vec<Call> {
        self.inner.lock().unwrap().calls.clone()
    }

    pub fn deleted_ids(&self) -> Vec<i64> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Delete(id) => Some(id),
                _ => None,
            })
            .collect()
    }

    pub fn created(&self) -> Vec<NewScheduleEntry> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Create(entry) => Some(entry),
                _ => None,
            })
            .collect()
    }

    /// Makes the named operation fail from now on.
    pub fn fail_on(&self, operation: &'static str) {
        self.inner.lock().unwrap().failures.insert(operation);
    }

    fn record(&self, call: Call, operation: &'static str) -> AppResult<std::sync::MutexGuard<'_, Inner>> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(call);
        if inner.failures.contains(operation) {
            return Err(AppError::Internal(anyhow::anyhow!(
                "database connection failed"
            )));
        }
        Ok(inner)
    }
}

#[async_trait]
impl TeamRepository for InMemoryStore {
    async fn list_all(&self) -> AppResult<Vec<TeamMember>> {
        Ok(self.inner.lock().unwrap().members.clone())
    }

    async fn find_by_id(&self, id: i64) -> AppResult<Option<TeamMember>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.members.iter().find(|m| m.id == id).cloned())
    }

    async fn list_active(&self) -> AppResult<Vec<TeamMember>> {
        let inner = self.record(Call::ListActiveMembers, "list_active_members")?;
        Ok(inner.members.iter().filter(|m| m.active).cloned().collect())
    }

    async fn create(
        &self,
        name: &str,
        slack_handle: Option<&str>,
        active: bool,
    ) -> AppResult<TeamMember> {
        let mut inner = self.inner.lock().unwrap();
        inner.next_id += 1;
        let member = TeamMember {
            id: inner.next_id,
            name: name.to_string(),
            slack_handle: slack_handle.map(str::to_string),
            active,
            date_added: epoch(),
        };
        inner.members.push(member.clone());
        Ok(member)
    }

    async fn update(&self, member: &TeamMember) -> AppResult<TeamMember> {
        let mut inner = self.inner.lock().unwrap();
        let slot = inner
            .members
            .iter_mut()
            .find(|m| m.id == member.id)
            .ok_or_else(|| AppError::NotFound(format!("team member {}", member.id)))?;
        *slot = member.clone();
        Ok(member.clone())
    }

    async fn delete(&self, id: i64) -> AppResult<()> {
        let mut inner = self.inner.lock().unwrap();
        let before = inner.members.len();
        inner.members.retain(|m| m.id != id);
        if inner.members.len() == before {
            return Err(AppError::NotFound(format!("team member {}", id)));
        }
        Ok(())
    }

    async fn count(&self) -> AppResult<i64> {
        Ok(self.inner.lock().unwrap().members.len() as i64)
    }
}

#[async_trait]
impl WorkingHoursRepository for InMemoryStore {
    async fn list_all(&self) -> AppResult<Vec<WorkingHours>> {
        Ok(self.inner.lock().unwrap().hours.clone())
    }

    async fn find_by_day(&self, day_of_week: i64) -> AppResult<Option<WorkingHours>> {
        let inner = self.record(Call::FindDay(day_of_week), "find_day")?;
        Ok(inner
            .hours
            .iter()
            .find(|h| h.day_of_week == day_of_week)
            .cloned())
    }

    async fn list_active(&self) -> AppResult<Vec<WorkingHours>> {
        let inner = self.record(Call::ListActiveDays, "list_active_days")?;
        Ok(inner.hours.iter().filter(|h| h.active).cloned().collect())
    }

    async fn update(&self, hours: &WorkingHours) -> AppResult<WorkingHours> {
        let mut inner = self.inner.lock().unwrap();
        let slot = inner
            .hours
            .iter_mut()
            .find(|h| h.day_of_week == hours.day_of_week)
            .ok_or_else(|| AppError::NotFound(format!("day {}", hours.day_of_week)))?;
        *slot = hours.clone();
        Ok(hours.clone())
    }
}

#[async_trait]
impl ScheduleRepository for InMemoryStore {
    async fn find_by_date_range(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> AppResult<Vec<ScheduleEntry>> {
        let inner = self.record(Call::FindByDateRange(from, to), "find_by_date_range")?;
        let mut entries: Vec<ScheduleEntry> = inner
            .entries
            .iter()
            .filter(|e| e.date >= from && e.date <= to)
            .cloned()
            .collect();
        entries.sort_by(|a, b| a.date.cmp(&b.date));
        Ok(entries)
    }

    async fn find_by_date(&self, date: NaiveDate) -> AppResult<Vec<ScheduleEntry>> {
        let inner = self.record(Call::FindByDate(date), "find_by_date")?;
        Ok(inner
            .entries
            .iter()
            .filter(|e| e.date == date)
            .cloned()
            .collect())
    }

    async fn find_by_id(&self, id: i64) -> AppResult<Option<ScheduleEntry>> {
        let inner = self.record(Call::FindEntry(id), "find_entry")?;
        Ok(inner.entries.iter().find(|e| e.id == id).cloned())
    }

    async fn create(&self, entry: &NewScheduleEntry) -> AppResult<ScheduleEntry> {
        let mut inner = self.record(Call::Create(entry.clone()), "create")?;
        inner.next_id += 1;
        let created = ScheduleEntry {
            id: inner.next_id,
            date: entry.date,
            team_member_id: entry.team_member_id,
            start_time: entry.start_time.clone(),
            end_time: entry.end_time.clone(),
            is_manual_override: entry.is_manual_override,
            original_team_member_id: entry.original_team_member_id,
            team_member_name: None,
            team_member_slack_handle: None,
        };
        inner.entries.push(created.clone());
        Ok(created)
    }

    async fn update(&self, entry: &ScheduleEntry) -> AppResult<()> {
        let mut inner = self.record(Call::Update(entry.id), "update")?;
        let slot = inner
            .entries
            .iter_mut()
            .find(|e| e.id == entry.id)
            .ok_or_else(|| AppError::NotFound(format!("schedule entry {}", entry.id)))?;
        *slot = entry.clone();
        Ok(())
    }

    async fn delete(&self, id: i64) -> AppResult<()> {
        let mut inner = self.record(Call::Delete(id), "delete")?;
        let before = inner.entries.len();
        inner.entries.retain(|e| e.id != id);
        if inner.entries.len() == before {
            return Err(AppError::NotFound(format!("schedule entry {}", id)));
        }
        Ok(())
    }

    async fn has_future_entries(&self, team_member_id: i64, today: NaiveDate) -> AppResult<bool> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .entries
            .iter()
            .any(|e| e.team_member_id == team_member_id && e.date > today))
    }

    async fn find_state(&self) -> AppResult<Option<ScheduleState>> {
        let inner = self.record(Call::FindState, "find_state")?;
        Ok(inner.state.clone())
    }

    async fn update_state(&self, state: &ScheduleState) -> AppResult<()> {
        let mut inner = self.record(Call::UpdateState(state.clone()), "update_state")?;
        inner.state = Some(state.clone());
        Ok(())
    }
}
