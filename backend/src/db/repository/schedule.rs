use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::SqlitePool;

use crate::db::models::{NewScheduleEntry, ScheduleEntry, ScheduleState, ScheduleStateRow};
use crate::error::{AppError, AppResult};

pub const SCHEDULE_STATE_ID: i64 = 1;

#[async_trait]
pub trait ScheduleRepository: Send + Sync {
    /// Entries with `from <= date <= to`, ordered by date then start time.
    async fn find_by_date_range(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> AppResult<Vec<ScheduleEntry>>;

    async fn find_by_date(&self, date: NaiveDate) -> AppResult<Vec<ScheduleEntry>> {
        self.find_by_date_range(date, date).await
    }

    async fn find_by_id(&self, id: i64) -> AppResult<Option<ScheduleEntry>>;

    /// Inserts the entry and returns it with its assigned id.
    async fn create(&self, entry: &NewScheduleEntry) -> AppResult<ScheduleEntry>;

    async fn update(&self, entry: &ScheduleEntry) -> AppResult<()>;

    async fn delete(&self, id: i64) -> AppResult<()>;

    async fn has_future_entries(&self, team_member_id: i64, today: NaiveDate) -> AppResult<bool>;

    async fn find_state(&self) -> AppResult<Option<ScheduleState>>;

    async fn update_state(&self, state: &ScheduleState) -> AppResult<()>;

    /// Returns the generation state, initialising it with `now` when absent.
    async fn get_state(&self, now: DateTime<Utc>) -> AppResult<ScheduleState> {
        if let Some(state) = self.find_state().await? {
            return Ok(state);
        }

        let state = ScheduleState {
            id: SCHEDULE_STATE_ID,
            last_generation_date: now,
        };
        self.update_state(&state).await?;
        Ok(state)
    }
}

const ENTRY_SELECT: &str = r#"
    SELECT
        se.id, se.date, se.team_member_id, se.start_time, se.end_time,
        se.is_manual_override, se.original_team_member_id,
        t.name AS team_member_name, t.slack_handle AS team_member_slack_handle
    FROM schedule_entries se
    LEFT JOIN team_members t ON se.team_member_id = t.id
"#;

/// Repository for `schedule_entries` and the `schedule_state` singleton.
#[derive(Clone)]
pub struct SqliteScheduleRepository {
    pool: SqlitePool,
}

impl SqliteScheduleRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ScheduleRepository for SqliteScheduleRepository {
    async fn find_by_date_range(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> AppResult<Vec<ScheduleEntry>> {
        let query = format!(
            "{} WHERE se.date >= ? AND se.date <= ? ORDER BY se.date, se.start_time",
            ENTRY_SELECT
        );

        sqlx::query_as::<_, ScheduleEntry>(&query)
            .bind(from)
            .bind(to)
            .fetch_all(&self.pool)
            .await
            .map_err(AppError::Database)
    }

    async fn find_by_id(&self, id: i64) -> AppResult<Option<ScheduleEntry>> {
        let query = format!("{} WHERE se.id = ?", ENTRY_SELECT);

        sqlx::query_as::<_, ScheduleEntry>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::Database)
    }

    async fn create(&self, entry: &NewScheduleEntry) -> AppResult<ScheduleEntry> {
        let now = Utc::now().naive_utc();

        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO schedule_entries (
                date, team_member_id, start_time, end_time,
                is_manual_override, original_team_member_id, created_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(entry.date)
        .bind(entry.team_member_id)
        .bind(&entry.start_time)
        .bind(&entry.end_time)
        .bind(entry.is_manual_override)
        .bind(entry.original_team_member_id)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::Database)?;

        tracing::debug!(
            "Created schedule entry {} on {} for member {}",
            id,
            entry.date,
            entry.team_member_id
        );

        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("schedule entry with ID {} not found", id)))
    }

    async fn update(&self, entry: &ScheduleEntry) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE schedule_entries
            SET date = ?,
                team_member_id = ?,
                start_time = ?,
                end_time = ?,
                is_manual_override = ?,
                original_team_member_id = ?
            WHERE id = ?
            "#,
        )
        .bind(entry.date)
        .bind(entry.team_member_id)
        .bind(&entry.start_time)
        .bind(&entry.end_time)
        .bind(entry.is_manual_override)
        .bind(entry.original_team_member_id)
        .bind(entry.id)
        .execute(&self.pool)
        .await
        .map_err(AppError::Database)?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "schedule entry with ID {} not found",
                entry.id
            )));
        }
        Ok(())
    }

    async fn delete(&self, id: i64) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM schedule_entries WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(AppError::Database)?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "schedule entry with ID {} not found",
                id
            )));
        }
        Ok(())
    }

    async fn has_future_entries(&self, team_member_id: i64, today: NaiveDate) -> AppResult<bool> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM schedule_entries WHERE team_member_id = ? AND date > ?",
        )
        .bind(team_member_id)
        .bind(today)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::Database)?;

        Ok(count > 0)
    }

    async fn find_state(&self) -> AppResult<Option<ScheduleState>> {
        let row = sqlx::query_as::<_, ScheduleStateRow>(
            "SELECT id, last_generation_date FROM schedule_state WHERE id = ?",
        )
        .bind(SCHEDULE_STATE_ID)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::Database)?;

        Ok(row.map(ScheduleState::from))
    }

    async fn update_state(&self, state: &ScheduleState) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO schedule_state (id, last_generation_date)
            VALUES (?, ?)
            ON CONFLICT(id) DO UPDATE SET last_generation_date = excluded.last_generation_date
            "#,
        )
        .bind(SCHEDULE_STATE_ID)
        .bind(state.last_generation_date.naive_utc())
        .execute(&self.pool)
        .await
        .map_err(AppError::Database)?;

        Ok(())
    }
}
