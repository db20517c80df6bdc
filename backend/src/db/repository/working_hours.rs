use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::db::models::WorkingHours;
use crate::error::{AppError, AppResult};

#[async_trait]
pub trait WorkingHoursRepository: Send + Sync {
    async fn list_all(&self) -> AppResult<Vec<WorkingHours>>;

    async fn find_by_day(&self, day_of_week: i64) -> AppResult<Option<WorkingHours>>;

    async fn list_active(&self) -> AppResult<Vec<WorkingHours>>;

    async fn update(&self, hours: &WorkingHours) -> AppResult<WorkingHours>;
}

/// Repository for the `working_hours` table (one row per weekday).
#[derive(Clone)]
pub struct SqliteWorkingHoursRepository {
    pool: SqlitePool,
}

impl SqliteWorkingHoursRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl WorkingHoursRepository for SqliteWorkingHoursRepository {
    async fn list_all(&self) -> AppResult<Vec<WorkingHours>> {
        sqlx::query_as::<_, WorkingHours>(
            r#"
            SELECT id, day_of_week, start_time, end_time, active
            FROM working_hours
            ORDER BY day_of_week ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::Database)
    }

    async fn find_by_day(&self, day_of_week: i64) -> AppResult<Option<WorkingHours>> {
        sqlx::query_as::<_, WorkingHours>(
            r#"
            SELECT id, day_of_week, start_time, end_time, active
            FROM working_hours
            WHERE day_of_week = ?
            "#,
        )
        .bind(day_of_week)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::Database)
    }

    async fn list_active(&self) -> AppResult<Vec<WorkingHours>> {
        sqlx::query_as::<_, WorkingHours>(
            r#"
            SELECT id, day_of_week, start_time, end_time, active
            FROM working_hours
            WHERE active = 1
            ORDER BY day_of_week ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::Database)
    }

    async fn update(&self, hours: &WorkingHours) -> AppResult<WorkingHours> {
        sqlx::query_as::<_, WorkingHours>(
            r#"
            UPDATE working_hours
            SET start_time = ?, end_time = ?, active = ?
            WHERE day_of_week = ?
            RETURNING id, day_of_week, start_time, end_time, active
            "#,
        )
        .bind(&hours.start_time)
        .bind(&hours.end_time)
        .bind(hours.active)
        .bind(hours.day_of_week)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::Database)?
        .ok_or_else(|| {
            AppError::NotFound(format!(
                "working hours for day {} not found",
                hours.day_of_week
            ))
        })
    }
}
