use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;

use crate::db::models::TeamMember;
use crate::error::{AppError, AppResult};

#[async_trait]
pub trait TeamRepository: Send + Sync {
    async fn list_all(&self) -> AppResult<Vec<TeamMember>>;

    async fn find_by_id(&self, id: i64) -> AppResult<Option<TeamMember>>;

    /// Active members in rotation order: enrollment date, then name.
    async fn list_active(&self) -> AppResult<Vec<TeamMember>>;

    async fn create(
        &self,
        name: &str,
        slack_handle: Option<&str>,
        active: bool,
    ) -> AppResult<TeamMember>;

    async fn update(&self, member: &TeamMember) -> AppResult<TeamMember>;

    async fn delete(&self, id: i64) -> AppResult<()>;

    async fn count(&self) -> AppResult<i64>;
}

/// Repository for the `team_members` table.
#[derive(Clone)]
pub struct SqliteTeamRepository {
    pool: SqlitePool,
}

impl SqliteTeamRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TeamRepository for SqliteTeamRepository {
    async fn list_all(&self) -> AppResult<Vec<TeamMember>> {
        sqlx::query_as::<_, TeamMember>(
            r#"
            SELECT id, name, slack_handle, active, date_added
            FROM team_members
            ORDER BY name ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::Database)
    }

    async fn find_by_id(&self, id: i64) -> AppResult<Option<TeamMember>> {
        sqlx::query_as::<_, TeamMember>(
            r#"
            SELECT id, name, slack_handle, active, date_added
            FROM team_members
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::Database)
    }

    async fn list_active(&self) -> AppResult<Vec<TeamMember>> {
        sqlx::query_as::<_, TeamMember>(
            r#"
            SELECT id, name, slack_handle, active, date_added
            FROM team_members
            WHERE active = 1
            ORDER BY date_added ASC, name ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::Database)
    }

    async fn create(
        &self,
        name: &str,
        slack_handle: Option<&str>,
        active: bool,
    ) -> AppResult<TeamMember> {
        let now = Utc::now().naive_utc();

        sqlx::query_as::<_, TeamMember>(
            r#"
            INSERT INTO team_members (name, slack_handle, active, date_added)
            VALUES (?, ?, ?, ?)
            RETURNING id, name, slack_handle, active, date_added
            "#,
        )
        .bind(name)
        .bind(slack_handle)
        .bind(active)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::Database)
    }

    async fn update(&self, member: &TeamMember) -> AppResult<TeamMember> {
        sqlx::query_as::<_, TeamMember>(
            r#"
            UPDATE team_members
            SET name = ?, slack_handle = ?, active = ?
            WHERE id = ?
            RETURNING id, name, slack_handle, active, date_added
            "#,
        )
        .bind(&member.name)
        .bind(&member.slack_handle)
        .bind(member.active)
        .bind(member.id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::Database)?
        .ok_or_else(|| AppError::NotFound(format!("team member with ID {} not found", member.id)))
    }

    async fn delete(&self, id: i64) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM team_members WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(AppError::Database)?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "team member with ID {} not found",
                id
            )));
        }
        Ok(())
    }

    async fn count(&self) -> AppResult<i64> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM team_members")
            .fetch_one(&self.pool)
            .await
            .map_err(AppError::Database)
    }
}
