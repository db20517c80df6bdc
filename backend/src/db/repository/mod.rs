pub mod schedule;
pub mod team_member;
pub mod working_hours;

#[cfg(test)]
pub mod memory;

pub use schedule::{ScheduleRepository, SqliteScheduleRepository};
pub use team_member::{SqliteTeamRepository, TeamRepository};
pub use working_hours::{SqliteWorkingHoursRepository, WorkingHoursRepository};

#[cfg(test)]
pub(crate) async fn test_pool() -> sqlx::SqlitePool {
    // A single connection: every new in-memory connection is a fresh database.
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();
    pool
}
