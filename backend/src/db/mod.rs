pub mod models;
pub mod repository;

pub use repository::{
    ScheduleRepository, SqliteScheduleRepository, SqliteTeamRepository,
    SqliteWorkingHoursRepository, TeamRepository, WorkingHoursRepository,
};
