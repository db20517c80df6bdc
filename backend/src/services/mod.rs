pub mod clock;
pub mod generator;
pub mod init;
pub mod rotation;
pub mod schedule;
pub mod team;
pub mod working_hours;

pub use clock::{Clock, SystemClock};
pub use generator::ScheduleGenerator;
pub use schedule::ScheduleService;
pub use team::TeamService;
pub use working_hours::WorkingHoursService;
