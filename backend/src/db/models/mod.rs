//! Database models, one file per table.
//! Everything is re-exported at the `crate::db::models` namespace.

pub mod schedule;
pub mod team_member;
pub mod working_hours;

pub use self::schedule::*;
pub use self::team_member::*;
pub use self::working_hours::*;
