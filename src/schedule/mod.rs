pub mod conflicts;
pub mod store;
mod time;
mod weekly;

pub use conflicts::{ScheduleConflict, ValidationOutcome};
pub use time::{overlaps, parse_date, parse_hhmm, ClockTime, TimeError, TimeRange};
pub use weekly::{ScheduleException, Weekday, WeeklySchedule};
