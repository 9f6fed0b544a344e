pub mod day_record;

pub use day_record::{DayRecord, GoalMarker, StepDelta, HOURS_PER_DAY};
