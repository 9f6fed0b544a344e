//! Per-date step aggregates.
//!
//! A day is stored as three independent pieces (total, hourly buckets, goal
//! marker). Nothing forces the hourly buckets to sum to the total on read.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub const HOURS_PER_DAY: usize = 24;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayRecord {
    pub date: NaiveDate,
    pub total: u64,
    pub hourly: [u64; HOURS_PER_DAY],
    /// Goal value in force when the day's total crossed it.
    pub goal_achieved: Option<u64>,
}

impl DayRecord {
    pub fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            total: 0,
            hourly: [0; HOURS_PER_DAY],
            goal_achieved: None,
        }
    }
}

/// One accepted sensor delta, attributed to a local date and hour.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepDelta {
    pub date: NaiveDate,
    pub hour: u32,
    pub steps: u64,
    /// Raw cumulative sensor value that becomes the new baseline.
    pub raw_value: f64,
}

/// What to do with the goal-achieved marker when a day is rewritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GoalMarker {
    Keep,
    Clear,
    Set(u64),
}
