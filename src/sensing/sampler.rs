use std::sync::Arc;

use anyhow::Result;
use chrono::Timelike;
use log::{debug, error};

use crate::{
    channel::StepEvents,
    db::{Database, StepDelta},
    goals::GoalNotifier,
    platform::Clock,
    settings::SettingsStore,
};

/// Deltas at or above this are treated as sensor misbehaviour.
pub const MAX_PLAUSIBLE_DELTA: f64 = 50_000.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ReadingOutcome {
    /// No previous reading; the value only becomes the baseline.
    Baseline,
    /// Reset, reboot or implausible jump; baseline moved, nothing counted.
    Rejected { delta: f64 },
    Accepted { steps: u64, today_total: u64 },
}

/// Turns raw cumulative counter readings into day and hour increments.
#[derive(Clone)]
pub struct StepSampler {
    db: Database,
    settings: SettingsStore,
    goals: GoalNotifier,
    events: StepEvents,
    clock: Arc<dyn Clock>,
}

impl StepSampler {
    pub fn new(
        db: Database,
        settings: SettingsStore,
        goals: GoalNotifier,
        events: StepEvents,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            db,
            settings,
            goals,
            events,
            clock,
        }
    }

    pub async fn on_reading(&self, raw_value: f64) -> Result<ReadingOutcome> {
        let Some(last_raw) = self.settings.last_sensor_value().await? else {
            self.settings.set_last_sensor_value(raw_value).await?;
            return Ok(ReadingOutcome::Baseline);
        };

        let delta = raw_value - last_raw;
        if !(delta > 0.0 && delta < MAX_PLAUSIBLE_DELTA) {
            self.settings.set_last_sensor_value(raw_value).await?;
            debug!("Sensor delta {delta} outside bounds; re-baselined at {raw_value}");
            return Ok(ReadingOutcome::Rejected { delta });
        }

        let now = self.clock.now();
        let today = now.date();
        let steps = delta.trunc() as u64;
        let today_total = self
            .db
            .record_delta(StepDelta {
                date: today,
                hour: now.hour(),
                steps,
                raw_value,
            })
            .await?;

        if let Err(err) = self.goals.check(today, today_total).await {
            error!("Goal check failed: {err:?}");
        }

        self.events.publish(today_total);

        Ok(ReadingOutcome::Accepted { steps, today_total })
    }
}
