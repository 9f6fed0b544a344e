use std::collections::BTreeMap;

use anyhow::{bail, Context, Result};
use chrono::{NaiveDate, Utc};
use rusqlite::{params, OptionalExtension, Transaction};

use super::preferences::upsert_preference;
use crate::db::{
    helpers::{format_date, parse_date, to_i64, to_u64},
    models::{DayRecord, GoalMarker, StepDelta, HOURS_PER_DAY},
    Database,
};
use crate::settings::keys;

/// Row counts removed by a history purge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct PurgeCounts {
    pub day_totals: usize,
    pub hourly_rows: usize,
    pub goal_rows: usize,
}

impl PurgeCounts {
    pub fn is_empty(&self) -> bool {
        self.day_totals + self.hourly_rows + self.goal_rows == 0
    }
}

fn write_goal_marker(tx: &Transaction<'_>, date: &str, marker: GoalMarker) -> Result<()> {
    match marker {
        GoalMarker::Keep => {}
        GoalMarker::Clear => {
            tx.execute(
                "DELETE FROM goal_achievements WHERE date = ?1",
                params![date],
            )?;
        }
        GoalMarker::Set(goal) => {
            if goal == 0 {
                bail!("goal marker for {date} must be positive");
            }
            tx.execute(
                "INSERT INTO goal_achievements (date, goal_steps, achieved_at)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(date) DO UPDATE SET
                     goal_steps = excluded.goal_steps,
                     achieved_at = excluded.achieved_at",
                params![date, to_i64(goal)?, Utc::now().to_rfc3339()],
            )?;
        }
    }
    Ok(())
}

impl Database {
    /// Adds an accepted delta to the day total and hour bucket and moves the
    /// sensor baseline, all in one transaction. Returns the new day total.
    pub async fn record_delta(&self, delta: StepDelta) -> Result<u64> {
        if delta.hour as usize >= HOURS_PER_DAY {
            bail!("hour {} out of range", delta.hour);
        }

        self.execute(move |conn| {
            let date = format_date(delta.date);
            let steps = to_i64(delta.steps)?;
            let now = Utc::now().to_rfc3339();
            let tx = conn.transaction()?;

            tx.execute(
                "INSERT INTO day_totals (date, steps, updated_at)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(date) DO UPDATE SET
                     steps = steps + excluded.steps,
                     updated_at = excluded.updated_at",
                params![date, steps, now],
            )
            .with_context(|| "failed to update day total")?;

            tx.execute(
                "INSERT INTO hourly_steps (date, hour, steps)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(date, hour) DO UPDATE SET
                     steps = steps + excluded.steps",
                params![date, delta.hour, steps],
            )
            .with_context(|| "failed to update hourly bucket")?;

            upsert_preference(
                &tx,
                keys::LAST_SENSOR_VALUE,
                &serde_json::json!(delta.raw_value),
            )?;

            let total: i64 = tx.query_row(
                "SELECT steps FROM day_totals WHERE date = ?1",
                params![date],
                |row| row.get(0),
            )?;

            tx.commit().context("failed to commit step delta")?;
            to_u64(total, "day_totals.steps")
        })
        .await
    }

    pub async fn day_total(&self, date: NaiveDate) -> Result<u64> {
        self.execute(move |conn| {
            let total: Option<i64> = conn
                .query_row(
                    "SELECT steps FROM day_totals WHERE date = ?1",
                    params![format_date(date)],
                    |row| row.get(0),
                )
                .optional()?;
            to_u64(total.unwrap_or(0), "day_totals.steps")
        })
        .await
    }

    pub async fn hourly_steps(&self, date: NaiveDate) -> Result<[u64; HOURS_PER_DAY]> {
        self.execute(move |conn| {
            let mut stmt =
                conn.prepare("SELECT hour, steps FROM hourly_steps WHERE date = ?1")?;
            let rows = stmt
                .query_map(params![format_date(date)], |row| {
                    Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?))
                })?
                .collect::<Result<Vec<_>, _>>()?;

            let mut buckets = [0u64; HOURS_PER_DAY];
            for (hour, steps) in rows {
                let index = to_u64(hour, "hourly_steps.hour")? as usize;
                if let Some(slot) = buckets.get_mut(index) {
                    *slot = to_u64(steps, "hourly_steps.steps")?;
                }
            }
            Ok(buckets)
        })
        .await
    }

    pub async fn achieved_goal(&self, date: NaiveDate) -> Result<Option<u64>> {
        self.execute(move |conn| {
            let goal: Option<i64> = conn
                .query_row(
                    "SELECT goal_steps FROM goal_achievements WHERE date = ?1",
                    params![format_date(date)],
                    |row| row.get(0),
                )
                .optional()?;
            goal.map(|value| to_u64(value, "goal_achievements.goal_steps"))
                .transpose()
        })
        .await
    }

    pub async fn set_goal_achieved(&self, date: NaiveDate, goal: u64) -> Result<()> {
        self.execute(move |conn| {
            let tx = conn.transaction()?;
            write_goal_marker(&tx, &format_date(date), GoalMarker::Set(goal))?;
            tx.commit()?;
            Ok(())
        })
        .await
    }

    /// Dates that have ever recorded a total, oldest first.
    pub async fn recorded_dates(&self) -> Result<Vec<NaiveDate>> {
        self.execute(|conn| {
            let mut stmt = conn.prepare("SELECT date FROM day_totals ORDER BY date")?;
            let dates = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .collect::<Result<Vec<_>, _>>()?;
            dates
                .iter()
                .map(|date| parse_date(date, "day_totals.date"))
                .collect()
        })
        .await
    }

    /// Every date key present in any of the day tables, unparsed.
    pub async fn stored_date_keys(&self) -> Result<Vec<String>> {
        self.execute(|conn| {
            let mut stmt = conn.prepare(
                "SELECT date FROM day_totals
                 UNION SELECT date FROM hourly_steps
                 UNION SELECT date FROM goal_achievements
                 ORDER BY date",
            )?;
            let keys = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(keys)
        })
        .await
    }

    /// Full history for every date with a recorded total.
    pub async fn day_records(&self) -> Result<Vec<DayRecord>> {
        self.execute(|conn| {
            let mut records: BTreeMap<String, DayRecord> = BTreeMap::new();

            {
                let mut stmt = conn.prepare("SELECT date, steps FROM day_totals")?;
                let rows = stmt
                    .query_map([], |row| {
                        Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                for (date, steps) in rows {
                    let mut record = DayRecord::empty(parse_date(&date, "day_totals.date")?);
                    record.total = to_u64(steps, "day_totals.steps")?;
                    records.insert(date, record);
                }
            }

            {
                let mut stmt = conn.prepare("SELECT date, hour, steps FROM hourly_steps")?;
                let rows = stmt
                    .query_map([], |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, i64>(1)?,
                            row.get::<_, i64>(2)?,
                        ))
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                for (date, hour, steps) in rows {
                    let Some(record) = records.get_mut(&date) else {
                        continue;
                    };
                    let index = to_u64(hour, "hourly_steps.hour")? as usize;
                    if let Some(slot) = record.hourly.get_mut(index) {
                        *slot = to_u64(steps, "hourly_steps.steps")?;
                    }
                }
            }

            {
                let mut stmt = conn.prepare("SELECT date, goal_steps FROM goal_achievements")?;
                let rows = stmt
                    .query_map([], |row| {
                        Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                for (date, goal) in rows {
                    if let Some(record) = records.get_mut(&date) {
                        record.goal_achieved = Some(to_u64(goal, "goal_achievements.goal_steps")?);
                    }
                }
            }

            Ok(records.into_values().collect())
        })
        .await
    }

    /// Replaces a single day (total and all 24 buckets) in one transaction.
    pub async fn write_day(
        &self,
        date: NaiveDate,
        total: u64,
        hourly: [u64; HOURS_PER_DAY],
        goal: GoalMarker,
    ) -> Result<()> {
        self.execute(move |conn| {
            let date = format_date(date);
            let tx = conn.transaction()?;

            tx.execute(
                "INSERT INTO day_totals (date, steps, updated_at)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(date) DO UPDATE SET
                     steps = excluded.steps,
                     updated_at = excluded.updated_at",
                params![date, to_i64(total)?, Utc::now().to_rfc3339()],
            )?;

            tx.execute("DELETE FROM hourly_steps WHERE date = ?1", params![date])?;
            for (hour, steps) in hourly.iter().enumerate() {
                if *steps == 0 {
                    continue;
                }
                tx.execute(
                    "INSERT INTO hourly_steps (date, hour, steps) VALUES (?1, ?2, ?3)",
                    params![date, hour as i64, to_i64(*steps)?],
                )?;
            }

            write_goal_marker(&tx, &date, goal)?;

            tx.commit()
                .with_context(|| format!("failed to commit day {date}"))?;
            Ok(())
        })
        .await
    }

    /// Deletes every day, hour and goal row for the given date keys.
    pub async fn delete_dates(&self, dates: Vec<String>) -> Result<PurgeCounts> {
        self.execute(move |conn| {
            let tx = conn.transaction()?;
            let mut counts = PurgeCounts::default();
            for date in &dates {
                counts.day_totals +=
                    tx.execute("DELETE FROM day_totals WHERE date = ?1", params![date])?;
                counts.hourly_rows +=
                    tx.execute("DELETE FROM hourly_steps WHERE date = ?1", params![date])?;
                counts.goal_rows +=
                    tx.execute("DELETE FROM goal_achievements WHERE date = ?1", params![date])?;
            }
            tx.commit().context("failed to commit history purge")?;
            Ok(counts)
        })
        .await
    }

    pub async fn clear_history(&self) -> Result<PurgeCounts> {
        self.execute(|conn| {
            let tx = conn.transaction()?;
            let counts = PurgeCounts {
                day_totals: tx.execute("DELETE FROM day_totals", [])?,
                hourly_rows: tx.execute("DELETE FROM hourly_steps", [])?,
                goal_rows: tx.execute("DELETE FROM goal_achievements", [])?,
            };
            tx.commit().context("failed to commit history wipe")?;
            Ok(counts)
        })
        .await
    }
}
