use anyhow::Result;
use chrono::{DateTime, Days, NaiveDate, Utc};
use log::{debug, info};

use crate::{
    db::{helpers::parse_date, Database, PurgeCounts},
    settings::SettingsStore,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CleanupReport {
    pub cutoff: NaiveDate,
    pub removed: PurgeCounts,
    /// When the sweep before this one finished, if it ever did.
    pub previous_run: Option<DateTime<Utc>>,
}

/// First date kept by a window of `window` days ending today (inclusive).
pub fn cutoff_date(today: NaiveDate, window: u32) -> NaiveDate {
    today
        .checked_sub_days(Days::new(u64::from(window.saturating_sub(1))))
        .unwrap_or(NaiveDate::MIN)
}

/// Purges day, hour and goal records older than the retention window.
///
/// Runs on every service start; `last_cleanup_at` is recorded afterwards but
/// never consulted to skip a run. Date keys that fail to parse are kept.
pub async fn run_cleanup(
    db: &Database,
    settings: &SettingsStore,
    today: NaiveDate,
) -> Result<Option<CleanupReport>> {
    let policy = settings.retention().await?;
    let Some(window) = policy.active_window() else {
        debug!("Retention cleanup skipped: policy {:?}", policy.mode);
        return Ok(None);
    };

    let cutoff = cutoff_date(today, window);
    let previous_run = settings.last_cleanup_at().await?;
    debug!("Retention cleanup before {cutoff}; previous run {previous_run:?}");
    let expired: Vec<String> = db
        .stored_date_keys()
        .await?
        .into_iter()
        .filter(|key| match parse_date(key, "date key") {
            Ok(date) => date < cutoff,
            Err(_) => false,
        })
        .collect();

    let removed = if expired.is_empty() {
        PurgeCounts::default()
    } else {
        db.delete_dates(expired).await?
    };

    settings.set_last_cleanup_at(Utc::now()).await?;

    if !removed.is_empty() {
        info!(
            "Retention cleanup before {cutoff}: days={} hours={} goals={}",
            removed.day_totals, removed.hourly_rows, removed.goal_rows
        );
    }

    Ok(Some(CleanupReport {
        cutoff,
        removed,
        previous_run,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db::{GoalMarker, HOURS_PER_DAY},
        settings::{RetentionMode, RetentionPolicy},
    };

    fn date(value: &str) -> NaiveDate {
        parse_date(value, "test").unwrap()
    }

    async fn seed_day(db: &Database, value: &str) {
        let mut hourly = [0; HOURS_PER_DAY];
        hourly[12] = 100;
        db.write_day(date(value), 100, hourly, GoalMarker::Set(50))
            .await
            .unwrap();
    }

    async fn insert_raw_key(db: &Database, key: &'static str) {
        db.execute(move |conn| {
            conn.execute(
                "INSERT INTO day_totals (date, steps, updated_at) VALUES (?1, 7, 'x')",
                [key],
            )?;
            Ok(())
        })
        .await
        .unwrap();
    }

    #[test]
    fn window_includes_today() {
        assert_eq!(cutoff_date(date("2024-03-10"), 7), date("2024-03-04"));
        assert_eq!(cutoff_date(date("2024-03-10"), 1), date("2024-03-10"));
    }

    #[tokio::test]
    async fn seven_day_window_keeps_last_week() {
        let db = Database::in_memory().unwrap();
        let settings = SettingsStore::new(db.clone());
        settings
            .set_retention(RetentionPolicy {
                mode: RetentionMode::Days,
                days: 7,
            })
            .await
            .unwrap();

        for day in 1..=10 {
            seed_day(&db, &format!("2024-03-{day:02}")).await;
        }
        seed_day(&db, "2023-12-31").await;
        insert_raw_key(&db, "garbage-date").await;

        let report = run_cleanup(&db, &settings, date("2024-03-10"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(report.cutoff, date("2024-03-04"));
        assert_eq!(report.removed.day_totals, 4);
        assert_eq!(report.removed.hourly_rows, 4);
        assert_eq!(report.removed.goal_rows, 4);

        let mut expected: Vec<String> = (4..=10).map(|day| format!("2024-03-{day:02}")).collect();
        expected.push("garbage-date".into());
        assert_eq!(db.stored_date_keys().await.unwrap(), expected);
        assert!(settings.last_cleanup_at().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn never_mode_is_a_no_op() {
        let db = Database::in_memory().unwrap();
        let settings = SettingsStore::new(db.clone());
        seed_day(&db, "2000-01-01").await;

        assert!(run_cleanup(&db, &settings, date("2024-03-10"))
            .await
            .unwrap()
            .is_none());
        assert_eq!(db.stored_date_keys().await.unwrap().len(), 1);
        assert!(settings.last_cleanup_at().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn cleanup_reruns_regardless_of_last_timestamp() {
        let db = Database::in_memory().unwrap();
        let settings = SettingsStore::new(db.clone());
        settings
            .set_retention(RetentionPolicy {
                mode: RetentionMode::Days,
                days: 1,
            })
            .await
            .unwrap();

        let first = run_cleanup(&db, &settings, date("2024-03-10"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first.previous_run, None);
        let recorded = settings.last_cleanup_at().await.unwrap();
        assert!(recorded.is_some());

        seed_day(&db, "2024-03-09").await;
        let report = run_cleanup(&db, &settings, date("2024-03-10"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(report.removed.day_totals, 1);
        assert_eq!(report.previous_run, recorded);
    }
}
