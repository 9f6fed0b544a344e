use std::collections::BTreeSet;

use log::{info, warn};
use serde::Serialize;

use super::{
    document::{parse_document, ImportCandidate, ImportedSettings},
    TransferError,
};
use crate::{
    db::Database,
    settings::{RetentionPolicy, SettingsStore},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportMode {
    /// Existing days stay untouched; only new dates are written.
    MergeSkip,
    MergeOverwrite,
    /// All stored history is deleted before writing.
    ReplaceAllHistory,
}

impl ImportMode {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "MERGE_SKIP" => Some(ImportMode::MergeSkip),
            "MERGE_OVERWRITE" => Some(ImportMode::MergeOverwrite),
            "REPLACE_ALL_HISTORY" => Some(ImportMode::ReplaceAllHistory),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct ImportPreview {
    pub days_in_file: usize,
    pub new_days: usize,
    pub existing_days: usize,
    pub has_settings: bool,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Default)]
pub struct ImportSummary {
    pub imported_days: usize,
    pub skipped_days: usize,
    pub overwritten_days: usize,
    pub settings_imported: bool,
}

/// Counts what an import would do without writing anything.
pub async fn preview_import(db: &Database, json: &str) -> Result<ImportPreview, TransferError> {
    let candidate = parse_document(json)?;
    let existing: BTreeSet<_> = db.recorded_dates().await?.into_iter().collect();

    let existing_days = candidate
        .days
        .iter()
        .filter(|day| existing.contains(&day.date))
        .count();

    Ok(ImportPreview {
        days_in_file: candidate.days.len(),
        new_days: candidate.days.len() - existing_days,
        existing_days,
        has_settings: candidate.settings.is_some(),
    })
}

/// Validates the whole document, then writes it day by day.
///
/// Each day is its own transaction. A storage failure part way through keeps
/// the days already written.
pub async fn import_json(
    db: &Database,
    settings: &SettingsStore,
    json: &str,
    mode: ImportMode,
    import_settings: bool,
) -> Result<ImportSummary, TransferError> {
    let candidate = parse_document(json)?;
    let mut summary = ImportSummary::default();

    let existing: BTreeSet<_> = if mode == ImportMode::ReplaceAllHistory {
        let removed = db.clear_history().await?;
        info!(
            "Import replacing history: removed days={} hours={} goals={}",
            removed.day_totals, removed.hourly_rows, removed.goal_rows
        );
        BTreeSet::new()
    } else {
        db.recorded_dates().await?.into_iter().collect()
    };

    for day in &candidate.days {
        let exists = existing.contains(&day.date);
        if exists && mode == ImportMode::MergeSkip {
            summary.skipped_days += 1;
            continue;
        }

        db.write_day(day.date, day.total, day.hourly, day.goal)
            .await
            .map_err(|err| {
                warn!("Import stopped at {}: {err:?}", day.date);
                err
            })?;

        if exists {
            summary.overwritten_days += 1;
        }
        summary.imported_days += 1;
    }

    if import_settings {
        summary.settings_imported = apply_settings(settings, &candidate).await?;
    }

    info!(
        "Import ({mode:?}) finished: imported={} skipped={} overwritten={} settings={}",
        summary.imported_days,
        summary.skipped_days,
        summary.overwritten_days,
        summary.settings_imported
    );
    Ok(summary)
}

async fn apply_settings(
    settings: &SettingsStore,
    candidate: &ImportCandidate,
) -> Result<bool, TransferError> {
    let mut applied = false;

    if let Some(imported) = &candidate.settings {
        apply_user_settings(settings, imported).await?;
        applied = true;
    }

    if let Some(last_notified) = candidate.last_goal_notified_date {
        settings.set_last_goal_notified_date(last_notified).await?;
    }

    for (key, value) in &candidate.extras {
        settings.set_extra(key, value.clone()).await?;
    }

    Ok(applied)
}

async fn apply_user_settings(
    settings: &SettingsStore,
    imported: &ImportedSettings,
) -> anyhow::Result<()> {
    if let Some(enabled) = imported.tracking_enabled {
        settings.set_tracking_enabled(enabled).await?;
    }
    if let Some(goal) = imported.daily_goal_steps {
        settings.set_daily_goal(goal).await?;
    }
    if let Some(enabled) = imported.goal_notification_enabled {
        settings.set_goal_notification_enabled(enabled).await?;
    }
    if imported.retention_mode.is_some() || imported.retention_days.is_some() {
        let current = settings.retention().await?;
        settings
            .set_retention(RetentionPolicy {
                mode: imported.retention_mode.unwrap_or(current.mode),
                days: imported.retention_days.unwrap_or(current.days),
            })
            .await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db::{helpers::parse_date, GoalMarker, HOURS_PER_DAY},
        settings::RetentionMode,
        transfer::{export_json, SCHEMA_ID},
    };
    use chrono::NaiveDate;
    use serde_json::{json, Value};

    fn date(value: &str) -> NaiveDate {
        parse_date(value, "test").unwrap()
    }

    fn stores() -> (Database, SettingsStore) {
        let db = Database::in_memory().unwrap();
        let settings = SettingsStore::new(db.clone());
        (db, settings)
    }

    fn spread(total: u64) -> [u64; HOURS_PER_DAY] {
        let mut hourly = [0; HOURS_PER_DAY];
        hourly[10] = total / 2;
        hourly[18] = total - total / 2;
        hourly
    }

    async fn seed(db: &Database, day: &str, total: u64, goal: GoalMarker) {
        db.write_day(date(day), total, spread(total), goal)
            .await
            .unwrap();
    }

    fn day_json(total: u64, goal: Value) -> Value {
        json!({ "total": total, "hourly": spread(total), "goal_achieved": goal })
    }

    fn document(days: Value) -> String {
        json!({
            "schema": SCHEMA_ID,
            "schema_version": 1,
            "exported_at": "2024-03-10T10:00:00Z",
            "app": { "name": "step-counter", "version": "0.1.0" },
            "data": {
                "days": days,
                "settings": {
                    "tracking_enabled": false,
                    "daily_goal_steps": 12000,
                    "goal_notification_enabled": true,
                    "retention_mode": "DAYS",
                    "retention_days": 90
                },
                "meta": { "last_goal_notified_date": "2024-03-02" },
                "extras": { "theme": "dark" }
            }
        })
        .to_string()
    }

    #[tokio::test]
    async fn replace_into_empty_store_reproduces_source() {
        let (source, source_settings) = stores();
        seed(&source, "2024-03-01", 9000, GoalMarker::Set(8000)).await;
        seed(&source, "2024-03-02", 4321, GoalMarker::Keep).await;
        seed(&source, "2024-03-03", 0, GoalMarker::Keep).await;
        let json = export_json(&source, &source_settings).await.unwrap();

        let (target, target_settings) = stores();
        let summary = import_json(
            &target,
            &target_settings,
            &json,
            ImportMode::ReplaceAllHistory,
            false,
        )
        .await
        .unwrap();

        assert_eq!(summary.imported_days, 3);
        assert_eq!(summary.overwritten_days, 0);
        assert!(!summary.settings_imported);
        assert_eq!(
            target.day_records().await.unwrap(),
            source.day_records().await.unwrap()
        );
    }

    #[tokio::test]
    async fn merge_skip_leaves_existing_days_alone() {
        let (db, settings) = stores();
        seed(&db, "2024-03-01", 500, GoalMarker::Keep).await;

        let doc = document(json!({
            "2024-03-01": day_json(9999, json!(null)),
            "2024-03-02": day_json(700, json!(null))
        }));
        let summary = import_json(&db, &settings, &doc, ImportMode::MergeSkip, false)
            .await
            .unwrap();

        assert_eq!(
            summary,
            ImportSummary {
                imported_days: 1,
                skipped_days: 1,
                overwritten_days: 0,
                settings_imported: false
            }
        );
        assert_eq!(db.day_total(date("2024-03-01")).await.unwrap(), 500);
        assert_eq!(db.day_total(date("2024-03-02")).await.unwrap(), 700);
        assert_eq!(settings.daily_goal().await.unwrap(), 8000);
    }

    #[tokio::test]
    async fn merge_overwrite_takes_imported_values() {
        let (db, settings) = stores();
        seed(&db, "2024-03-01", 500, GoalMarker::Set(400)).await;
        seed(&db, "2024-03-05", 50, GoalMarker::Keep).await;

        let doc = document(json!({ "2024-03-01": day_json(9999, json!(null)) }));
        let summary = import_json(&db, &settings, &doc, ImportMode::MergeOverwrite, true)
            .await
            .unwrap();

        assert_eq!(summary.overwritten_days, 1);
        assert_eq!(summary.imported_days, 1);
        assert!(summary.settings_imported);
        assert_eq!(db.day_total(date("2024-03-01")).await.unwrap(), 9999);
        assert_eq!(db.hourly_steps(date("2024-03-01")).await.unwrap(), spread(9999));
        assert_eq!(db.achieved_goal(date("2024-03-01")).await.unwrap(), None);
        assert_eq!(db.day_total(date("2024-03-05")).await.unwrap(), 50);

        assert_eq!(settings.daily_goal().await.unwrap(), 12000);
        assert!(!settings.tracking_enabled().await.unwrap());
        assert_eq!(
            settings.retention().await.unwrap(),
            RetentionPolicy {
                mode: RetentionMode::Days,
                days: 90
            }
        );
        assert_eq!(
            settings.last_goal_notified_date().await.unwrap(),
            Some(date("2024-03-02"))
        );
        assert_eq!(
            settings.extras().await.unwrap(),
            vec![("theme".to_string(), json!("dark"))]
        );
    }

    #[tokio::test]
    async fn replace_drops_days_missing_from_document() {
        let (db, settings) = stores();
        seed(&db, "2023-01-01", 10, GoalMarker::Set(5)).await;

        let doc = document(json!({ "2024-03-01": day_json(100, json!(0)) }));
        import_json(&db, &settings, &doc, ImportMode::ReplaceAllHistory, false)
            .await
            .unwrap();

        assert_eq!(db.stored_date_keys().await.unwrap(), vec!["2024-03-01"]);
        assert_eq!(db.achieved_goal(date("2024-03-01")).await.unwrap(), None);
    }

    #[tokio::test]
    async fn version_mismatch_changes_nothing() {
        let (db, settings) = stores();
        seed(&db, "2024-03-01", 500, GoalMarker::Keep).await;

        let mut doc: Value = serde_json::from_str(&document(json!({
            "2024-03-02": day_json(700, json!(null))
        })))
        .unwrap();
        doc["schema_version"] = json!(2);

        let err = import_json(
            &db,
            &settings,
            &doc.to_string(),
            ImportMode::ReplaceAllHistory,
            true,
        )
        .await
        .unwrap_err();

        assert_eq!(err.code(), "UNSUPPORTED_SCHEMA_VERSION");
        assert_eq!(db.stored_date_keys().await.unwrap(), vec!["2024-03-01"]);
        assert_eq!(settings.daily_goal().await.unwrap(), 8000);
    }

    #[tokio::test]
    async fn short_hourly_array_fails_before_writing() {
        let (db, settings) = stores();
        let doc = document(json!({
            "2024-03-01": day_json(100, json!(null)),
            "2024-03-02": { "total": 5, "hourly": [1, 2, 2], "goal_achieved": null }
        }));

        let err = import_json(&db, &settings, &doc, ImportMode::MergeOverwrite, false)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "VALIDATION_FAILED");
        assert!(db.stored_date_keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn oversized_total_is_rejected_before_history_is_cleared() {
        let (db, settings) = stores();
        seed(&db, "2024-01-01", 300, GoalMarker::Keep).await;

        let empty = [0u64; HOURS_PER_DAY];
        let doc = document(json!({
            "2024-03-01": { "total": u64::MAX, "hourly": empty, "goal_achieved": null }
        }));
        let err = import_json(&db, &settings, &doc, ImportMode::ReplaceAllHistory, false)
            .await
            .unwrap_err();

        assert_eq!(err.code(), "VALIDATION_FAILED");
        assert_eq!(db.stored_date_keys().await.unwrap(), vec!["2024-01-01"]);
        assert_eq!(db.day_total(date("2024-01-01")).await.unwrap(), 300);
    }

    #[tokio::test]
    async fn preview_counts_without_mutation() {
        let (db, _settings) = stores();
        seed(&db, "2024-03-01", 500, GoalMarker::Keep).await;

        let doc = document(json!({
            "2024-03-01": day_json(1, json!(null)),
            "2024-03-02": day_json(2, json!(null)),
            "2024-03-03": day_json(3, json!(null))
        }));
        let preview = preview_import(&db, &doc).await.unwrap();

        assert_eq!(
            preview,
            ImportPreview {
                days_in_file: 3,
                new_days: 2,
                existing_days: 1,
                has_settings: true
            }
        );
        assert_eq!(db.stored_date_keys().await.unwrap(), vec!["2024-03-01"]);
        assert_eq!(db.day_total(date("2024-03-01")).await.unwrap(), 500);
    }

    #[test]
    fn modes_parse_from_wire_names() {
        assert_eq!(ImportMode::parse("MERGE_SKIP"), Some(ImportMode::MergeSkip));
        assert_eq!(
            ImportMode::parse("REPLACE_ALL_HISTORY"),
            Some(ImportMode::ReplaceAllHistory)
        );
        assert_eq!(ImportMode::parse("merge_skip"), None);
    }
}
