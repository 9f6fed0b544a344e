use anyhow::{Context, Result};
use log::info;
use serde_json::Map;

use super::document::{ExportDocument, ExportMeta, ExportedDay};
use crate::{
    db::{helpers::format_date, Database},
    settings::SettingsStore,
};

/// Snapshot of every stored day plus user settings. Runtime-only state
/// (`last_sensor_value`, `last_cleanup_at`) is left out.
pub async fn export_document(db: &Database, settings: &SettingsStore) -> Result<ExportDocument> {
    let mut document = ExportDocument::from_user_settings(settings.snapshot().await?);

    for record in db.day_records().await? {
        document.data.days.insert(
            format_date(record.date),
            ExportedDay {
                total: record.total,
                hourly: record.hourly,
                goal_achieved: record.goal_achieved,
            },
        );
    }

    document.data.meta = ExportMeta {
        last_goal_notified_date: settings.last_goal_notified_date().await?.map(format_date),
    };
    document.data.extras = settings.extras().await?.into_iter().collect::<Map<_, _>>();

    info!("Exported {} days", document.data.days.len());
    Ok(document)
}

pub async fn export_json(db: &Database, settings: &SettingsStore) -> Result<String> {
    let document = export_document(db, settings).await?;
    serde_json::to_string_pretty(&document).context("failed to serialize export document")
}
