//! Export document layout and validation of candidate documents.
//!
//! ```text
//! { "schema": "step_counter_export", "schema_version": 1, "exported_at": ..., "app": {...},
//!   "data": { "days": { "YYYY-MM-DD": { "total", "hourly": [24], "goal_achieved" } },
//!             "settings": {...}, "meta": {...}, "extras": {...} } }
//! ```

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

use super::TransferError;
use crate::{
    db::{helpers::parse_date, GoalMarker, HOURS_PER_DAY},
    settings::{keys, RetentionMode, UserSettings},
};

pub const SCHEMA_ID: &str = "step_counter_export";
pub const SCHEMA_VERSION: i64 = 1;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ExportDocument {
    pub schema: String,
    pub schema_version: i64,
    pub exported_at: DateTime<Utc>,
    pub app: AppInfo,
    pub data: ExportData,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AppInfo {
    pub name: String,
    pub version: String,
}

impl AppInfo {
    pub fn current() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME").into(),
            version: env!("CARGO_PKG_VERSION").into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ExportData {
    pub days: BTreeMap<String, ExportedDay>,
    pub settings: UserSettings,
    pub meta: ExportMeta,
    pub extras: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ExportedDay {
    pub total: u64,
    pub hourly: [u64; HOURS_PER_DAY],
    /// Serialized as an explicit `null` when the goal was never reached.
    pub goal_achieved: Option<u64>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Default)]
pub struct ExportMeta {
    pub last_goal_notified_date: Option<String>,
}

/// A day from a candidate document, ready to be written.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportedDay {
    pub date: NaiveDate,
    pub total: u64,
    pub hourly: [u64; HOURS_PER_DAY],
    pub goal: GoalMarker,
}

/// Settings fields present in a candidate document. Absent fields stay as
/// they are on the device.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportedSettings {
    pub tracking_enabled: Option<bool>,
    pub daily_goal_steps: Option<i64>,
    pub goal_notification_enabled: Option<bool>,
    pub retention_mode: Option<RetentionMode>,
    pub retention_days: Option<u32>,
}

/// Fully validated content of an import document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportCandidate {
    pub days: Vec<ImportedDay>,
    pub settings: Option<ImportedSettings>,
    /// `Some(None)` means the document explicitly cleared the slot.
    pub last_goal_notified_date: Option<Option<NaiveDate>>,
    pub extras: Vec<(String, Value)>,
}

impl ExportDocument {
    pub fn from_user_settings(settings: UserSettings) -> Self {
        Self {
            schema: SCHEMA_ID.into(),
            schema_version: SCHEMA_VERSION,
            exported_at: Utc::now(),
            app: AppInfo::current(),
            data: ExportData {
                days: BTreeMap::new(),
                settings,
                meta: ExportMeta::default(),
                extras: Map::new(),
            },
        }
    }
}

fn expect_object<'a>(value: &'a Value, path: &str) -> Result<&'a Map<String, Value>, TransferError> {
    value
        .as_object()
        .ok_or_else(|| TransferError::validation(format!("{path} must be an object")))
}

/// Counts must fit a SQLite INTEGER, so anything above `i64::MAX` is rejected
/// here rather than at write time.
fn count(value: &Value, path: &str) -> Result<u64, TransferError> {
    value
        .as_i64()
        .filter(|count| *count >= 0)
        .map(|count| count as u64)
        .ok_or_else(|| {
            TransferError::validation(format!(
                "{path} must be an integer between 0 and {}",
                i64::MAX
            ))
        })
}

fn parse_day(key: &str, value: &Value) -> Result<ImportedDay, TransferError> {
    let path = format!("data.days.{key}");
    let date = parse_date(key, "day key")
        .map_err(|_| TransferError::validation(format!("{path}: '{key}' is not a YYYY-MM-DD date")))?;
    let day = expect_object(value, &path)?;

    let total = match day.get("total") {
        Some(total) => count(total, &format!("{path}.total"))?,
        None => return Err(TransferError::validation(format!("{path}.total is missing"))),
    };

    let hourly_values = day
        .get("hourly")
        .and_then(Value::as_array)
        .ok_or_else(|| TransferError::validation(format!("{path}.hourly must be an array")))?;
    if hourly_values.len() != HOURS_PER_DAY {
        return Err(TransferError::validation(format!(
            "{path}.hourly has {} entries, expected {HOURS_PER_DAY}",
            hourly_values.len()
        )));
    }
    let mut hourly = [0u64; HOURS_PER_DAY];
    for (hour, value) in hourly_values.iter().enumerate() {
        hourly[hour] = count(value, &format!("{path}.hourly[{hour}]"))?;
    }

    let goal = match day.get("goal_achieved") {
        None => GoalMarker::Keep,
        Some(Value::Null) => GoalMarker::Clear,
        Some(value) => match value.as_i64() {
            Some(goal) if goal > 0 => GoalMarker::Set(goal as u64),
            Some(_) => GoalMarker::Clear,
            None => {
                return Err(TransferError::validation(format!(
                    "{path}.goal_achieved must be an integer or null"
                )))
            }
        },
    };

    Ok(ImportedDay {
        date,
        total,
        hourly,
        goal,
    })
}

fn parse_settings(value: &Value) -> Result<ImportedSettings, TransferError> {
    let settings = expect_object(value, "data.settings")?;
    let mut parsed = ImportedSettings::default();

    let wrong = |key: &str, kind: &str| {
        TransferError::validation(format!("data.settings.{key} must be {kind}"))
    };

    if let Some(value) = settings.get(keys::TRACKING_ENABLED) {
        parsed.tracking_enabled = Some(
            value
                .as_bool()
                .ok_or_else(|| wrong(keys::TRACKING_ENABLED, "a boolean"))?,
        );
    }
    if let Some(value) = settings.get(keys::DAILY_GOAL_STEPS) {
        parsed.daily_goal_steps = Some(
            value
                .as_i64()
                .ok_or_else(|| wrong(keys::DAILY_GOAL_STEPS, "an integer"))?,
        );
    }
    if let Some(value) = settings.get(keys::GOAL_NOTIFICATION_ENABLED) {
        parsed.goal_notification_enabled = Some(
            value
                .as_bool()
                .ok_or_else(|| wrong(keys::GOAL_NOTIFICATION_ENABLED, "a boolean"))?,
        );
    }
    if let Some(value) = settings.get(keys::RETENTION_MODE) {
        parsed.retention_mode = Some(
            value
                .as_str()
                .and_then(RetentionMode::parse)
                .ok_or_else(|| wrong(keys::RETENTION_MODE, "NEVER or DAYS"))?,
        );
    }
    if let Some(value) = settings.get(keys::RETENTION_DAYS) {
        parsed.retention_days = Some(
            value
                .as_u64()
                .and_then(|days| u32::try_from(days).ok())
                .ok_or_else(|| wrong(keys::RETENTION_DAYS, "a non-negative integer"))?,
        );
    }

    Ok(parsed)
}

fn parse_meta(value: &Value) -> Result<Option<Option<NaiveDate>>, TransferError> {
    let meta = expect_object(value, "data.meta")?;
    match meta.get(keys::LAST_GOAL_NOTIFIED_DATE) {
        None => Ok(None),
        Some(Value::Null) => Ok(Some(None)),
        Some(Value::String(raw)) => parse_date(raw, keys::LAST_GOAL_NOTIFIED_DATE)
            .map(|date| Some(Some(date)))
            .map_err(|_| {
                TransferError::validation(format!(
                    "data.meta.{} '{raw}' is not a YYYY-MM-DD date",
                    keys::LAST_GOAL_NOTIFIED_DATE
                ))
            }),
        Some(_) => Err(TransferError::validation(format!(
            "data.meta.{} must be a date string or null",
            keys::LAST_GOAL_NOTIFIED_DATE
        ))),
    }
}

fn parse_extras(value: &Value) -> Result<Vec<(String, Value)>, TransferError> {
    let extras = expect_object(value, "data.extras")?;
    let mut parsed = Vec::with_capacity(extras.len());
    for (key, value) in extras {
        if value.is_object() || value.is_array() {
            return Err(TransferError::validation(format!(
                "data.extras.{key} must be a primitive value"
            )));
        }
        // Known keys are never restored from the extras bag.
        if keys::is_known(key) {
            continue;
        }
        parsed.push((key.clone(), value.clone()));
    }
    Ok(parsed)
}

/// Parses and validates a candidate document without touching storage.
pub fn parse_document(json: &str) -> Result<ImportCandidate, TransferError> {
    let root: Value =
        serde_json::from_str(json).map_err(|err| TransferError::InvalidDocument(err.to_string()))?;
    let root = root
        .as_object()
        .ok_or_else(|| TransferError::InvalidDocument("top level must be an object".into()))?;

    let schema = root.get("schema").and_then(Value::as_str).unwrap_or_default();
    if schema != SCHEMA_ID {
        return Err(TransferError::UnsupportedSchema(schema.to_string()));
    }

    let version = root
        .get("schema_version")
        .and_then(Value::as_i64)
        .unwrap_or(-1);
    if version != SCHEMA_VERSION {
        return Err(TransferError::UnsupportedSchemaVersion {
            found: version,
            expected: SCHEMA_VERSION,
        });
    }

    let data = root
        .get("data")
        .ok_or_else(|| TransferError::validation("data is missing"))
        .and_then(|data| expect_object(data, "data"))?;
    let days = data
        .get("days")
        .ok_or_else(|| TransferError::validation("data.days is missing"))
        .and_then(|days| expect_object(days, "data.days"))?;

    let mut candidate = ImportCandidate::default();
    for (key, value) in days {
        candidate.days.push(parse_day(key, value)?);
    }
    candidate.days.sort_by_key(|day| day.date);

    if let Some(settings) = data.get("settings").filter(|value| !value.is_null()) {
        candidate.settings = Some(parse_settings(settings)?);
    }
    if let Some(meta) = data.get("meta").filter(|value| !value.is_null()) {
        candidate.last_goal_notified_date = parse_meta(meta)?;
    }
    if let Some(extras) = data.get("extras").filter(|value| !value.is_null()) {
        candidate.extras = parse_extras(extras)?;
    }

    Ok(candidate)
}
