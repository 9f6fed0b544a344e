use anyhow::{anyhow, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::db::{
    helpers::{format_date, parse_date},
    Database,
};

pub mod keys {
    pub const TRACKING_ENABLED: &str = "tracking_enabled";
    pub const DAILY_GOAL_STEPS: &str = "daily_goal_steps";
    pub const GOAL_NOTIFICATION_ENABLED: &str = "goal_notification_enabled";
    pub const RETENTION_MODE: &str = "retention_mode";
    pub const RETENTION_DAYS: &str = "retention_days";
    pub const LAST_GOAL_NOTIFIED_DATE: &str = "last_goal_notified_date";
    pub const LAST_CLEANUP_AT: &str = "last_cleanup_at";
    /// Runtime-only; never exported.
    pub const LAST_SENSOR_VALUE: &str = "last_sensor_value";

    pub const SETTINGS: [&str; 5] = [
        TRACKING_ENABLED,
        DAILY_GOAL_STEPS,
        GOAL_NOTIFICATION_ENABLED,
        RETENTION_MODE,
        RETENTION_DAYS,
    ];

    pub fn is_known(key: &str) -> bool {
        SETTINGS.contains(&key)
            || matches!(
                key,
                LAST_GOAL_NOTIFIED_DATE | LAST_CLEANUP_AT | LAST_SENSOR_VALUE
            )
    }
}

pub const DEFAULT_DAILY_GOAL: i64 = 8000;
pub const DEFAULT_RETENTION_DAYS: u32 = 30;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RetentionMode {
    #[default]
    Never,
    Days,
}

impl RetentionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RetentionMode::Never => "NEVER",
            RetentionMode::Days => "DAYS",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "NEVER" => Some(RetentionMode::Never),
            "DAYS" => Some(RetentionMode::Days),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct RetentionPolicy {
    pub mode: RetentionMode,
    pub days: u32,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            mode: RetentionMode::Never,
            days: DEFAULT_RETENTION_DAYS,
        }
    }
}

impl RetentionPolicy {
    /// Window length when the policy is active, `None` otherwise.
    pub fn active_window(&self) -> Option<u32> {
        match self.mode {
            RetentionMode::Days if self.days >= 1 => Some(self.days),
            _ => None,
        }
    }
}

/// User-facing settings as carried in an export document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserSettings {
    pub tracking_enabled: bool,
    pub daily_goal_steps: i64,
    pub goal_notification_enabled: bool,
    pub retention_mode: RetentionMode,
    pub retention_days: u32,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            tracking_enabled: true,
            daily_goal_steps: DEFAULT_DAILY_GOAL,
            goal_notification_enabled: true,
            retention_mode: RetentionMode::Never,
            retention_days: DEFAULT_RETENTION_DAYS,
        }
    }
}

/// Typed view over the `preferences` table. Absent keys read as defaults.
#[derive(Clone)]
pub struct SettingsStore {
    db: Database,
}

impl SettingsStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    async fn bool_or(&self, key: &str, default: bool) -> Result<bool> {
        Ok(self
            .db
            .get_preference(key)
            .await?
            .and_then(|value| value.as_bool())
            .unwrap_or(default))
    }

    async fn i64_or(&self, key: &str, default: i64) -> Result<i64> {
        Ok(self
            .db
            .get_preference(key)
            .await?
            .and_then(|value| value.as_i64())
            .unwrap_or(default))
    }

    async fn string(&self, key: &str) -> Result<Option<String>> {
        Ok(self
            .db
            .get_preference(key)
            .await?
            .and_then(|value| value.as_str().map(str::to_string)))
    }

    pub async fn tracking_enabled(&self) -> Result<bool> {
        self.bool_or(keys::TRACKING_ENABLED, true).await
    }

    pub async fn set_tracking_enabled(&self, enabled: bool) -> Result<()> {
        self.db
            .set_preference(keys::TRACKING_ENABLED, json!(enabled))
            .await
    }

    pub async fn daily_goal(&self) -> Result<i64> {
        self.i64_or(keys::DAILY_GOAL_STEPS, DEFAULT_DAILY_GOAL).await
    }

    pub async fn set_daily_goal(&self, steps: i64) -> Result<()> {
        self.db
            .set_preference(keys::DAILY_GOAL_STEPS, json!(steps))
            .await
    }

    pub async fn goal_notification_enabled(&self) -> Result<bool> {
        self.bool_or(keys::GOAL_NOTIFICATION_ENABLED, true).await
    }

    pub async fn set_goal_notification_enabled(&self, enabled: bool) -> Result<()> {
        self.db
            .set_preference(keys::GOAL_NOTIFICATION_ENABLED, json!(enabled))
            .await
    }

    pub async fn retention(&self) -> Result<RetentionPolicy> {
        let mode = self
            .string(keys::RETENTION_MODE)
            .await?
            .and_then(|raw| RetentionMode::parse(&raw))
            .unwrap_or_default();
        let days = self
            .i64_or(keys::RETENTION_DAYS, i64::from(DEFAULT_RETENTION_DAYS))
            .await?;
        Ok(RetentionPolicy {
            mode,
            days: u32::try_from(days).unwrap_or(0),
        })
    }

    pub async fn set_retention(&self, policy: RetentionPolicy) -> Result<()> {
        self.db
            .set_preference(keys::RETENTION_MODE, json!(policy.mode.as_str()))
            .await?;
        self.db
            .set_preference(keys::RETENTION_DAYS, json!(policy.days))
            .await
    }

    pub async fn last_goal_notified_date(&self) -> Result<Option<NaiveDate>> {
        // An unreadable slot behaves like an empty one.
        Ok(self
            .string(keys::LAST_GOAL_NOTIFIED_DATE)
            .await?
            .and_then(|raw| parse_date(&raw, keys::LAST_GOAL_NOTIFIED_DATE).ok()))
    }

    pub async fn set_last_goal_notified_date(&self, date: Option<NaiveDate>) -> Result<()> {
        match date {
            Some(date) => {
                self.db
                    .set_preference(keys::LAST_GOAL_NOTIFIED_DATE, json!(format_date(date)))
                    .await
            }
            None => self.db.remove_preference(keys::LAST_GOAL_NOTIFIED_DATE).await,
        }
    }

    pub async fn last_cleanup_at(&self) -> Result<Option<DateTime<Utc>>> {
        Ok(self
            .string(keys::LAST_CLEANUP_AT)
            .await?
            .and_then(|raw| DateTime::parse_from_rfc3339(&raw).ok())
            .map(|dt| dt.with_timezone(&Utc)))
    }

    pub async fn set_last_cleanup_at(&self, at: DateTime<Utc>) -> Result<()> {
        self.db
            .set_preference(keys::LAST_CLEANUP_AT, json!(at.to_rfc3339()))
            .await
    }

    pub async fn last_sensor_value(&self) -> Result<Option<f64>> {
        Ok(self
            .db
            .get_preference(keys::LAST_SENSOR_VALUE)
            .await?
            .and_then(|value| value.as_f64()))
    }

    pub async fn set_last_sensor_value(&self, value: f64) -> Result<()> {
        self.db
            .set_preference(keys::LAST_SENSOR_VALUE, json!(value))
            .await
    }

    pub async fn snapshot(&self) -> Result<UserSettings> {
        let retention = self.retention().await?;
        Ok(UserSettings {
            tracking_enabled: self.tracking_enabled().await?,
            daily_goal_steps: self.daily_goal().await?,
            goal_notification_enabled: self.goal_notification_enabled().await?,
            retention_mode: retention.mode,
            retention_days: retention.days,
        })
    }

    /// Preferences no current code path understands, kept for export.
    pub async fn extras(&self) -> Result<Vec<(String, Value)>> {
        Ok(self
            .db
            .preferences()
            .await?
            .into_iter()
            .filter(|(key, _)| !keys::is_known(key))
            .collect())
    }

    pub async fn set_extra(&self, key: &str, value: Value) -> Result<()> {
        if keys::is_known(key) {
            return Err(anyhow!("'{key}' is not an extra preference"));
        }
        self.db.set_preference(key, value).await
    }
}
