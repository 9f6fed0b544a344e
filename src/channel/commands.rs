use std::sync::Arc;

use chrono::NaiveDate;
use log::debug;
use serde::Serialize;
use serde_json::Value;

use super::{ChannelError, StepEvents, StepSink};
use crate::{
    db::{helpers::parse_date, Database},
    platform::Clock,
    settings::{RetentionPolicy, SettingsStore},
    tracking::TrackingController,
    transfer::{self, ImportMode},
};

/// Request/response surface for the UI layer plus the today-steps stream.
#[derive(Clone)]
pub struct StepChannel {
    db: Database,
    settings: SettingsStore,
    tracking: TrackingController,
    events: StepEvents,
    clock: Arc<dyn Clock>,
}

fn reply<T: Serialize>(value: T) -> Result<Value, ChannelError> {
    serde_json::to_value(value).map_err(|err| ChannelError::Storage(err.into()))
}

fn date_arg(args: &Value) -> Result<NaiveDate, ChannelError> {
    let raw = args
        .as_str()
        .ok_or_else(|| ChannelError::argument("dateKey is null"))?;
    parse_date(raw, "dateKey").map_err(|err| ChannelError::argument(format!("{err:#}")))
}

fn int_arg(args: &Value, name: &str) -> Result<i64, ChannelError> {
    args.as_i64()
        .ok_or_else(|| ChannelError::argument(format!("{name} is null")))
}

fn bool_arg(args: &Value, name: &str) -> Result<bool, ChannelError> {
    args.as_bool()
        .ok_or_else(|| ChannelError::argument(format!("{name} is null")))
}

fn str_arg<'a>(args: &'a Value, name: &str) -> Result<&'a str, ChannelError> {
    args.as_str()
        .ok_or_else(|| ChannelError::argument(format!("{name} is null")))
}

impl StepChannel {
    pub fn new(
        db: Database,
        settings: SettingsStore,
        tracking: TrackingController,
        events: StepEvents,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            db,
            settings,
            tracking,
            events,
            clock,
        }
    }

    fn today(&self) -> NaiveDate {
        self.clock.now().date()
    }

    /// Dispatches one method call. `args` is `Value::Null` for methods
    /// without arguments.
    pub async fn handle(&self, method: &str, args: Value) -> Result<Value, ChannelError> {
        debug!("channel call {method}");
        match method {
            "getTodaySteps" => reply(self.db.day_total(self.today()).await?),
            "getTodayHourlySteps" => reply(self.db.hourly_steps(self.today()).await?),
            "getStepsForDate" => reply(self.db.day_total(date_arg(&args)?).await?),
            "getHourlyStepsForDate" => reply(self.db.hourly_steps(date_arg(&args)?).await?),
            "getAchievedGoalForDate" => reply(self.db.achieved_goal(date_arg(&args)?).await?),

            "isTrackingEnabled" => reply(self.settings.tracking_enabled().await?),
            "getDailyGoal" => reply(self.settings.daily_goal().await?),
            "setDailyGoal" => {
                let steps = int_arg(&args, "steps")?;
                self.settings.set_daily_goal(steps).await?;
                Ok(Value::Null)
            }
            "isGoalNotificationEnabled" => {
                reply(self.settings.goal_notification_enabled().await?)
            }
            "setGoalNotificationEnabled" => {
                let enabled = bool_arg(&args, "enabled")?;
                self.settings.set_goal_notification_enabled(enabled).await?;
                Ok(Value::Null)
            }
            "getRetentionPolicy" => reply(self.settings.retention().await?),
            "setRetentionPolicy" => {
                let policy: RetentionPolicy = serde_json::from_value(args)
                    .map_err(|err| ChannelError::argument(format!("invalid policy: {err}")))?;
                self.settings.set_retention(policy).await?;
                Ok(Value::Null)
            }

            "startTrackingService" => {
                self.tracking
                    .start_tracking()
                    .await
                    .map_err(|err| ChannelError::StartFailed(format!("{err:#}")))?;
                Ok(Value::Null)
            }
            "stopTrackingService" => {
                self.tracking
                    .stop_tracking()
                    .await
                    .map_err(|err| ChannelError::StopFailed(format!("{err:#}")))?;
                Ok(Value::Null)
            }

            "exportData" => reply(transfer::export_json(&self.db, &self.settings).await?),
            "previewImport" => {
                let json = str_arg(&args, "json")?;
                reply(transfer::preview_import(&self.db, json).await?)
            }
            "importData" => {
                let json = str_arg(&args["json"], "json")?;
                let mode = str_arg(&args["mode"], "mode")?;
                let mode = ImportMode::parse(mode)
                    .ok_or_else(|| ChannelError::argument(format!("unknown import mode '{mode}'")))?;
                let import_settings = match &args["import_settings"] {
                    Value::Null => false,
                    value => bool_arg(value, "import_settings")?,
                };
                reply(
                    transfer::import_json(&self.db, &self.settings, json, mode, import_settings)
                        .await?,
                )
            }

            other => Err(ChannelError::NotImplemented(other.to_string())),
        }
    }

    /// Attaches the event sink and immediately delivers today's total.
    pub async fn listen(&self, sink: Arc<dyn StepSink>) -> Result<(), ChannelError> {
        let current = self.db.day_total(self.today()).await?;
        self.events.listen(sink, current);
        Ok(())
    }

    pub fn cancel(&self) {
        self.events.cancel();
    }
}
