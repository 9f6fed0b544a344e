use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use chrono::{NaiveDate, NaiveDateTime};
use serde_json::{json, Value};
use step_counter_lib::{
    ChannelSensor, Clock, ConfiguredPermissions, Database, Notification, Notifier, Platform,
    SensorFeed, StepCounter,
};

struct MorningClock;

impl Clock for MorningClock {
    fn now(&self) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 20)
            .unwrap()
            .and_hms_opt(7, 30, 0)
            .unwrap()
    }
}

#[derive(Default)]
struct Notifications(Mutex<Vec<i32>>);

impl Notifier for Notifications {
    fn post(&self, notification: &Notification) -> anyhow::Result<()> {
        self.0.lock().unwrap().push(notification.id);
        Ok(())
    }

    fn cancel(&self, _id: i32) -> anyhow::Result<()> {
        Ok(())
    }
}

fn app(db: Database) -> (StepCounter, SensorFeed, Arc<Notifications>) {
    let (sensor, feed) = ChannelSensor::new();
    let notifications = Arc::new(Notifications::default());
    let app = StepCounter::new(
        db,
        Platform {
            sensor: Arc::new(sensor),
            notifier: notifications.clone(),
            permissions: Arc::new(ConfiguredPermissions::new(true)),
            clock: Arc::new(MorningClock),
        },
    );
    (app, feed, notifications)
}

async fn today_steps(app: &StepCounter) -> Value {
    app.channel.handle("getTodaySteps", Value::Null).await.unwrap()
}

#[tokio::test]
async fn readings_flow_through_to_export_and_back() {
    let dir = tempfile::tempdir().unwrap();
    let (source, feed, notifications) = app(Database::new(dir.path().join("source.sqlite3")).unwrap());

    source.channel.handle("setDailyGoal", json!(100)).await.unwrap();
    source
        .channel
        .handle("startTrackingService", Value::Null)
        .await
        .unwrap();

    for raw in [1_000.0, 1_060.0, 1_060.0, 1_130.0] {
        assert!(feed.push(raw));
    }
    for _ in 0..200 {
        if today_steps(&source).await == json!(130) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(today_steps(&source).await, json!(130));

    let hourly = source
        .channel
        .handle("getTodayHourlySteps", Value::Null)
        .await
        .unwrap();
    assert_eq!(hourly[7], 130);
    assert_eq!(
        source
            .channel
            .handle("getAchievedGoalForDate", json!("2024-05-20"))
            .await
            .unwrap(),
        json!(100)
    );
    assert_eq!(
        notifications
            .0
            .lock()
            .unwrap()
            .iter()
            .filter(|id| **id == 3)
            .count(),
        1
    );

    source
        .channel
        .handle("stopTrackingService", Value::Null)
        .await
        .unwrap();
    let exported = source
        .channel
        .handle("exportData", Value::Null)
        .await
        .unwrap();

    let (target, _feed, _) = app(Database::new(dir.path().join("target.sqlite3")).unwrap());
    let summary = target
        .channel
        .handle(
            "importData",
            json!({ "json": exported, "mode": "REPLACE_ALL_HISTORY", "import_settings": true }),
        )
        .await
        .unwrap();
    assert_eq!(summary["imported_days"], 1);
    assert_eq!(summary["settings_imported"], true);

    assert_eq!(today_steps(&target).await, json!(130));
    assert_eq!(
        target
            .channel
            .handle("getTodayHourlySteps", Value::Null)
            .await
            .unwrap(),
        hourly
    );
    assert_eq!(
        target.channel.handle("getDailyGoal", Value::Null).await.unwrap(),
        json!(100)
    );
    assert_eq!(
        target
            .channel
            .handle("isTrackingEnabled", Value::Null)
            .await
            .unwrap(),
        json!(false)
    );
}
