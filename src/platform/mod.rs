//! Capabilities the tracking core consumes from its host platform.
//!
//! Everything above this layer is written against these traits so it can be
//! driven by a real device shell, the stdio host in [`host`], or test fakes.

use anyhow::Result;
use chrono::{Local, NaiveDateTime};
use serde::Serialize;
use tokio::sync::mpsc;

pub mod host;

/// Notification slots. Posting to an occupied slot replaces its content.
pub const TRACKING_NOTIFICATION_ID: i32 = 1;
pub const TRACKING_DISABLED_NOTIFICATION_ID: i32 = 2;
pub const GOAL_NOTIFICATION_ID: i32 = 3;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum NotificationPriority {
    Low,
    Default,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Notification {
    pub id: i32,
    pub title: String,
    pub text: String,
    pub priority: NotificationPriority,
    /// Ongoing notifications cannot be swiped away by the user.
    pub ongoing: bool,
}

impl Notification {
    pub fn tracking_active() -> Self {
        Self {
            id: TRACKING_NOTIFICATION_ID,
            title: "Step Counter".into(),
            text: "Background step tracking is on".into(),
            priority: NotificationPriority::Low,
            ongoing: true,
        }
    }

    pub fn tracking_disabled() -> Self {
        Self {
            id: TRACKING_DISABLED_NOTIFICATION_ID,
            title: "Step Counter".into(),
            text: "Background step tracking is off".into(),
            priority: NotificationPriority::Low,
            ongoing: false,
        }
    }

    pub fn goal_reached(goal: i64, total: u64) -> Self {
        Self {
            id: GOAL_NOTIFICATION_ID,
            title: "Daily goal reached".into(),
            text: format!("{total} steps today, goal was {goal}"),
            priority: NotificationPriority::Default,
            ongoing: false,
        }
    }
}

pub trait Notifier: Send + Sync {
    fn post(&self, notification: &Notification) -> Result<()>;
    fn cancel(&self, id: i32) -> Result<()>;
}

/// A cumulative step counter. Each `open` hands out a fresh stream of raw
/// readings; whatever stream was handed out before stops receiving.
pub trait SensorSource: Send + Sync {
    fn open(&self) -> Result<mpsc::UnboundedReceiver<f64>>;
}

pub trait Permissions: Send + Sync {
    fn activity_recognition_granted(&self) -> bool;
}

/// Local wall clock. Day and hour bucketing read from here.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}
