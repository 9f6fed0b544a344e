use std::sync::Arc;

use anyhow::Result;
use chrono::NaiveDate;
use log::{error, info};

use crate::{
    db::Database,
    platform::{Notification, Notifier},
    settings::SettingsStore,
};

/// Fires the daily-goal notification at most once per calendar date.
///
/// Only one "last notified" date is kept. If the service is not running when
/// the day rolls over, no backlog is produced for the missed day.
#[derive(Clone)]
pub struct GoalNotifier {
    db: Database,
    settings: SettingsStore,
    notifier: Arc<dyn Notifier>,
}

impl GoalNotifier {
    pub fn new(db: Database, settings: SettingsStore, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            db,
            settings,
            notifier,
        }
    }

    /// Returns true when this call posted the notification.
    pub async fn check(&self, today: NaiveDate, total: u64) -> Result<bool> {
        if !self.settings.goal_notification_enabled().await? {
            return Ok(false);
        }

        let goal = self.settings.daily_goal().await?;
        if goal <= 0 || total < goal as u64 {
            return Ok(false);
        }

        let previous = self.settings.last_goal_notified_date().await?;
        if previous == Some(today) {
            return Ok(false);
        }

        // The date is claimed before posting and released if the post fails.
        self.settings.set_last_goal_notified_date(Some(today)).await?;
        if let Err(err) = self.notifier.post(&Notification::goal_reached(goal, total)) {
            if let Err(restore) = self.settings.set_last_goal_notified_date(previous).await {
                error!("Failed to release goal date {today}: {restore:?}");
            }
            return Err(err.context("failed to post goal notification"));
        }
        self.db.set_goal_achieved(today, goal as u64).await?;

        info!("Daily goal of {goal} reached on {today} with {total} steps");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::{testing::RecordingNotifier, GOAL_NOTIFICATION_ID};

    struct Fixture {
        db: Database,
        settings: SettingsStore,
        notifier: Arc<RecordingNotifier>,
        goals: GoalNotifier,
    }

    fn fixture() -> Fixture {
        let db = Database::in_memory().unwrap();
        let settings = SettingsStore::new(db.clone());
        let notifier = Arc::new(RecordingNotifier::default());
        let goals = GoalNotifier::new(db.clone(), settings.clone(), notifier.clone());
        Fixture {
            db,
            settings,
            notifier,
            goals,
        }
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    #[tokio::test]
    async fn fires_once_per_day() {
        let f = fixture();
        f.settings.set_daily_goal(100).await.unwrap();

        assert!(!f.goals.check(day(10), 99).await.unwrap());
        assert!(f.goals.check(day(10), 100).await.unwrap());
        for total in [150, 200, 5000] {
            assert!(!f.goals.check(day(10), total).await.unwrap());
        }

        assert_eq!(f.notifier.posted(GOAL_NOTIFICATION_ID), 1);
        assert_eq!(f.db.achieved_goal(day(10)).await.unwrap(), Some(100));
        assert_eq!(
            f.settings.last_goal_notified_date().await.unwrap(),
            Some(day(10))
        );

        assert!(f.goals.check(day(11), 120).await.unwrap());
        assert_eq!(f.notifier.posted(GOAL_NOTIFICATION_ID), 2);
    }

    #[tokio::test]
    async fn disabled_or_non_positive_goal_never_fires() {
        let f = fixture();
        f.settings.set_goal_notification_enabled(false).await.unwrap();
        assert!(!f.goals.check(day(10), 100_000).await.unwrap());

        f.settings.set_goal_notification_enabled(true).await.unwrap();
        f.settings.set_daily_goal(0).await.unwrap();
        assert!(!f.goals.check(day(10), 100_000).await.unwrap());

        assert_eq!(f.notifier.posted(GOAL_NOTIFICATION_ID), 0);
        assert_eq!(f.db.achieved_goal(day(10)).await.unwrap(), None);
    }

    #[tokio::test]
    async fn failed_post_restores_previous_date() {
        let f = fixture();
        f.settings.set_daily_goal(10).await.unwrap();
        f.settings
            .set_last_goal_notified_date(Some(day(9)))
            .await
            .unwrap();
        f.notifier.fail_calls(true);

        assert!(f.goals.check(day(10), 20).await.is_err());
        assert_eq!(
            f.settings.last_goal_notified_date().await.unwrap(),
            Some(day(9))
        );
        assert_eq!(f.db.achieved_goal(day(10)).await.unwrap(), None);
    }

    #[tokio::test]
    async fn unwritable_slot_posts_nothing() {
        let f = fixture();
        f.settings.set_daily_goal(10).await.unwrap();
        f.db.execute(|conn| {
            conn.execute_batch(
                "CREATE TRIGGER read_only_goal_slot BEFORE INSERT ON preferences
                 WHEN NEW.key = 'last_goal_notified_date'
                 BEGIN SELECT RAISE(ABORT, 'read-only'); END;",
            )?;
            Ok(())
        })
        .await
        .unwrap();

        assert!(f.goals.check(day(10), 20).await.is_err());
        assert!(f.goals.check(day(10), 30).await.is_err());
        assert_eq!(f.notifier.posted(GOAL_NOTIFICATION_ID), 0);
        assert_eq!(f.settings.last_goal_notified_date().await.unwrap(), None);
    }

    #[tokio::test]
    async fn failed_post_leaves_day_unmarked() {
        let f = fixture();
        f.settings.set_daily_goal(10).await.unwrap();
        f.notifier.fail_calls(true);
        assert!(f.goals.check(day(10), 20).await.is_err());
        assert_eq!(f.settings.last_goal_notified_date().await.unwrap(), None);

        f.notifier.fail_calls(false);
        assert!(f.goals.check(day(10), 25).await.unwrap());
    }
}
