use std::sync::Arc;

use anyhow::{Context, Result};
use log::{error, info, warn};
use serde::Serialize;
use tokio::sync::Mutex;

use crate::{
    db::Database,
    platform::{
        Clock, Notification, Notifier, Permissions, TRACKING_DISABLED_NOTIFICATION_ID,
        TRACKING_NOTIFICATION_ID,
    },
    retention::{self, CleanupReport},
    sensing::SamplingController,
    settings::SettingsStore,
};

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum StartOutcome {
    Running,
    /// Tracking flag is off; the sampler was stopped.
    Disabled,
    /// Runtime permission missing; the sampler was stopped.
    PermissionDenied,
    SensorUnavailable,
}

/// Background tracking lifecycle: create, start command, explicit start/stop
/// from the UI, and start after device boot.
#[derive(Clone)]
pub struct TrackingController {
    db: Database,
    settings: SettingsStore,
    notifier: Arc<dyn Notifier>,
    permissions: Arc<dyn Permissions>,
    clock: Arc<dyn Clock>,
    sampling: Arc<Mutex<SamplingController>>,
}

impl TrackingController {
    pub fn new(
        db: Database,
        settings: SettingsStore,
        notifier: Arc<dyn Notifier>,
        permissions: Arc<dyn Permissions>,
        clock: Arc<dyn Clock>,
        sampling: SamplingController,
    ) -> Self {
        Self {
            db,
            settings,
            notifier,
            permissions,
            clock,
            sampling: Arc::new(Mutex::new(sampling)),
        }
    }

    pub async fn is_sampling(&self) -> bool {
        self.sampling.lock().await.is_running()
    }

    pub async fn on_create(&self) -> Option<CleanupReport> {
        self.cleanup().await
    }

    pub async fn start_command(&self) -> Result<StartOutcome> {
        if !self.permissions.activity_recognition_granted() {
            warn!("No activity recognition permission, stopping sampler");
            self.sampling.lock().await.stop_sampling().await?;
            return Ok(StartOutcome::PermissionDenied);
        }

        if !self.settings.tracking_enabled().await? {
            info!("Tracking disabled flag set, stopping sampler");
            self.sampling.lock().await.stop_sampling().await?;
            return Ok(StartOutcome::Disabled);
        }

        self.notifier
            .post(&Notification::tracking_active())
            .context("failed to post tracking notification")?;

        self.cleanup().await;

        match self.sampling.lock().await.start_sampling().await {
            Ok(_) => Ok(StartOutcome::Running),
            Err(err) => {
                warn!("Step sampling not started: {err:?}");
                Ok(StartOutcome::SensorUnavailable)
            }
        }
    }

    pub async fn start_tracking(&self) -> Result<StartOutcome> {
        self.settings.set_tracking_enabled(true).await?;
        self.notifier
            .cancel(TRACKING_DISABLED_NOTIFICATION_ID)
            .context("failed to cancel tracking-disabled notification")?;
        self.start_command().await
    }

    pub async fn stop_tracking(&self) -> Result<()> {
        self.settings.set_tracking_enabled(false).await?;
        self.sampling.lock().await.stop_sampling().await?;
        self.notifier
            .cancel(TRACKING_NOTIFICATION_ID)
            .context("failed to cancel tracking notification")?;
        self.notifier
            .post(&Notification::tracking_disabled())
            .context("failed to post tracking-disabled notification")?;
        info!("Step tracking stopped by user");
        Ok(())
    }

    /// Device finished booting. Without the runtime permission nothing starts.
    pub async fn on_boot(&self) -> Result<StartOutcome> {
        if !self.permissions.activity_recognition_granted() {
            return Ok(StartOutcome::PermissionDenied);
        }
        self.start_command().await
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.sampling.lock().await.stop_sampling().await
    }

    async fn cleanup(&self) -> Option<CleanupReport> {
        let today = self.clock.now().date();
        match retention::run_cleanup(&self.db, &self.settings, today).await {
            Ok(report) => report,
            Err(err) => {
                error!("Retention cleanup failed: {err:?}");
                None
            }
        }
    }
}
