mod channel;
mod config;
mod db;
mod goals;
mod host;
mod platform;
mod retention;
mod sensing;
mod settings;
mod tracking;
mod transfer;
mod utils;

use std::sync::Arc;

use anyhow::Context;

pub use channel::{ChannelError, ChannelFailure, StepChannel, StepEvents, StepSink};
pub use config::HostConfig;
pub use db::{Database, DayRecord};
pub use platform::{
    host::{ChannelSensor, ConfiguredPermissions, JsonLines, JsonLinesNotifier, SensorFeed},
    Clock, Notification, NotificationPriority, Notifier, Permissions, SensorSource, SystemClock,
};
pub use retention::CleanupReport;
pub use sensing::{ReadingOutcome, SamplingController, StepSampler, MAX_PLAUSIBLE_DELTA};
pub use settings::{RetentionMode, RetentionPolicy, SettingsStore, UserSettings};
pub use tracking::{StartOutcome, TrackingController};
pub use transfer::{
    export_document, export_json, import_json, preview_import, ExportDocument, ImportMode,
    ImportPreview, ImportSummary, TransferError, SCHEMA_ID, SCHEMA_VERSION,
};

use goals::GoalNotifier;

/// Capabilities supplied by whatever hosts the core.
pub struct Platform {
    pub sensor: Arc<dyn SensorSource>,
    pub notifier: Arc<dyn Notifier>,
    pub permissions: Arc<dyn Permissions>,
    pub clock: Arc<dyn Clock>,
}

/// Fully wired tracking core sharing one database.
#[derive(Clone)]
pub struct StepCounter {
    pub db: Database,
    pub settings: SettingsStore,
    pub events: StepEvents,
    pub tracking: TrackingController,
    pub channel: StepChannel,
}

impl StepCounter {
    pub fn new(db: Database, platform: Platform) -> Self {
        let settings = SettingsStore::new(db.clone());
        let events = StepEvents::new();
        let goals = GoalNotifier::new(db.clone(), settings.clone(), platform.notifier.clone());
        let sampler = StepSampler::new(
            db.clone(),
            settings.clone(),
            goals,
            events.clone(),
            platform.clock.clone(),
        );
        let tracking = TrackingController::new(
            db.clone(),
            settings.clone(),
            platform.notifier,
            platform.permissions,
            platform.clock.clone(),
            SamplingController::new(platform.sensor, sampler),
        );
        let channel = StepChannel::new(
            db.clone(),
            settings.clone(),
            tracking.clone(),
            events.clone(),
            platform.clock,
        );

        Self {
            db,
            settings,
            events,
            tracking,
            channel,
        }
    }
}

pub fn run() -> anyhow::Result<()> {
    let config = HostConfig::from_env();

    // RUST_LOG still wins over the configured level.
    env_logger::Builder::new()
        .filter_level(config.log_level())
        .parse_default_env()
        .init();

    log::info!("Step counter starting up...");

    std::fs::create_dir_all(&config.data_dir)
        .with_context(|| format!("failed to create {}", config.data_dir.display()))?;
    let database = Database::new(config.database_path())?;

    let runtime = tokio::runtime::Runtime::new().context("failed to start tokio runtime")?;
    runtime.block_on(host::serve(database, config))
}
