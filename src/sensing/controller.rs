use std::sync::Arc;

use anyhow::{Context, Result};
use log::info;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::platform::SensorSource;

use super::{loop_worker::sampling_loop, sampler::StepSampler};

/// Owns at most one sampling task. Starting while a task is alive is a no-op,
/// so repeated start requests never register a second listener.
pub struct SamplingController {
    sensor: Arc<dyn SensorSource>,
    sampler: StepSampler,
    handle: Option<JoinHandle<()>>,
    cancel_token: Option<CancellationToken>,
}

impl SamplingController {
    pub fn new(sensor: Arc<dyn SensorSource>, sampler: StepSampler) -> Self {
        Self {
            sensor,
            sampler,
            handle: None,
            cancel_token: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }

    /// Returns true when a new sampling task was spawned.
    pub async fn start_sampling(&mut self) -> Result<bool> {
        if self.is_running() {
            return Ok(false);
        }
        // Reap a task that ended on its own (closed sensor stream).
        self.stop_sampling().await?;

        let readings = self.sensor.open().context("failed to open step sensor")?;

        let cancel_token = CancellationToken::new();
        let handle = tokio::spawn(sampling_loop(
            self.sampler.clone(),
            readings,
            cancel_token.clone(),
        ));

        self.handle = Some(handle);
        self.cancel_token = Some(cancel_token);
        info!("Step sampling started");
        Ok(true)
    }

    pub async fn stop_sampling(&mut self) -> Result<()> {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }

        if let Some(handle) = self.handle.take() {
            handle
                .await
                .context("sampling loop task failed to join")
                .map(|_| ())
        } else {
            Ok(())
        }
    }
}
