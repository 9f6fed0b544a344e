use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::sampler::{ReadingOutcome, StepSampler};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

// Import the logging macros (exported at crate root)
use crate::{log_error, log_info};

/// Consumes raw readings in arrival order until cancelled or the sensor
/// stream closes. A failed reading is logged and the loop keeps going.
pub async fn sampling_loop(
    sampler: StepSampler,
    mut readings: mpsc::UnboundedReceiver<f64>,
    cancel_token: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            _ = cancel_token.cancelled() => {
                log_info!("sampling loop shutting down");
                break;
            }
            reading = readings.recv() => {
                let Some(raw_value) = reading else {
                    log_info!("sensor stream closed; sampling loop exiting");
                    break;
                };

                match sampler.on_reading(raw_value).await {
                    Ok(ReadingOutcome::Accepted { steps, today_total }) => {
                        log::trace!("+{steps} steps, today {today_total}");
                    }
                    Ok(_) => {}
                    Err(err) => log_error!("failed to process sensor reading {raw_value}: {err:?}"),
                }
            }
        }
    }
}
